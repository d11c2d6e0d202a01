use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FormatError;
use crate::line::{LineRenderer, DEFAULT_DATE_FORMAT, DEFAULT_FORMAT};
use crate::record::LogRecord;
use crate::trace::trace_id;

/// Construction parameters for [`RecordFormatter`].
///
/// **Fields**
/// - `format`: line format controlling how `message` is rendered.
/// - `date_format`: chrono strftime pattern for `%datetime%`.
/// - `ignore_empty_context_and_extra`: render empty `%context%` / `%extra%`
///   tokens as nothing instead of `{}`.
///
/// Line breaks inside messages are always kept inline; JSON encoding
/// escapes them afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatterOptions {
    pub format: String,
    pub date_format: String,
    pub ignore_empty_context_and_extra: bool,
}

impl Default for FormatterOptions {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            ignore_empty_context_and_extra: false,
        }
    }
}

/// Wall-clock time split the way the collector expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// Split `now` into epoch seconds and a nanosecond offset.
    ///
    /// The offset is the microsecond fraction of the second taken as an
    /// `f64`, scaled by 1e9 and truncated, so digits below microsecond
    /// resolution carry no information.
    pub fn from_datetime(now: DateTime<Utc>) -> Self {
        let fraction = f64::from(now.timestamp_subsec_micros()) / 1_000_000.0;
        // Leap seconds report a fraction >= 1.0.
        let nanos = ((fraction * 1_000_000_000.0) as u32).min(999_999_999);
        Timestamp {
            seconds: now.timestamp(),
            nanos,
        }
    }
}

/// JSON envelope written for every record. Field order is the wire order.
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    pub message: String,
    pub timestamp: Timestamp,
    pub thread: &'static str,
    pub severity: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<&'a Map<String, Value>>,
    #[serde(rename = "traceId", skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<&'a str>,
}

/// Formats [`LogRecord`]s into newline-terminated single-line JSON.
///
/// The formatter holds no mutable state; one instance can be shared across
/// threads and used for any number of records.
#[derive(Debug, Clone, Default)]
pub struct RecordFormatter {
    renderer: LineRenderer,
}

impl RecordFormatter {
    /// Build a formatter from `options`.
    ///
    /// **Returns**
    /// - `Err(FormatError::InvalidDateFormat)` if `date_format` is not a
    ///   valid strftime pattern.
    pub fn new(options: FormatterOptions) -> Result<Self, FormatError> {
        let renderer = LineRenderer::new(
            options.format,
            options.date_format,
            options.ignore_empty_context_and_extra,
        )?;
        Ok(Self { renderer })
    }

    /// Format `record` stamped with the current time.
    ///
    /// `trace_header` is the raw `X-Cloud-Trace-Context` value of the
    /// current request, if any.
    pub fn format(&self, record: &LogRecord, trace_header: Option<&str>) -> Result<String, FormatError> {
        self.format_at(record, trace_header, Utc::now())
    }

    /// Same as [`RecordFormatter::format`] with an explicit clock reading.
    pub fn format_at(
        &self,
        record: &LogRecord,
        trace_header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, FormatError> {
        let payload = self.payload(record, trace_header, now)?;
        let mut line = serde_json::to_string(&payload)?;
        // Trailing newline only: a leading one stalls line-based collectors.
        line.push('\n');
        Ok(line)
    }

    /// Format `record` and write the resulting line to `writer` in one call.
    pub fn write_to<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        record: &LogRecord,
        trace_header: Option<&str>,
    ) -> Result<(), FormatError> {
        let line = self.format(record, trace_header)?;
        writer.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Build the structured envelope for `record` without serializing it.
    pub fn payload<'a>(
        &self,
        record: &'a LogRecord,
        trace_header: Option<&'a str>,
        now: DateTime<Utc>,
    ) -> Result<Payload<'a>, FormatError> {
        Ok(Payload {
            message: self.renderer.render(record)?,
            timestamp: Timestamp::from_datetime(now),
            thread: "",
            severity: &record.level_name,
            context: non_empty(&record.context),
            extra: non_empty(&record.extra),
            trace_id: trace_header.map(trace_id),
        })
    }
}

fn non_empty(map: &Map<String, Value>) -> Option<&Map<String, Value>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}
