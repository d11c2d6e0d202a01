use crate::formatter::RecordFormatter;
use crate::error::FormatError;
use crate::record::LogRecord;
use crate::trace::TRACE_CONTEXT_FIELD;
use chrono::Utc;
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// writes each one as a single JSON line through a [`RecordFormatter`].
///
/// Event fields become `context` entries and, in declaration order, the
/// interpolation values of the message. `extra` carries the event's
/// target and source location. The trace id is taken from the closest
/// enclosing span that recorded a `cloud_trace_context` field.
pub struct CloudJsonLayer<W = fn() -> io::Stdout> {
    formatter: RecordFormatter,
    make_writer: W,
    channel: String,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Lines successfully written.
    pub written_events: Arc<AtomicU64>,
    /// Dropped because formatting or writing failed.
    pub failed_events: Arc<AtomicU64>,
}

impl CloudJsonLayer {
    /// Create a layer writing to stdout, where the collector picks it up.
    pub fn new(formatter: RecordFormatter) -> Self {
        Self {
            formatter,
            make_writer: io::stdout,
            channel: String::new(),
            total_events: Arc::new(AtomicU64::new(0)),
            written_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<W> CloudJsonLayer<W> {
    /// Replace the destination of formatted lines.
    pub fn with_writer<W2>(self, make_writer: W2) -> CloudJsonLayer<W2>
    where
        W2: for<'w> MakeWriter<'w> + 'static,
    {
        CloudJsonLayer {
            formatter: self.formatter,
            make_writer,
            channel: self.channel,
            total_events: self.total_events,
            written_events: self.written_events,
            failed_events: self.failed_events,
        }
    }

    /// Set the channel name exposed to the line format as `%channel%`.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }
}

impl<W> CloudJsonLayer<W>
where
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn emit(&self, record: &LogRecord, trace_header: Option<&str>) -> Result<(), FormatError> {
        let line = self.formatter.format_at(record, trace_header, record.datetime)?;
        let mut writer = self.make_writer.make_writer();
        writer.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Span extension holding the raw trace-context header value.
struct TraceContext(String);

impl<S, W> Layer<S> for CloudJsonLayer<W>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = TraceContextVisitor(None);
        attrs.record(&mut visitor);
        if let (Some(header), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(TraceContext(header));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let mut visitor = TraceContextVisitor(None);
        values.record(&mut visitor);
        if let (Some(header), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().replace(TraceContext(header));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut values = Vec::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { values: &mut values, message: &mut message };
        event.record(&mut visitor);

        let meta = event.metadata();
        let mut extra = Map::new();
        extra.insert("target".to_string(), Value::from(meta.target()));
        if let Some(module_path) = meta.module_path() {
            extra.insert("module_path".to_string(), Value::from(module_path));
        }
        if let Some(file) = meta.file() {
            extra.insert("file".to_string(), Value::from(file));
        }
        if let Some(line) = meta.line() {
            extra.insert("line".to_string(), Value::from(line));
        }

        let context: Map<String, Value> = values.iter().cloned().collect();
        let record = LogRecord {
            message: message.unwrap_or_default(),
            values,
            level_name: severity(meta.level()).to_string(),
            channel: self.channel.clone(),
            datetime: Utc::now(),
            context,
            extra,
        };

        let trace_header = ctx.event_scope(event).and_then(|mut scope| {
            scope.find_map(|span| {
                let extensions = span.extensions();
                extensions.get::<TraceContext>().map(|t| t.0.clone())
            })
        });

        match self.emit(&record, trace_header.as_deref()) {
            Ok(()) => {
                self.written_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("dropping log record: {}", e);
            }
        }
    }
}

/// Map a `tracing` level onto the collector's severity names.
pub fn severity(level: &Level) -> &'static str {
    match *level {
        Level::TRACE | Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        Level::ERROR => "ERROR",
    }
}

/// Collects event fields in declaration order.
///
/// A field named `message` becomes the message template whatever its type;
/// every other field is appended to `values`.
pub struct FieldVisitor<'a> {
    pub values: &'a mut Vec<(String, Value)>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn push(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            *self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.values.push((field.name().to_string(), value));
        }
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // Format-args messages arrive here rather than through `record_str`.
        self.push(field, Value::String(format!("{:?}", value)));
    }
}

struct TraceContextVisitor(Option<String>);

impl Visit for TraceContextVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == TRACE_CONTEXT_FIELD {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == TRACE_CONTEXT_FIELD {
            self.0 = Some(format!("{:?}", value));
        }
    }
}
