use chrono::format::{Item, StrftimeItems};
use serde_json::{Map, Value};

use crate::error::FormatError;
use crate::record::LogRecord;

/// Line format used when none is configured: just the rendered message.
pub const DEFAULT_FORMAT: &str = "%message%";

/// strftime pattern used for `%datetime%` when none is configured.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Renders the human-readable text of a [`LogRecord`].
///
/// Two passes happen here: the record's message template is filled from its
/// interpolation values, then the configured line format is expanded with
/// the record fields (`%message%`, `%level_name%`, `%channel%`,
/// `%datetime%`, `%context%`, `%extra%`, `%context.KEY%`, `%extra.KEY%`).
#[derive(Debug, Clone)]
pub struct LineRenderer {
    format: String,
    date_format: String,
    ignore_empty_context_and_extra: bool,
}

impl LineRenderer {
    /// Build a renderer, rejecting date formats chrono cannot parse.
    pub fn new(
        format: impl Into<String>,
        date_format: impl Into<String>,
        ignore_empty_context_and_extra: bool,
    ) -> Result<Self, FormatError> {
        let date_format = date_format.into();
        if StrftimeItems::new(&date_format).any(|item| matches!(item, Item::Error)) {
            return Err(FormatError::InvalidDateFormat(date_format));
        }

        Ok(LineRenderer {
            format: format.into(),
            date_format,
            ignore_empty_context_and_extra,
        })
    }

    /// Fill `%name%` and positional `%0%` placeholders of the message
    /// template. Tokens without a matching value are kept verbatim.
    pub fn interpolate(&self, record: &LogRecord) -> Result<String, FormatError> {
        let mut out = String::with_capacity(record.message.len());
        expand(&record.message, &mut out, |name, out| {
            let value = match name.parse::<usize>() {
                Ok(index) => record.values.get(index).map(|(_, v)| v),
                Err(_) => record
                    .values
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v),
            };
            match value {
                Some(value) => {
                    stringify(value, out)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })?;
        Ok(out)
    }

    /// Render the full line for `record` according to the line format.
    pub fn render(&self, record: &LogRecord) -> Result<String, FormatError> {
        let message = self.interpolate(record)?;
        let mut out = String::with_capacity(self.format.len() + message.len());

        expand(&self.format, &mut out, |name, out| {
            match name {
                "message" => out.push_str(&message),
                "level_name" => out.push_str(&record.level_name),
                "channel" => out.push_str(&record.channel),
                // The pattern was validated in `new`, so this cannot fail.
                "datetime" => out.push_str(&record.datetime.format(&self.date_format).to_string()),
                "context" => self.write_map(&record.context, out)?,
                "extra" => self.write_map(&record.extra, out)?,
                _ => {
                    let entry = if let Some(key) = name.strip_prefix("context.") {
                        record.context.get(key)
                    } else if let Some(key) = name.strip_prefix("extra.") {
                        record.extra.get(key)
                    } else {
                        return Ok(false);
                    };
                    // Unresolved context/extra lookups render as nothing.
                    if let Some(value) = entry {
                        stringify(value, out)?;
                    }
                }
            }
            Ok(true)
        })?;

        Ok(out)
    }

    fn write_map(&self, map: &Map<String, Value>, out: &mut String) -> Result<(), FormatError> {
        if map.is_empty() && self.ignore_empty_context_and_extra {
            return Ok(());
        }
        out.push_str(&serde_json::to_string(map)?);
        Ok(())
    }
}

impl Default for LineRenderer {
    fn default() -> Self {
        LineRenderer {
            format: DEFAULT_FORMAT.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            ignore_empty_context_and_extra: false,
        }
    }
}

/// Walk `template`, copying literal text into `out` and offering every
/// `%name%` token to `resolve`. When `resolve` returns `false` it must not
/// have written anything; the `%` is then copied and scanning resumes after it.
fn expand<F>(template: &str, out: &mut String, mut resolve: F) -> Result<(), FormatError>
where
    F: FnMut(&str, &mut String) -> Result<bool, FormatError>,
{
    let mut rest = template;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        if let Some(end) = after.find('%') {
            let name = &after[..end];
            if is_token_name(name) && resolve(name, out)? {
                rest = &after[end + 1..];
                continue;
            }
        }
        out.push('%');
        rest = after;
    }
    out.push_str(rest);
    Ok(())
}

fn is_token_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
}

fn stringify(value: &Value, out: &mut String) -> Result<(), FormatError> {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        other => out.push_str(&serde_json::to_string(other)?),
    }
    Ok(())
}
