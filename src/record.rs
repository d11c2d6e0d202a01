use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FormatError;

/// One log event as handed over by the upstream logging facility.
///
/// `message` is a template; `values` are the ordered named values that
/// fill its `%name%` placeholders. `context` and `extra` are carried into
/// the JSON payload as-is and omitted when empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub message: String,
    pub values: Vec<(String, Value)>,
    pub level_name: String,
    pub channel: String,
    pub datetime: DateTime<Utc>,
    pub context: Map<String, Value>,
    pub extra: Map<String, Value>,
}

impl LogRecord {
    /// Create a record with the given severity label and message template.
    ///
    /// `channel` starts out empty and `datetime` is set to the current time.
    pub fn new(level_name: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            message: message.into(),
            values: Vec::new(),
            level_name: level_name.into(),
            channel: String::new(),
            datetime: Utc::now(),
            context: Map::new(),
            extra: Map::new(),
        }
    }

    /// Append a named interpolation value.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_datetime(mut self, datetime: DateTime<Utc>) -> Self {
        self.datetime = datetime;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Attach an arbitrary serializable value under `context`.
    ///
    /// Fails with [`FormatError::Serialize`] when the value has no JSON
    /// representation (for example a map keyed by non-strings).
    pub fn try_with_context<T: Serialize + ?Sized>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, FormatError> {
        self.context.insert(key.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Same as [`LogRecord::try_with_context`] but for `extra`.
    pub fn try_with_extra<T: Serialize + ?Sized>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, FormatError> {
        self.extra.insert(key.into(), serde_json::to_value(value)?);
        Ok(self)
    }
}
