pub mod error;
pub mod record;
pub mod line;
pub mod formatter;
pub mod trace;
pub mod layer;

pub mod init;
pub mod env;

pub use error::FormatError;
pub use formatter::{FormatterOptions, Payload, RecordFormatter, Timestamp};
pub use layer::CloudJsonLayer;
pub use record::LogRecord;
