//! Environment variable names used by this crate for convenient
//! configuration of the formatter from services.
//!
//! These are purely helpers; the formatter itself never reads the
//! environment.

/// Line format for the rendered `message`, e.g. `%channel%: %message%`.
pub const FLEX_LOG_FORMAT_ENV: &str = "FLEX_LOG_FORMAT";

/// strftime pattern used for `%datetime%`.
pub const FLEX_LOG_DATE_FORMAT_ENV: &str = "FLEX_LOG_DATE_FORMAT";

/// `true`/`1` to render empty `%context%`/`%extra%` as nothing.
pub const FLEX_LOG_IGNORE_EMPTY_ENV: &str = "FLEX_LOG_IGNORE_EMPTY";

/// Maximum level passed to the layer: `trace`, `debug`, `info`, `warn`,
/// `error` or `off`.
pub const FLEX_LOG_LEVEL_ENV: &str = "FLEX_LOG_LEVEL";

/// CGI-style variable some hosts use to expose the inbound
/// `X-Cloud-Trace-Context` header.
pub const TRACE_CONTEXT_ENV: &str = "HTTP_X_CLOUD_TRACE_CONTEXT";

/// Read an environment variable, treating unset and non-UTF-8 values alike.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Interpret a flag value; unrecognised spellings yield `None`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Trace-context header exposed through [`TRACE_CONTEXT_ENV`], if any.
///
/// The result is meant to be passed straight to
/// [`crate::formatter::RecordFormatter::format`].
pub fn trace_header_from_env() -> Option<String> {
    env_var(TRACE_CONTEXT_ENV)
}
