/// Span field name [`crate::layer::CloudJsonLayer`] reads the inbound
/// `X-Cloud-Trace-Context` header value from.
pub const TRACE_CONTEXT_FIELD: &str = "cloud_trace_context";

/// Extract the trace id from a trace-context header value shaped
/// `TRACE_ID/SPAN_ID;o=OPTIONS`.
///
/// Everything up to the first `/` is kept; a value without `/` is returned
/// whole.
pub fn trace_id(header: &str) -> &str {
    header.split('/').next().unwrap_or(header)
}
