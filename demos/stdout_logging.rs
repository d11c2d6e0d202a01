use flex_log_formatter::env::trace_header_from_env;
use flex_log_formatter::init::init_tracing;
use flex_log_formatter::{LogRecord, RecordFormatter};
use tracing::{error, info, info_span};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    info!("starting service");

    // A request handler records the inbound X-Cloud-Trace-Context header
    // on its span; every event inside inherits the trace id.
    let request = info_span!(
        "request",
        cloud_trace_context = "105445aa7843bc8bf206b12000100f00/1;o=1"
    );
    request.in_scope(|| {
        error!(user_id = 42, reason = "invalid password", "authentication failed for %user_id%");
    });

    // Without tracing: format a record directly.
    let formatter = RecordFormatter::default();
    let record = LogRecord::new("NOTICE", "hello %name%")
        .with_value("name", "world")
        .with_context("attempt", 3);
    let header = trace_header_from_env();
    print!("{}", formatter.format(&record, header.as_deref())?);

    Ok(())
}
