use std::io;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use flex_log_formatter::{CloudJsonLayer, FormatterOptions, RecordFormatter};
use serde_json::Value;
use tracing::{error, info, info_span, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.is_empty() || text.ends_with('\n'));
        text.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }
}

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedBuf {
    type Writer = SharedBuf;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

struct BrokenWriter;

impl io::Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "collector gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture<F: FnOnce()>(formatter: RecordFormatter, f: F) -> Vec<Value> {
    let buf = SharedBuf::default();
    let layer = CloudJsonLayer::new(formatter).with_writer(buf.clone());
    tracing::subscriber::with_default(Registry::default().with(layer), f);
    buf.lines()
}

#[test]
fn event_becomes_one_json_line() {
    let lines = capture(RecordFormatter::default(), || {
        info!(user_id = 42, "hello %user_id%");
    });

    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert_eq!(line["message"], "hello 42");
    assert_eq!(line["severity"], "INFO");
    assert_eq!(line["thread"], "");
    assert_eq!(line["context"]["user_id"], 42);
    assert_eq!(line["extra"]["target"], "layer");
    assert!(line["extra"]["line"].is_u64());
    assert!(line["timestamp"]["seconds"].is_i64());
    assert!(line["timestamp"]["nanos"].as_u64().unwrap() <= 999_999_999);
    assert!(line.get("traceId").is_none());
}

#[test]
fn positional_values_follow_field_declaration_order() {
    let lines = capture(RecordFormatter::default(), || {
        info!(zeta = "first", alpha = "second", "%0% then %1%");
    });

    assert_eq!(lines[0]["message"], "first then second");
    assert_eq!(lines[0]["context"]["zeta"], "first");
    assert_eq!(lines[0]["context"]["alpha"], "second");
}

#[test]
fn non_string_message_field_is_the_message() {
    let lines = capture(RecordFormatter::default(), || {
        info!(message = 5, code = 7);
        info!(message = true);
    });

    assert_eq!(lines[0]["message"], "5");
    assert_eq!(lines[0]["context"]["code"], 7);
    assert!(lines[0]["context"].get("message").is_none());
    assert_eq!(lines[1]["message"], "true");
    assert!(lines[1].get("context").is_none());
}

#[test]
fn event_without_fields_has_no_context() {
    let lines = capture(RecordFormatter::default(), || {
        error!("plain failure");
    });

    assert_eq!(lines[0]["severity"], "ERROR");
    assert!(lines[0].get("context").is_none());
}

#[test]
fn warn_maps_to_warning() {
    let lines = capture(RecordFormatter::default(), || {
        warn!("careful");
    });
    assert_eq!(lines[0]["severity"], "WARNING");
}

#[test]
fn trace_id_is_taken_from_enclosing_span() {
    let lines = capture(RecordFormatter::default(), || {
        info!("before request");
        let request = info_span!("request", cloud_trace_context = "105445aa7843bc8bf206b12000100f00/1;o=1");
        let _guard = request.enter();
        let inner = info_span!("db");
        let _inner = inner.enter();
        info!("inside request");
    });

    assert_eq!(lines.len(), 2);
    assert!(lines[0].get("traceId").is_none());
    assert_eq!(lines[1]["traceId"], "105445aa7843bc8bf206b12000100f00");
}

#[test]
fn trace_context_recorded_later_is_used() {
    let lines = capture(RecordFormatter::default(), || {
        let request = info_span!("request", cloud_trace_context = tracing::field::Empty);
        let _guard = request.enter();
        info!("unknown trace");
        request.record("cloud_trace_context", "abc/2;o=0");
        info!("known trace");
    });

    assert!(lines[0].get("traceId").is_none());
    assert_eq!(lines[1]["traceId"], "abc");
}

#[test]
fn multi_line_messages_stay_on_one_line() {
    let lines = capture(RecordFormatter::default(), || {
        info!("first\nsecond\r\nthird");
    });

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["message"], "first\nsecond\r\nthird");
}

#[test]
fn line_format_sees_channel_and_level() {
    let formatter = RecordFormatter::new(FormatterOptions {
        format: "%channel%.%level_name%: %message%".to_string(),
        ..FormatterOptions::default()
    })
    .unwrap();

    let buf = SharedBuf::default();
    let layer = CloudJsonLayer::new(formatter)
        .with_channel("billing")
        .with_writer(buf.clone());
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        info!("invoice sent");
    });

    assert_eq!(buf.lines()[0]["message"], "billing.INFO: invoice sent");
}

#[test]
fn counters_track_written_and_failed_events() {
    let buf = SharedBuf::default();
    let layer = CloudJsonLayer::new(RecordFormatter::default()).with_writer(buf.clone());
    let total = Arc::clone(&layer.total_events);
    let written = Arc::clone(&layer.written_events);
    let failed = Arc::clone(&layer.failed_events);

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        info!("one");
        info!("two");
    });

    assert_eq!(total.load(Ordering::Relaxed), 2);
    assert_eq!(written.load(Ordering::Relaxed), 2);
    assert_eq!(failed.load(Ordering::Relaxed), 0);

    let layer = CloudJsonLayer::new(RecordFormatter::default()).with_writer(|| BrokenWriter);
    let failed = Arc::clone(&layer.failed_events);
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        info!("lost");
    });
    assert_eq!(failed.load(Ordering::Relaxed), 1);
}
