//! In-memory event capture for logging assertions
//!
//! `init_test_capture` installs a global subscriber once per test binary and
//! hands out clones of the same buffer. Tests in a binary run in parallel
//! against that buffer, so assertions narrow events by something unique to
//! the test: a distinct op name, or the session id every flush event carries.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::ormx_core_types::schema::{FIELD_EVENT, FIELD_OP, FIELD_SESSION_ID};

type Buffer = Arc<Mutex<Vec<CapturedEvent>>>;

/// One recorded event; every field value is kept in its display form
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn op(&self) -> Option<&str> {
        self.field(FIELD_OP)
    }

    pub fn event(&self) -> Option<&str> {
        self.field(FIELD_EVENT)
    }

    /// True for the `event` boundary of operation `op`
    pub fn is(&self, op: &str, event: &str) -> bool {
        self.op() == Some(op) && self.event() == Some(event)
    }
}

/// Collects an event's fields into the map it borrows
struct Fields<'a>(&'a mut BTreeMap<String, String>);

impl Fields<'_> {
    fn put(&mut self, field: &Field, value: String) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for Fields<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

struct CaptureLayer {
    buffer: Buffer,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = BTreeMap::new();
        event.record(&mut Fields(&mut fields));
        let captured = CapturedEvent {
            level: *event.metadata().level(),
            fields,
        };
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(captured);
        }
    }
}

/// Read side of the capture buffer
#[derive(Clone)]
pub struct TestCapture {
    buffer: Buffer,
}

impl TestCapture {
    /// Snapshot of every captured event, oldest first
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.buffer
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default()
    }

    /// Events carrying `field == value`
    pub fn events_with(&self, field: &str, value: &str) -> Vec<CapturedEvent> {
        self.filtered(|e| e.field(field) == Some(value))
    }

    /// Events emitted on behalf of one session
    pub fn for_session(&self, session_id: &str) -> Vec<CapturedEvent> {
        self.events_with(FIELD_SESSION_ID, session_id)
    }

    /// How many captured events satisfy `predicate`
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        self.filtered(predicate).len()
    }

    /// # Panics
    ///
    /// Panics unless some captured event is the `event` boundary of `op`.
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        assert!(
            events.iter().any(|e| e.is(op, event)),
            "Expected event op={} event={} among {} captured events",
            op,
            event,
            events.len()
        );
    }

    fn filtered<F>(&self, predicate: F) -> Vec<CapturedEvent>
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        self.events().into_iter().filter(|e| predicate(e)).collect()
    }
}

static CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture subscriber on first use and return its handle
///
/// ```
/// use ormx_core::logging_facility::test_capture::init_test_capture;
/// use ormx_core::{log_op_end, log_op_start};
///
/// let capture = init_test_capture();
/// log_op_start!("doc_capture_flush", session_id = "doc-session");
/// log_op_end!("doc_capture_flush", duration_ms = 0, session_id = "doc-session");
/// assert_eq!(capture.for_session("doc-session").len(), 2);
/// ```
pub fn init_test_capture() -> TestCapture {
    CAPTURE
        .get_or_init(|| {
            let buffer = Buffer::default();
            let layer = CaptureLayer {
                buffer: Arc::clone(&buffer),
            };
            // A subscriber installed elsewhere in the binary wins; the
            // buffer then stays empty.
            tracing_subscriber::registry().with(layer).try_init().ok();
            TestCapture { buffer }
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_matches_op_and_event_together() {
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_OP.to_string(), "flush".to_string());
        fields.insert(FIELD_EVENT.to_string(), "end".to_string());
        let event = CapturedEvent {
            level: Level::INFO,
            fields,
        };

        assert!(event.is("flush", "end"));
        assert!(!event.is("flush", "start"));
        assert!(!event.is("execute", "end"));
        assert_eq!(event.field("table"), None);
    }
}
