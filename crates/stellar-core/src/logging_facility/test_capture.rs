//! In-memory event capture for tests.
//!
//! Installs a global subscriber that keeps every event, so tests can check
//! which lifecycle events an operation emitted and with which fields. The
//! buffer is shared by every test in a binary: filter on a unique op or
//! snapshot name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use stellar_core_types::schema::{FIELD_COMPONENT, FIELD_EVENT, FIELD_OP, FIELD_SNAPSHOT_NAME};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// One recorded event, every field rendered as text
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn component(&self) -> Option<&str> {
        self.field(FIELD_COMPONENT)
    }

    pub fn op(&self) -> Option<&str> {
        self.field(FIELD_OP)
    }

    pub fn event(&self) -> Option<&str> {
        self.field(FIELD_EVENT)
    }

    pub fn snapshot_name(&self) -> Option<&str> {
        self.field(FIELD_SNAPSHOT_NAME)
    }

    fn is(&self, op: &str, event: &str) -> bool {
        self.op() == Some(op) && self.event() == Some(event)
    }
}

struct FieldText<'a>(&'a mut BTreeMap<String, String>);

impl Visit for FieldText<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}

type Buffer = Arc<Mutex<Vec<CapturedEvent>>>;

struct Recorder(Buffer);

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = BTreeMap::new();
        event.record(&mut FieldText(&mut fields));
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: *event.metadata().level(),
                fields,
            });
    }
}

/// Read side of the capture buffer
#[derive(Clone)]
pub struct TestCapture(Buffer);

impl TestCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events with the given op and event name
    pub fn events_for(&self, op: &str, event: &str) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| e.is(op, event)).collect()
    }

    /// Event names `op` emitted for `snapshot_name`, in emission order
    pub fn lifecycle(&self, op: &str, snapshot_name: &str) -> Vec<String> {
        self.events()
            .iter()
            .filter(|e| e.op() == Some(op) && e.snapshot_name() == Some(snapshot_name))
            .filter_map(|e| e.event().map(str::to_string))
            .collect()
    }

    /// # Panics
    ///
    /// If no event with this op and event name was captured
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        assert!(
            events.iter().any(|e| e.is(op, event)),
            "no {} event for op {} among {} captured events",
            event,
            op,
            events.len()
        );
    }
}

static CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture subscriber (first call only) and return its buffer.
///
/// ```
/// use stellar_core::logging_facility::test_capture::init_test_capture;
/// use stellar_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("doc_operation", "v1");
/// assert_eq!(capture.lifecycle("doc_operation", "v1"), vec!["start"]);
/// ```
pub fn init_test_capture() -> TestCapture {
    CAPTURE
        .get_or_init(|| {
            let buffer = Buffer::default();
            tracing_subscriber::registry()
                .with(Recorder(Arc::clone(&buffer)))
                .init();
            TestCapture(buffer)
        })
        .clone()
}
