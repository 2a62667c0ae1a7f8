#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sprout_core::container::{LifecycleEvent, LifecyclePhase};
use sprout_core::Container;

/// Install a test-friendly subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared, append-only log of strings
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Record `(phase, definition id)` for every lifecycle event
pub fn record_events(container: &Container) -> Arc<Mutex<Vec<(LifecyclePhase, String)>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    container.on_lifecycle_event(move |event: &LifecycleEvent| {
        sink.lock()
            .unwrap()
            .push((event.phase, event.definition.id().to_string()));
    });
    events
}
