use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::types::RouterEvent;

/// A subscriber that observes emitted events. Never consulted for
/// permission — by the time `emit` runs, the turn has already decided
/// what happened.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &RouterEvent);
}

/// Central fan-out for [`RouterEvent`]s — a plain `RwLock<Vec<_>>` registry
/// with `register`/`emit`. No Before/Block machinery: these events are
/// purely observational, so there is nothing to intercept.
#[derive(Default)]
pub struct EventBus {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().expect("event sink registry poisoned").push(sink);
    }

    /// Logs the event at an appropriate level and fans it out to every
    /// registered sink. Never returns anything — there is no control-flow
    /// decision left to make once an event fires.
    pub fn emit(&self, event: RouterEvent) {
        match &event {
            RouterEvent::SendFailure { thread_id, reason } => {
                warn!(thread_id = %thread_id, reason, event = event.name(), "router event");
            }
            RouterEvent::StepBudgetExceeded { thread_id, steps } => {
                warn!(thread_id = %thread_id, steps, event = event.name(), "router event");
            }
            RouterEvent::RoutingLoop { thread_id, attempts } => {
                warn!(thread_id = %thread_id, attempts, event = event.name(), "router event");
            }
            other => {
                info!(thread_id = %other.thread_id(), event = other.name(), "router event");
            }
        }

        let sinks = self.sinks.read().expect("event sink registry poisoned");
        for sink in sinks.iter() {
            sink.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lead_core::types::ThreadId;
    use std::sync::Mutex;

    struct CapturingSink(Mutex<Vec<String>>);

    impl EventSink for CapturingSink {
        fn on_event(&self, event: &RouterEvent) {
            self.0.lock().unwrap().push(event.name().to_string());
        }
    }

    #[test]
    fn fans_out_to_registered_sinks() {
        let bus = EventBus::new();
        let sink = Arc::new(CapturingSink(Mutex::new(Vec::new())));
        bus.register(sink.clone());

        bus.emit(RouterEvent::ScoreUnchanged {
            thread_id: ThreadId("t1".to_string()),
        });

        assert_eq!(sink.0.lock().unwrap().as_slice(), ["score_unchanged"]);
    }
}
