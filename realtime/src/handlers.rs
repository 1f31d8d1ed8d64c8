use std::sync::Arc;

use dashmap::DashMap;
use log::*;
use serde_json::Value;

/// Callback invoked with an event's payload.
pub type Handler = Arc<dyn Fn(Value) + Send + Sync>;

/// Map from event name to at most one handler.
///
/// Registering a handler for a name that already has one replaces it; handlers
/// never stack.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an earlier handler was replaced.
    pub fn insert(&self, event: &str, handler: Handler) -> bool {
        let replaced = self.handlers.insert(event.to_string(), handler).is_some();
        if replaced {
            debug!("Replaced handler for {event}");
        }
        replaced
    }

    pub fn remove(&self, event: &str) -> bool {
        self.handlers.remove(event).is_some()
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }

    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Call the handler registered for `event`. Returns `false` if there is none.
    pub fn dispatch(&self, event: &str, data: Value) -> bool {
        // Clone out of the map so a handler may call `on`/`off` without deadlocking.
        let handler = self.handlers.get(event).map(|entry| entry.value().clone());
        match handler {
            Some(handler) => {
                handler(data);
                true
            }
            None => {
                trace!("No handler for {event}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Handler {
        let counter = counter.clone();
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_registering_twice_replaces() {
        let registry = HandlerRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        assert!(!registry.insert("chatResponse", counting(&first)));
        assert!(registry.insert("chatResponse", counting(&second)));
        assert_eq!(registry.len(), 1);

        assert!(registry.dispatch("chatResponse", json!({ "text": "oi" })));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_and_dispatch_unknown() {
        let registry = HandlerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.insert("meetingCreated", counting(&calls));

        assert!(registry.remove("meetingCreated"));
        assert!(!registry.remove("meetingCreated"));
        assert!(!registry.dispatch("meetingCreated", Value::Null));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handler_can_deregister_itself() {
        let registry = Arc::new(HandlerRegistry::new());
        let inner = registry.clone();
        registry.insert(
            "messageCreated",
            Arc::new(move |_| {
                inner.remove("messageCreated");
            }),
        );

        assert!(registry.dispatch("messageCreated", Value::Null));
        assert!(!registry.contains("messageCreated"));
    }
}
