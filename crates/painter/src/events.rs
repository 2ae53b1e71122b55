//! Events emitted by the brush engine for undo grouping and host sync.
//!
//! Hosts record an undo step on [`PainterEvent::StrokeStarted`] so a whole
//! drag collapses into one step, and refresh any cached state on the others.

use crate::brush::PainterMode;
use crate::store::ClearScope;

/// Notifications about painter state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum PainterEvent {
    /// A stroke began; nothing has been painted by it yet.
    StrokeStarted { stroke_id: u64, mode: PainterMode },
    /// A stroke finished after painting `dabs` times.
    StrokeEnded {
        stroke_id: u64,
        mode: PainterMode,
        dabs: usize,
    },
    /// A paint call changed the store; `count` is the new instance count.
    Painted { mode: PainterMode, count: usize },
    /// Stored instances were discarded.
    Cleared { scope: ClearScope },
    /// The capacity changed, discarding `truncated` instances.
    CapacityChanged {
        previous: usize,
        capacity: usize,
        truncated: usize,
    },
    /// A snapshot replaced the stored instances.
    Restored { count: usize },
}

/// Registered event listeners.
#[derive(Default)]
pub struct PainterEvents {
    #[allow(clippy::type_complexity)]
    listeners: Vec<Box<dyn Fn(PainterEvent) + Send + Sync>>,
}

impl std::fmt::Debug for PainterEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PainterEvents")
            .field("listener_count", &self.listeners.len())
            .finish()
    }
}

impl PainterEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; every later event is delivered to it.
    pub fn add_listener<F>(&mut self, listener: F)
    where
        F: Fn(PainterEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver `event` to every listener in registration order.
    pub fn emit(&self, event: PainterEvent) {
        for listener in &self.listeners {
            listener(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_reaches_every_listener() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let mut events = PainterEvents::new();
        for tag in 0..2 {
            let received = Arc::clone(&received);
            events.add_listener(move |event| received.lock().unwrap().push((tag, event)));
        }
        assert_eq!(events.listener_count(), 2);

        events.emit(PainterEvent::Restored { count: 3 });
        let received = received.lock().unwrap();
        assert_eq!(
            *received,
            vec![
                (0, PainterEvent::Restored { count: 3 }),
                (1, PainterEvent::Restored { count: 3 }),
            ]
        );
    }

    #[test]
    fn test_emit_without_listeners() {
        PainterEvents::new().emit(PainterEvent::Cleared {
            scope: ClearScope::Everything,
        });
    }
}
