//! Window-level pointer listeners with scoped lifetimes.
//!
//! A cursor drag must keep following the pointer once it leaves the widget,
//! so the widget registers a listener on the host window. Registration
//! returns a [`ListenerGuard`]; dropping the guard removes the listener.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A pointer move as seen by the whole window, in widget coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPointerEvent {
    pub x: f64,
    pub y: f64,
    /// Bitmask of held buttons, 0 when none.
    pub buttons: u8,
}

type Handler = Rc<RefCell<dyn FnMut(&WindowPointerEvent)>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

/// The host window's pointer event source.
#[derive(Clone, Default)]
pub struct WindowEvents {
    registry: Rc<RefCell<Registry>>,
}

impl std::fmt::Debug for WindowEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowEvents")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl WindowEvents {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "the listener is removed when the guard is dropped"]
    pub fn listen(&self, handler: impl FnMut(&WindowPointerEvent) + 'static) -> ListenerGuard {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.push((id, Rc::new(RefCell::new(handler))));
        ListenerGuard {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Deliver an event to every listener registered at call time. Handlers
    /// may register or drop listeners while running.
    pub fn dispatch(&self, event: &WindowPointerEvent) {
        let handlers: Vec<Handler> = self
            .registry
            .borrow()
            .handlers
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        for handler in handlers {
            // A handler that re-dispatches into itself is skipped.
            if let Ok(mut handler) = handler.try_borrow_mut() {
                (&mut *handler)(event);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().handlers.len()
    }
}

/// Keeps a window listener alive.
#[derive(Debug)]
pub struct ListenerGuard {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if let Ok(mut registry) = registry.try_borrow_mut() {
            registry.handlers.retain(|(id, _)| *id != self.id);
        }
    }
}
