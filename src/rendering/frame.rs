//! Before-render registration
//!
//! The engine's per-frame tick is the only scheduler in the scene. Listeners
//! registered here run once per rendered frame, in registration order.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Work that runs right before each frame is rendered
pub trait FrameListener {
    fn before_render(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type OnceCallback = Box<dyn FnOnce()>;

#[derive(Default)]
pub struct FrameLoop {
    next_id: u64,
    listeners: Vec<(ListenerId, Rc<RefCell<dyn FrameListener>>)>,
    once: Vec<OnceCallback>,
    frame_count: u64,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_before_render(&mut self, listener: Rc<RefCell<dyn FrameListener>>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false when `id` was not registered
    pub fn unregister_before_render(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Queue a callback for the start of the next frame only
    pub fn run_once(&mut self, callback: impl FnOnce() + 'static) {
        self.once.push(Box::new(callback));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn render_frame(&mut self) {
        self.frame_count += 1;
        trace!(frame = self.frame_count, listeners = self.listeners.len(), "before render");

        for callback in std::mem::take(&mut self.once) {
            callback();
        }

        for (_, listener) in &self.listeners {
            listener.borrow_mut().before_render();
        }
    }
}
