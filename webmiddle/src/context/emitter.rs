//! Per-context event listeners.
//!
//! Each context owns an `Emitter`; emission walks from the emitting context
//! up through its ancestors (see `Context::emit`), so the emitter itself
//! only stores and dispatches handlers.

use crate::call_tree::CallNodeRef;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// `Internal` carries structural call-tree traffic; `Message` is public
/// progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Internal,
    Message,
}

#[derive(Debug, Clone)]
pub enum EventPayload {
    CallNode(CallNodeRef),
    Value(Value),
}

#[derive(Debug)]
pub struct Event {
    pub channel: Channel,
    pub name: String,
    pub payload: EventPayload,
    stopped: Cell<bool>,
}

impl Event {
    pub fn new(channel: Channel, name: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            channel,
            name: name.into(),
            payload,
            stopped: Cell::new(false),
        }
    }

    /// Keep the event from reaching ancestor contexts. Public `Message`
    /// events always reach every ancestor.
    pub fn stop_propagation(&self) {
        if self.channel == Channel::Internal {
            self.stopped.set(true);
        }
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Rc<dyn Fn(&Event)>;

struct Listener {
    id: ListenerId,
    channel: Channel,
    name: String,
    handler: Handler,
}

#[derive(Default)]
pub struct Emitter {
    listeners: RefCell<Vec<Listener>>,
    next_id: Cell<u64>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, channel: Channel, name: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&Event) + 'static,
    {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push(Listener {
            id,
            channel,
            name: name.into(),
            handler: Rc::new(handler),
        });
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Run the matching handlers registered here. Handlers are collected
    /// first so they may register or remove listeners while running.
    pub fn dispatch(&self, event: &Event) {
        let handlers: Vec<Handler> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.channel == event.channel && l.name == event.name)
            .map(|l| l.handler.clone())
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
