//! Parse Event Listeners
//!
//! Listeners observe the read pipeline: one callback per parsed indirect
//! object and one per content-stream operator. Dispatch is synchronous, in
//! registration order, on the parsing path itself. Listeners receive shared
//! references and cannot mutate the in-flight graph; they signal early
//! termination through their return value, which the loader turns into a
//! cancellation error so no partially built document escapes.

use crate::objects::{ObjectId, PdfObject};

/// Continuation flag returned by every listener callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerFlow {
    /// Keep parsing.
    Continue,
    /// Cancel the load; the caller receives a cancellation error.
    Stop,
}

/// Where an indirect object came from in the byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectLocation {
    /// The object's number and generation.
    pub id: ObjectId,
    /// Byte offset of the object body. For an object held inside a
    /// compressed container this is the container's offset.
    pub offset: u64,
}

/// Capability set for read-time observers.
///
/// Both methods default to doing nothing, so a listener implements only the
/// events it cares about.
pub trait EventListener {
    /// Called once per indirect object, immediately after it parses.
    fn on_object_parsed(&mut self, object: &PdfObject, location: ObjectLocation) -> ListenerFlow {
        let _ = (object, location);
        ListenerFlow::Continue
    }

    /// Called once per operator while page content streams are scanned,
    /// with the operands that preceded it in stream order.
    fn on_content_operator(&mut self, operator: &str, operands: &[PdfObject]) -> ListenerFlow {
        let _ = (operator, operands);
        ListenerFlow::Continue
    }
}

/// Fan-out over the listeners registered for one load call.
///
/// A hub is built fresh per call and borrows the listeners for the call's
/// duration; ownership stays with the caller.
pub struct EventHub<'a, 'l> {
    listeners: &'a mut [&'l mut dyn EventListener],
}

impl<'a, 'l> EventHub<'a, 'l> {
    pub fn new(listeners: &'a mut [&'l mut dyn EventListener]) -> Self {
        Self { listeners }
    }

    /// A hub with nobody listening.
    pub fn empty() -> EventHub<'static, 'static> {
        EventHub { listeners: &mut [] }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notify every listener in registration order. Stops at the first
    /// listener that requests cancellation.
    pub fn object_parsed(&mut self, object: &PdfObject, location: ObjectLocation) -> ListenerFlow {
        for listener in self.listeners.iter_mut() {
            if listener.on_object_parsed(object, location) == ListenerFlow::Stop {
                return ListenerFlow::Stop;
            }
        }
        ListenerFlow::Continue
    }

    /// Notify every listener of one content-stream operator.
    pub fn content_operator(&mut self, operator: &str, operands: &[PdfObject]) -> ListenerFlow {
        for listener in self.listeners.iter_mut() {
            if listener.on_content_operator(operator, operands) == ListenerFlow::Stop {
                return ListenerFlow::Stop;
            }
        }
        ListenerFlow::Continue
    }
}
