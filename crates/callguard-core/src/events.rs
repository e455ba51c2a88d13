//! Event system shared by every guard.
//!
//! Rate limiters and circuit breakers emit typed events to listeners registered
//! on their builders. Listeners run inline on the calling thread, so they should
//! be cheap; a panicking listener is isolated from the others.

use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// An event emitted by a guard instance.
pub trait GuardEvent: Send + Sync + fmt::Debug {
    /// Short, stable name of the event (e.g. `"PermitRejected"`).
    fn event_type(&self) -> &'static str;

    /// When the event was emitted.
    fn timestamp(&self) -> Instant;

    /// Name of the limiter or breaker that emitted the event.
    fn source_name(&self) -> &str;
}

/// Receives events of type `E`.
pub trait EventListener<E: GuardEvent>: Send + Sync {
    /// Called once per emitted event.
    fn on_event(&self, event: &E);
}

/// Shared, type-erased listener.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered set of listeners for one event type.
#[derive(Clone)]
pub struct EventListeners<E: GuardEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: GuardEvent> EventListeners<E> {
    /// Creates an empty listener set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener. Listeners are invoked in registration order.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Delivers `event` to every listener.
    ///
    /// A listener that panics is skipped; the remaining listeners still run and
    /// the panic never reaches the guard's own state.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: GuardEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: GuardEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Listener backed by a closure.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f` as a listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: GuardEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
