//! Back handlers.
//!
//! A handler answers one question per back event: "did you consume it?".
//! Returning `true` stops the chain; returning `false` lets the next
//! lower-priority handler have a go.
//!
//! Handlers are synchronous. A handler that needs to do asynchronous work
//! should answer the current event right away and trigger its own follow-up
//! later.

use std::sync::Arc;

/// A callback taking part in back event dispatch.
///
/// Implemented for every `Fn() -> bool + Send + Sync + 'static`, so plain
/// closures are handlers:
///
/// ```rust
/// use backstack_core::BackHandler;
///
/// let close_modal = || true;
/// assert!(close_modal.handle());
/// ```
pub trait BackHandler: Send + Sync + 'static {
    /// Handles one back event. Returns `true` if the event was consumed.
    fn handle(&self) -> bool;
}

impl<F> BackHandler for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn handle(&self) -> bool {
        self()
    }
}

/// A type-erased, shareable handler.
///
/// `Arc` keeps dispatch snapshots cheap: cloning the handler list only bumps
/// reference counts.
pub type BoxedHandler = Arc<dyn BackHandler>;

/// Erases a handler into a [`BoxedHandler`].
pub fn into_handler<H: BackHandler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}
