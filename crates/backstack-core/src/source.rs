//! Connection between a registry and whatever produces back events.
//!
//! A [`BackEventSource`] is the platform side: a hardware button, a key
//! binding, a channel fed by a UI thread. It accepts [`BackListener`]s and
//! hands back a [`Subscription`], an owned handle that undoes the
//! subscription exactly once, either when [`Subscription::dispose`] is
//! called or when the handle is dropped.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::SourceResult;

/// Called by a source once per back event. Returns `true` if the event
/// was consumed; the source decides the default action otherwise.
pub type BackListener = Arc<dyn Fn() -> bool + Send + Sync>;

/// A producer of back navigation events.
pub trait BackEventSource: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Registers a listener for every subsequent back event.
    fn subscribe(&self, listener: BackListener) -> SourceResult<Subscription>;
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Owned handle to an active subscription.
pub struct Subscription {
    source_name: String,
    release: Option<ReleaseFn>,
}

impl Subscription {
    /// Creates a subscription that runs `release` when disposed or dropped.
    pub fn new<F>(source_name: impl Into<String>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            source_name: source_name.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Name of the source this subscription belongs to.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Releases the subscription now.
    pub fn dispose(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            debug!(source = %self.source_name, "Releasing back event subscription");
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("source_name", &self.source_name)
            .field("active", &self.release.is_some())
            .finish()
    }
}
