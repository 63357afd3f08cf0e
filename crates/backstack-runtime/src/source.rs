//! Channel-backed back event source.
//!
//! Whatever produces back presses (a key binding, a platform callback, a
//! test) holds a [`BackSender`]. The shell owns the receiving
//! [`ChannelSource`] and turns every press into one call of each subscribed
//! listener.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use backstack_core::{BackEventSource, BackListener, SourceResult, Subscription};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

use crate::error::{RuntimeError, RuntimeResult};

/// Channel capacity used when no configuration is available.
pub const DEFAULT_CHANNEL_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// One back press travelling through the channel.
#[derive(Debug, Clone, Copy)]
pub struct BackPress {
    sent_at: Instant,
}

impl BackPress {
    fn now() -> Self {
        Self {
            sent_at: Instant::now(),
        }
    }

    /// When the press was sent.
    pub fn sent_at(&self) -> Instant {
        self.sent_at
    }
}

/// Sending half of a back event channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BackSender {
    tx: mpsc::Sender<BackPress>,
}

impl BackSender {
    /// Sends a back press, waiting for room in the channel.
    pub async fn press(&self) -> RuntimeResult<()> {
        self.tx
            .send(BackPress::now())
            .await
            .map_err(|_| RuntimeError::SourceClosed)
    }

    /// Sends a back press without waiting.
    pub fn try_press(&self) -> RuntimeResult<()> {
        match self.tx.try_send(BackPress::now()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RuntimeError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(RuntimeError::SourceClosed),
        }
    }

    /// Returns whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

type ListenerList = Arc<Mutex<Vec<(u64, BackListener)>>>;

/// Receiving half of a back event channel, usable as a [`BackEventSource`].
pub struct ChannelSource {
    name: String,
    rx: mpsc::Receiver<BackPress>,
    weak_tx: mpsc::WeakSender<BackPress>,
    listeners: ListenerList,
    next_key: AtomicU64,
}

impl ChannelSource {
    /// Creates a source buffering up to `capacity` presses, and its first
    /// sender. The channel closes once every sender is dropped.
    pub fn new(name: impl Into<String>, capacity: NonZeroUsize) -> (Self, BackSender) {
        let (tx, rx) = mpsc::channel(capacity.get());
        let source = Self {
            name: name.into(),
            rx,
            weak_tx: tx.downgrade(),
            listeners: Arc::default(),
            next_key: AtomicU64::new(0),
        };
        (source, BackSender { tx })
    }

    /// Returns another sender, if the channel is still open.
    pub fn sender(&self) -> Option<BackSender> {
        self.weak_tx.upgrade().map(|tx| BackSender { tx })
    }

    /// Waits for the next back press. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<BackPress> {
        self.rx.recv().await
    }

    /// Delivers one back event to the listeners, in subscription order,
    /// until one consumes it. Returns whether it was consumed.
    ///
    /// Listeners run outside the listener lock, so they may subscribe or
    /// unsubscribe while being called.
    pub fn emit(&self) -> bool {
        let listeners: Vec<BackListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        trace!(source = %self.name, listeners = listeners.len(), "Emitting back event");
        listeners.iter().any(|listener| listener())
    }

    /// Returns the number of active subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl BackEventSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&self, listener: BackListener) -> SourceResult<Subscription> {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((key, listener));
        debug!(source = %self.name, key, "Listener subscribed");

        let listeners = Arc::clone(&self.listeners);
        Ok(Subscription::new(self.name.clone(), move || {
            listeners.lock().retain(|(k, _)| *k != key);
        }))
    }
}

impl std::fmt::Debug for ChannelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSource")
            .field("name", &self.name)
            .field("listener_count", &self.listener_count())
            .finish()
    }
}
