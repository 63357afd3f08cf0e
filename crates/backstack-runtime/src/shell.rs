//! The application shell's back event loop.
//!
//! [`Shell`] owns the handler registry, the channel the back presses arrive
//! on and the loaded configuration. It is the collaborator that decides
//! what happens when no handler consumes a press.
//!
//! ```rust,ignore
//! use backstack_runtime::{Shell, ShellExit};
//!
//! let mut shell = Shell::builder().config_file("backstack.toml").build()?;
//! let back = shell.sender().expect("fresh shell has an open channel");
//!
//! let _drawer = shell.registry().register(|| drawer.close(), 100);
//!
//! // Hand `back` to the platform layer, then:
//! match shell.run().await? {
//!     ShellExit::Unhandled => println!("back on root screen, exiting"),
//!     other => println!("stopped: {other:?}"),
//! }
//! ```

use std::future::Future;
use std::num::NonZeroUsize;

use backstack_core::HandlerRegistry;
use tokio::signal;
use tracing::{debug, info, trace, warn};

use crate::config::{
    BackstackConfig, ConfigError, ConfigLoader, ConfigResult, UnhandledBack, validate_config,
};
use crate::error::RuntimeResult;
use crate::logging;
use crate::source::{BackSender, ChannelSource, DEFAULT_CHANNEL_CAPACITY};

/// Why [`Shell::run_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// A back press was not consumed and the default action is
    /// [`UnhandledBack::Exit`].
    Unhandled,
    /// The shutdown future completed.
    Shutdown,
    /// Every [`BackSender`] was dropped.
    SourceClosed,
}

/// Owns a registry and feeds it back presses.
pub struct Shell {
    config: BackstackConfig,
    registry: HandlerRegistry,
    source: ChannelSource,
    /// Keeps the channel open until the loop starts.
    primary: Option<BackSender>,
}

impl Shell {
    /// Creates a shell, loading configuration from the current directory.
    ///
    /// Falls back to defaults if loading fails.
    pub fn new() -> Self {
        ConfigLoader::new()
            .with_current_dir()
            .load()
            .and_then(|config| Self::from_config(&config))
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                Self::assemble(&BackstackConfig::default(), DEFAULT_CHANNEL_CAPACITY)
            })
    }

    /// Creates a shell builder for custom configuration.
    pub fn builder() -> ShellBuilder {
        ShellBuilder::new()
    }

    /// Validates `config`, initializes logging and creates the shell.
    pub fn from_config(config: &BackstackConfig) -> ConfigResult<Self> {
        validate_config(config)?;
        let capacity = NonZeroUsize::new(config.shell.channel_capacity).ok_or_else(|| {
            ConfigError::validation("shell.channel_capacity must be greater than 0")
        })?;

        Ok(Self::assemble(config, capacity))
    }

    fn assemble(config: &BackstackConfig, capacity: NonZeroUsize) -> Self {
        logging::init_from_config(&config.logging);

        let registry = HandlerRegistry::new().with_policy(config.dispatch.failure_policy);
        let (source, primary) = ChannelSource::new("back-channel", capacity);

        info!(
            failure_policy = %config.dispatch.failure_policy,
            unhandled_back = ?config.shell.unhandled_back,
            channel_capacity = capacity.get(),
            "Shell initialized from configuration"
        );

        Self {
            config: config.clone(),
            registry,
            source,
            primary: Some(primary),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BackstackConfig {
        &self.config
    }

    /// Returns the handler registry. Clone it to hand it to components.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Returns a sender for back presses, if the channel is still open.
    ///
    /// Take senders before running: the shell drops its own sender when the
    /// loop starts, and the loop ends once every sender is gone.
    pub fn sender(&self) -> Option<BackSender> {
        self.source.sender()
    }

    /// Runs until Ctrl+C (or SIGTERM on unix), an unhandled back press under
    /// [`UnhandledBack::Exit`], or the channel closing.
    pub async fn run(&mut self) -> RuntimeResult<ShellExit> {
        let shutdown = shutdown_signal()?;
        self.run_until(shutdown).await
    }

    /// Runs until `shutdown` completes, an unhandled back press under
    /// [`UnhandledBack::Exit`], or the channel closing.
    ///
    /// The registry is attached to the channel for the duration of the
    /// loop and detached afterwards, also when a handler panic unwinds
    /// out of the loop.
    pub async fn run_until<F>(&mut self, shutdown: F) -> RuntimeResult<ShellExit>
    where
        F: Future<Output = ()>,
    {
        self.registry.attach(&self.source)?;
        let _attached = DetachOnDrop(self.registry.clone());
        self.primary = None;

        tokio::pin!(shutdown);
        info!("Shell is now running");

        let exit = loop {
            tokio::select! {
                () = &mut shutdown => break ShellExit::Shutdown,
                press = self.source.recv() => {
                    let Some(press) = press else {
                        debug!("All back senders dropped");
                        break ShellExit::SourceClosed;
                    };

                    trace!(queued = ?press.sent_at().elapsed(), "Back press received");
                    if self.source.emit() {
                        continue;
                    }

                    match self.config.shell.unhandled_back {
                        UnhandledBack::Exit => {
                            info!("Back press not consumed, exiting");
                            break ShellExit::Unhandled;
                        }
                        UnhandledBack::Ignore => {
                            debug!("Back press not consumed, ignoring");
                        }
                    }
                }
            }
        };

        info!(?exit, "Shell stopped");
        Ok(exit)
    }
}

/// Detaches the registry from its source when the run loop ends.
struct DetachOnDrop(HandlerRegistry);

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        if self.0.detach() {
            debug!("Handler registry detached from back channel");
        }
    }
}

/// Completes on Ctrl+C or SIGTERM.
#[cfg(unix)]
fn shutdown_signal() -> RuntimeResult<impl Future<Output = ()>> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            result = signal::ctrl_c() => match result {
                Ok(()) => info!("Received Ctrl+C, shutting down"),
                Err(e) => warn!(error = %e, "Ctrl+C listener failed, shutting down"),
            },
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        }
    })
}

/// Completes on Ctrl+C.
#[cfg(not(unix))]
fn shutdown_signal() -> RuntimeResult<impl Future<Output = ()>> {
    Ok(async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => warn!(error = %e, "Ctrl+C listener failed, shutting down"),
        }
    })
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("registry", &self.registry)
            .field("source", &self.source)
            .finish()
    }
}

// =============================================================================
// ShellBuilder
// =============================================================================

/// Builder for creating a [`Shell`] with custom configuration.
pub struct ShellBuilder {
    config_loader: ConfigLoader,
}

impl ShellBuilder {
    /// Creates a new shell builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: BackstackConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Builds the shell.
    pub fn build(self) -> ConfigResult<Shell> {
        let config = self.config_loader.load()?;
        Shell::from_config(&config)
    }
}

impl Default for ShellBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backstack_core::FailurePolicy;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shell_with(unhandled_back: UnhandledBack) -> Shell {
        let mut config = BackstackConfig::default();
        config.shell.unhandled_back = unhandled_back;
        Shell::from_config(&config).unwrap()
    }

    fn counting(
        counter: &Arc<AtomicUsize>,
        consume: bool,
    ) -> impl Fn() -> bool + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            consume
        }
    }

    #[tokio::test]
    async fn test_unhandled_press_exits() {
        let mut shell = shell_with(UnhandledBack::Exit);
        let sender = shell.sender().unwrap();

        sender.press().await.unwrap();
        let exit = shell.run_until(std::future::pending()).await.unwrap();

        assert_eq!(exit, ShellExit::Unhandled);
        assert!(!shell.registry().is_attached());
    }

    #[tokio::test]
    async fn test_consumed_presses_keep_running() {
        let mut shell = shell_with(UnhandledBack::Exit);
        let counter = Arc::new(AtomicUsize::new(0));
        let _modal = shell.registry().register(counting(&counter, true), 10);

        let sender = shell.sender().unwrap();
        sender.press().await.unwrap();
        sender.press().await.unwrap();
        drop(sender);

        let exit = shell.run_until(std::future::pending()).await.unwrap();

        assert_eq!(exit, ShellExit::SourceClosed);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ignore_policy_keeps_running() {
        let mut shell = shell_with(UnhandledBack::Ignore);
        let counter = Arc::new(AtomicUsize::new(0));
        shell.registry().add(counting(&counter, false), 0);

        let sender = shell.sender().unwrap();
        sender.press().await.unwrap();
        sender.press().await.unwrap();
        drop(sender);

        let exit = shell.run_until(std::future::pending()).await.unwrap();

        assert_eq!(exit, ShellExit::SourceClosed);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_handler_removed_between_presses() {
        let mut shell = shell_with(UnhandledBack::Exit);
        let counter = Arc::new(AtomicUsize::new(0));

        // The drawer closes itself on the first press.
        let registry = shell.registry().clone();
        let drawer_id = Arc::new(parking_lot::Mutex::new(None));
        let drawer = {
            let registry = registry.clone();
            let drawer_id = Arc::clone(&drawer_id);
            let counter = Arc::clone(&counter);
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = drawer_id.lock().take() {
                    registry.remove(id);
                }
                true
            }
        };
        *drawer_id.lock() = Some(registry.add(drawer, 50));

        let sender = shell.sender().unwrap();
        sender.press().await.unwrap();
        sender.press().await.unwrap();

        let exit = shell.run_until(std::future::pending()).await.unwrap();

        assert_eq!(exit, ShellExit::Unhandled);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_future_stops_loop() {
        let mut shell = shell_with(UnhandledBack::Exit);
        let _sender = shell.sender().unwrap();

        let exit = shell.run_until(async {}).await.unwrap();

        assert_eq!(exit, ShellExit::Shutdown);
        assert!(!shell.registry().is_attached());
    }

    #[tokio::test]
    async fn test_isolate_policy_from_config() {
        let mut config = BackstackConfig::default();
        config.dispatch.failure_policy = FailurePolicy::Isolate;
        let mut shell = Shell::from_config(&config).unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        shell.registry().add(|| -> bool { panic!("broken modal") }, 10);
        shell.registry().add(counting(&counter, true), 0);

        let sender = shell.sender().unwrap();
        sender.press().await.unwrap();
        drop(sender);

        let exit = shell.run_until(std::future::pending()).await.unwrap();

        assert_eq!(exit, ShellExit::SourceClosed);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_capacity_config_rejected() {
        let mut config = BackstackConfig::default();
        config.shell.channel_capacity = 0;

        let err = Shell::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_handler_panic_detaches_registry() {
        let mut shell = shell_with(UnhandledBack::Exit);
        let registry = shell.registry().clone();
        registry.add(|| -> bool { panic!("broken drawer") }, 10);

        let sender = shell.sender().unwrap();
        sender.press().await.unwrap();

        let run = tokio::spawn(async move { shell.run_until(std::future::pending()).await });
        let err = run.await.unwrap_err();

        assert!(err.is_panic());
        assert!(!registry.is_attached());
        assert_eq!(registry.len(), 1);
    }
}
