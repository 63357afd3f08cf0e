//! Backstack Runtime - the application-shell side of back navigation.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `BackstackConfig`)
//! - Logging setup (`LoggingBuilder`)
//! - A channel-backed back event source (`ChannelSource`, `BackSender`)
//! - The event loop that applies the default action (`Shell`)
//!
//! ```ignore
//! use backstack_runtime::Shell;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut shell = Shell::new();
//!     let back = shell.sender().expect("channel open before run");
//!
//!     // Hand `back` to whatever detects the back gesture, register
//!     // handlers on `shell.registry()`, then:
//!     shell.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod shell;
pub mod source;

// Re-exports
pub use config::{BackstackConfig, ConfigError, ConfigLoader, ConfigResult, UnhandledBack};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use shell::{Shell, ShellBuilder, ShellExit};
pub use source::{BackPress, BackSender, ChannelSource, DEFAULT_CHANNEL_CAPACITY};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports of the logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
