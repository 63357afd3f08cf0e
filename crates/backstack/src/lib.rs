//! # Backstack
//!
//! Priority-ordered back navigation handling for application shells.
//!
//! UI components register handlers for the back signal; on every press the
//! highest-priority handler gets first refusal and lower ones only run if
//! it declines. When nobody consumes the press, the shell applies its
//! default action.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌─────────────────────────────┐
//! │  BackSender  │───▶│    Shell     │───▶│ HandlerRegistry             │
//! │ (platform)   │    │ (event loop) │    │  modal   (200) ─ consumed?  │
//! └──────────────┘    └──────┬───────┘    │  drawer  (100) ─ consumed?  │
//!                            │            │  stack   (0)   ─ consumed?  │
//!                            ▼            └─────────────────────────────┘
//!                  default action (exit / ignore)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use backstack::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut shell = Shell::new();
//!     let back = shell.sender().expect("channel open before run");
//!
//!     let _modal = shell.registry().register(|| close_modal(), 200);
//!
//!     shell.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): load `backstack.toml`
//! - `yaml-config`: load `backstack.yaml`
//! - `json-log`: JSON log output

pub use backstack_core as core;
pub use backstack_runtime as runtime;

pub use backstack_core::{
    BackEventSource, BackHandler, BackListener, DispatchOutcome, FailurePolicy, HandlerGuard,
    HandlerId, HandlerRegistry, Priority, SourceError, SourceResult, Subscription,
};
pub use backstack_runtime::{
    BackSender, BackstackConfig, ChannelSource, ConfigLoader, LoggingBuilder, RuntimeError,
    RuntimeResult, Shell, ShellBuilder, ShellExit, UnhandledBack,
};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use backstack::prelude::*;
/// ```
pub mod prelude {
    // Registry - the handler chain
    pub use backstack_core::{
        BackHandler, DispatchOutcome, FailurePolicy, HandlerGuard, HandlerId, HandlerRegistry,
        Priority,
    };

    // Runtime - the shell around it
    pub use backstack_runtime::{BackSender, Shell, ShellExit, UnhandledBack};

    // Logging macros
    pub use backstack_runtime::prelude::*;
}
