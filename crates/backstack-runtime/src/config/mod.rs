//! Configuration module for the Backstack runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for logging, dispatch and shell settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BackstackConfig, DispatchConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, ShellConfig,
    SpanEventConfig, UnhandledBack,
};
pub use validation::validate_config;
