//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BackstackConfig, LogOutput, LoggingConfig, ShellConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &BackstackConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_shell_config(&config.shell)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output is 'file' but logging.file_path is not set",
        ));
    }

    if logging.filters.keys().any(|module| module.trim().is_empty()) {
        return Err(ConfigError::validation(
            "logging.filters contains an empty module name",
        ));
    }

    Ok(())
}

fn validate_shell_config(shell: &ShellConfig) -> ConfigResult<()> {
    if shell.channel_capacity == 0 {
        return Err(ConfigError::validation(
            "shell.channel_capacity must be greater than 0",
        ));
    }

    Ok(())
}
