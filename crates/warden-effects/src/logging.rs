//! Logging bootstrap

use tracing_subscriber::EnvFilter;
use warden_core::config::LoggingConfig;
use warden_core::{Result, WardenError};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `Ok(false)`
/// if a subscriber was already installed, so repeated calls are harmless.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            WardenError::validation(format!("invalid log level {:?}: {e}", config.level))
        })?,
    };
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init()
        .is_ok();
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());
    }
}
