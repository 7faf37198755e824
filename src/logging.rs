//! Structured logging via `tracing`.
//!
//! Events go to stderr so that stdout carries only command output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::Error;

/// Environment variable holding a filter directive, e.g. `openapi_tree=debug`.
pub const LOG_ENV: &str = "OPENAPI_TREE_LOG";

/// Install the global subscriber. `OPENAPI_TREE_LOG` wins over `default_level`.
pub fn init(default_level: &str) -> Result<(), Error> {
    let filter = build_env_filter(default_level)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

fn build_env_filter(default_level: &str) -> Result<EnvFilter, Error> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }
    EnvFilter::try_new(default_level)
        .map_err(|e| Error::Logging(format!("invalid log directive `{default_level}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_default_level_is_rejected() {
        if std::env::var_os(LOG_ENV).is_some() {
            return;
        }
        assert!(matches!(
            build_env_filter("openapi_tree=loud"),
            Err(Error::Logging(_))
        ));
        assert!(build_env_filter("openapi_tree=debug,warn").is_ok());
    }
}
