//! Tracing subscriber setup shared by the service binaries

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive used when `RUST_LOG` is not set
///
/// `crate_target` is the binary's tracing target (e.g. `invest_app`).
pub fn default_directive(crate_target: &str, level: &str) -> String {
    format!(
        "{crate_target}={level},invest_common={level},invest_llm={level},tower_http={level}"
    )
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level. When `logging.file` is set,
/// output is appended to that file instead of stderr.
pub fn init(crate_target: &str, config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(crate_target, &config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
        None => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
    .map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_covers_service_crates() {
        let directive = default_directive("invest_app", "debug");
        assert!(directive.starts_with("invest_app=debug"));
        assert!(directive.contains("tower_http=debug"));
        assert!(EnvFilter::try_new(&directive).is_ok());
    }
}
