//! Log output for the layer.
//!
//! The layer lives inside a host that may already have installed a global
//! subscriber. In that case ours is skipped and events go to the host's.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber filtered at `log_level`.
///
/// `log_level` takes `EnvFilter` directives (`"info"`,
/// `"warn,framewatch=debug"`). The config loader already folds `RUST_LOG`
/// into it. Returns `false` when a subscriber was already installed.
pub fn init(log_level: &str) -> Result<bool> {
    let env_filter = EnvFilter::try_new(log_level)
        .with_context(|| format!("invalid log filter '{}'", log_level))?;

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("framewatch logging at '{}'", log_level);
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_filter_is_an_error() {
        assert!(init("framewatch=notalevel").is_err());
    }

    #[test]
    fn test_second_init_is_tolerated() {
        let _ = init("info").unwrap();
        assert!(!init("debug").unwrap());
    }
}
