//! Logging initialisation.

use ks_core::{Error, Result};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "kurosawa=trace,ks_av=trace,ks_pipeline=debug,ks_core=debug"
    } else {
        "kurosawa=info,ks_av=info,ks_pipeline=info,ks_core=warn"
    }
}

/// Install a `tracing` fmt subscriber.
///
/// `RUST_LOG` wins over the built-in defaults. Fails if a global subscriber
/// is already set.
pub fn init(verbose: bool) -> Result<()> {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| default_filter(verbose).to_string());

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .try_init()
        .map_err(|e| Error::Internal(format!("failed to install logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        for verbose in [false, true] {
            assert!(default_filter(verbose)
                .parse::<tracing_subscriber::EnvFilter>()
                .is_ok());
        }
    }

    #[test]
    fn second_init_fails() {
        let _ = init(false);
        assert!(init(false).is_err());
    }
}
