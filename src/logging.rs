use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "glyphfield=info";
pub const VERBOSE_FILTER: &str = "glyphfield=debug";

/// Filter used when `RUST_LOG` is unset or unparsable.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Installs a stderr `fmt` subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Subscriber for tests: output is captured per test.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(VERBOSE_FILTER))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::{default_directive, init, init_for_tests};

    #[test]
    fn verbosity_selects_filter() {
        assert_eq!(default_directive(false), "glyphfield=info");
        assert_eq!(default_directive(true), "glyphfield=debug");
    }

    #[test]
    fn repeated_initialization_is_harmless() {
        init_for_tests();
        init(true);
        tracing::debug!("logging initialized twice");
    }
}
