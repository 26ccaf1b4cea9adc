#![forbid(unsafe_code)]

//! Log setup for the demo binary.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `--log` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "warn";

/// Resolve the log filter: explicit filter, then `RUST_LOG`, then
/// [`DEFAULT_FILTER`].
#[must_use]
pub fn build_filter(explicit: Option<&str>) -> EnvFilter {
    match explicit {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|err| {
            eprintln!("Invalid log filter '{directives}': {err}; using '{DEFAULT_FILTER}'");
            EnvFilter::new(DEFAULT_FILTER)
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Install a stderr fmt subscriber. Safe to call more than once.
pub fn init(explicit: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(explicit))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_is_used() {
        assert_eq!(build_filter(Some("debug")).to_string(), "debug");
    }

    #[test]
    fn invalid_filter_falls_back() {
        assert_eq!(build_filter(Some("appstate=notalevel")).to_string(), DEFAULT_FILTER);
    }
}
