#![forbid(unsafe_code)]

//! Composition root: builds the store, mounts the screen, drives presses.

use std::fmt;
use std::io::{self, Write};

use appstate::StoreError;
use tracing::{info, warn};

use crate::cli::Opts;
use crate::screen::HomeScreen;
use crate::state::{AppActions, create_store};

/// Storage key for the persisted app state.
pub const STATE_KEY: &str = "app-state";

/// Errors from a demo run.
#[derive(Debug)]
pub enum DemoError {
    /// Writing the rendered screen failed.
    Io(io::Error),
    /// Restoring or saving state failed.
    Store(StoreError),
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "output error: {err}"),
            Self::Store(err) => write!(f, "state error: {err}"),
        }
    }
}

impl std::error::Error for DemoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<io::Error> for DemoError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<StoreError> for DemoError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub renders: u64,
    pub version: u64,
    pub is_loading: bool,
}

/// Run the demo, writing each rendered frame to `out`.
///
/// # Errors
///
/// Returns an error if output fails or persisted state cannot be restored.
pub fn run(opts: &Opts, out: &mut impl Write) -> Result<RunSummary, DemoError> {
    let store = create_store();

    #[cfg(feature = "state-persistence")]
    let persisted = match &opts.state_dir {
        Some(dir) => Some(appstate::persist::persist(
            &store,
            appstate::persist::FileStorage::new(dir),
            STATE_KEY,
        )?),
        None => None,
    };
    #[cfg(not(feature = "state-persistence"))]
    if opts.state_dir.is_some() {
        warn!("built without state-persistence; ignoring --state-dir");
    }

    let screen = HomeScreen::new(store.clone());
    screen.render(out)?;

    for n in 1..=opts.presses {
        let outcome = screen.press();
        writeln!(out, "-- press {n}: {outcome}")?;
        screen.render(out)?;
    }

    if opts.complete {
        store.set_is_loading(false);
        writeln!(out, "-- loading complete")?;
        screen.render(out)?;
    }

    #[cfg(feature = "state-persistence")]
    if let Some(handle) = &persisted
        && handle.failed_saves() > 0
    {
        warn!(failed = handle.failed_saves(), "some state saves failed");
    }

    let summary = RunSummary {
        renders: screen.renders(),
        version: store.version(),
        is_loading: store.is_loading(),
    };
    info!(
        renders = summary.renders,
        version = summary.version,
        is_loading = summary.is_loading,
        "demo finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_string(opts: &Opts) -> (RunSummary, String) {
        let mut buf = Vec::new();
        let summary = run(opts, &mut buf).expect("run");
        (summary, String::from_utf8(buf).expect("utf8"))
    }

    #[test]
    fn single_press_starts_loading() {
        let (summary, text) = run_to_string(&Opts::default());
        assert!(summary.is_loading);
        assert_eq!(summary.renders, 2);
        assert!(text.contains("-- press 1: toggled is_loading=true"));
        assert!(text.contains("[ Loading... ] (disabled)"));
    }

    #[test]
    fn extra_presses_are_ignored_until_complete() {
        let opts = Opts {
            presses: 3,
            complete: true,
            ..Opts::default()
        };
        let (summary, text) = run_to_string(&opts);
        assert_eq!(text.matches("ignored (button disabled)").count(), 2);
        assert!(!summary.is_loading);
        assert_eq!(summary.version, 2);
        assert_eq!(summary.renders, 3);
    }

    #[test]
    fn zero_presses_renders_once() {
        let opts = Opts {
            presses: 0,
            ..Opts::default()
        };
        let (summary, text) = run_to_string(&opts);
        assert_eq!(summary.renders, 1);
        assert_eq!(summary.version, 0);
        assert_eq!(text.matches("Welcome").count(), 1);
    }

    #[test]
    fn error_display() {
        let err = DemoError::from(io::Error::other("closed"));
        assert_eq!(err.to_string(), "output error: closed");
    }
}
