#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo.
//!
//! Parses args by hand. Supports environment variable overrides via the
//! `APPSTATE_DEMO_*` prefix; explicit flags win over the environment.

use std::env;
use std::path::PathBuf;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
appstate demo: a home screen driven by an observable state store

USAGE:
    appstate-demo [OPTIONS]

OPTIONS:
    --presses=N        Press the button N times (default: 1)
    --complete         Mark loading as finished after the presses
    --state-dir=PATH   Save and restore app state under PATH
    --log=FILTER       Log filter, e.g. 'debug' or 'appstate=trace'
    --help, -h         Show this help message
    --version, -V      Show version

ENVIRONMENT VARIABLES:
    APPSTATE_DEMO_PRESSES    Override --presses
    APPSTATE_DEMO_COMPLETE   Override --complete (1/true to enable)
    APPSTATE_DEMO_STATE_DIR  Override --state-dir
    APPSTATE_DEMO_LOG        Override --log
    RUST_LOG                 Log filter when --log is not given";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// Number of button presses to simulate.
    pub presses: u32,
    /// Clear `is_loading` after the presses.
    pub complete: bool,
    /// Directory for persisted state.
    pub state_dir: Option<PathBuf>,
    /// Explicit log filter (None = RUST_LOG or default).
    pub log_filter: Option<String>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            presses: 1,
            complete: false,
            state_dir: None,
            log_filter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseError {
    Help,
    Version,
    InvalidValue { flag: &'static str, value: String },
    UnknownArg(String),
}

fn is_truthy(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl Opts {
    /// Parse command-line arguments and environment variables.
    pub fn parse() -> Self {
        match Self::parse_from_env_and_args(env::args().skip(1), |key| env::var(key).ok()) {
            Ok(opts) => opts,
            Err(ParseError::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Err(ParseError::Version) => {
                println!("appstate-demo {VERSION}");
                process::exit(0);
            }
            Err(ParseError::InvalidValue { flag, value }) => {
                eprintln!("Invalid {flag} value: {value}");
                process::exit(1);
            }
            Err(ParseError::UnknownArg(arg)) => {
                eprintln!("Unknown argument: {arg}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    fn parse_from_env_and_args<I, S, F>(args: I, get_env: F) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        if let Some(val) = get_env("APPSTATE_DEMO_PRESSES")
            && let Ok(n) = val.parse()
        {
            opts.presses = n;
        }
        if let Some(val) = get_env("APPSTATE_DEMO_COMPLETE") {
            opts.complete = is_truthy(&val);
        }
        if let Some(val) = get_env("APPSTATE_DEMO_STATE_DIR")
            && !val.trim().is_empty()
        {
            opts.state_dir = Some(PathBuf::from(val));
        }
        if let Some(val) = get_env("APPSTATE_DEMO_LOG")
            && !val.trim().is_empty()
        {
            opts.log_filter = Some(val);
        }

        for arg in args {
            match arg.as_ref() {
                "--help" | "-h" => return Err(ParseError::Help),
                "--version" | "-V" => return Err(ParseError::Version),
                "--complete" => opts.complete = true,
                other => {
                    if let Some(val) = other.strip_prefix("--presses=") {
                        opts.presses = val.parse().map_err(|_| ParseError::InvalidValue {
                            flag: "--presses",
                            value: val.to_string(),
                        })?;
                    } else if let Some(val) = other.strip_prefix("--state-dir=") {
                        if val.trim().is_empty() {
                            return Err(ParseError::InvalidValue {
                                flag: "--state-dir",
                                value: val.to_string(),
                            });
                        }
                        opts.state_dir = Some(PathBuf::from(val));
                    } else if let Some(val) = other.strip_prefix("--log=") {
                        opts.log_filter = Some(val.to_string());
                    } else {
                        return Err(ParseError::UnknownArg(other.to_string()));
                    }
                }
            }
        }

        Ok(opts)
    }
}
