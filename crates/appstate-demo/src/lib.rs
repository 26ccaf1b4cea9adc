#![forbid(unsafe_code)]

//! Headless home-screen demo for the `appstate` store.
//!
//! [`app::run`] is the composition root: it builds the one [`state::AppStore`],
//! optionally attaches persistence, mounts [`screen::HomeScreen`] and
//! simulates button presses, writing every rendered frame.

pub mod app;
pub mod cli;
pub mod components;
pub mod logging;
pub mod screen;
pub mod state;
