#![forbid(unsafe_code)]

//! The home screen: a title, a subtitle and one button bound to
//! `is_loading`.
//!
//! The screen subscribes to `is_loading` and re-renders its button whenever
//! the flag changes, no matter who changed it. Pressing the button flips the
//! flag; while loading, the button is disabled and presses are ignored.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use appstate::Subscription;
use tracing::debug;

use crate::components::{Button, Press};
use crate::state::{AppActions, AppState, AppStore};

pub const HEADING: &str = "Welcome";
pub const SUBTITLE: &str = "One store, one flag, re-rendered on change.";
pub const TITLE_IDLE: &str = "Press Me";
pub const TITLE_LOADING: &str = "Loading...";

/// What a press on the home screen did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// `is_loading` was flipped to the carried value.
    Toggled { is_loading: bool },
    /// The button was disabled.
    Ignored,
}

impl fmt::Display for PressOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toggled { is_loading } => write!(f, "toggled is_loading={is_loading}"),
            Self::Ignored => write!(f, "ignored (button disabled)"),
        }
    }
}

/// Home screen bound to the app store.
pub struct HomeScreen {
    store: AppStore,
    button: Rc<RefCell<Button>>,
    renders: Rc<Cell<u64>>,
    _subscription: Subscription,
}

impl fmt::Debug for HomeScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeScreen")
            .field("button", &*self.button.borrow())
            .field("renders", &self.renders.get())
            .finish_non_exhaustive()
    }
}

impl HomeScreen {
    /// Mount the screen on `store`. Counts as the first render.
    #[must_use]
    pub fn new(store: AppStore) -> Self {
        let button = Rc::new(RefCell::new(Button::new(TITLE_IDLE)));
        sync_button(&mut button.borrow_mut(), store.is_loading());
        let renders = Rc::new(Cell::new(1u64));

        let subscription = {
            let button = Rc::clone(&button);
            let renders = Rc::clone(&renders);
            store.subscribe(
                |s: &AppState| s.is_loading,
                move |is_loading| {
                    sync_button(&mut button.borrow_mut(), *is_loading);
                    renders.set(renders.get() + 1);
                    debug!(is_loading = *is_loading, renders = renders.get(), "home screen re-rendered");
                },
            )
        };

        Self {
            store,
            button,
            renders,
            _subscription: subscription,
        }
    }

    /// Press the button.
    pub fn press(&self) -> PressOutcome {
        let press = self.button.borrow_mut().press();
        if press == Press::Ignored {
            debug!("press ignored while loading");
            return PressOutcome::Ignored;
        }
        let is_loading = !self.store.is_loading();
        self.store.set_is_loading(is_loading);
        PressOutcome::Toggled { is_loading }
    }

    /// Current button as rendered.
    #[must_use]
    pub fn button(&self) -> Button {
        self.button.borrow().clone()
    }

    /// Renders so far, including the initial mount.
    #[must_use]
    pub fn renders(&self) -> u64 {
        self.renders.get()
    }

    /// Write the screen as plain text.
    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "{HEADING}")?;
        writeln!(out, "{SUBTITLE}")?;
        writeln!(out)?;
        writeln!(out, "{}", self.button.borrow())
    }

    #[must_use]
    pub fn render_to_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.render(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn sync_button(button: &mut Button, is_loading: bool) {
    button.set_title(if is_loading { TITLE_LOADING } else { TITLE_IDLE });
    button.set_disabled(is_loading);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_store;

    #[test]
    fn mounts_idle() {
        let screen = HomeScreen::new(create_store());
        assert_eq!(screen.button().title(), TITLE_IDLE);
        assert!(!screen.button().is_disabled());
        assert_eq!(screen.renders(), 1);
    }

    #[test]
    fn press_starts_loading_and_disables() {
        let store = create_store();
        let screen = HomeScreen::new(store.clone());
        assert_eq!(screen.press(), PressOutcome::Toggled { is_loading: true });
        assert!(store.is_loading());
        assert_eq!(screen.button().title(), TITLE_LOADING);
        assert!(screen.button().is_disabled());
        assert_eq!(screen.renders(), 2);

        assert_eq!(screen.press(), PressOutcome::Ignored);
        assert_eq!(screen.renders(), 2);
        assert_eq!(screen.button().presses(), 1);
    }

    #[test]
    fn external_change_rerenders() {
        let store = create_store();
        let screen = HomeScreen::new(store.clone());
        store.set_is_loading(true);
        store.set_is_loading(false);
        assert_eq!(screen.renders(), 3);
        assert_eq!(screen.button().title(), TITLE_IDLE);
    }

    #[test]
    fn dropping_screen_unsubscribes() {
        let store = create_store();
        let screen = HomeScreen::new(store.clone());
        assert_eq!(store.subscriber_count(), 1);
        drop(screen);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn render_text() {
        let screen = HomeScreen::new(create_store());
        let text = screen.render_to_string();
        assert!(text.starts_with(HEADING));
        assert!(text.contains("[ Press Me ]"));
    }
}
