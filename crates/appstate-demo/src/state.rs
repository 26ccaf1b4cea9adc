#![forbid(unsafe_code)]

//! Application state for the demo and its setter methods.

use appstate::Store;

appstate::define_state! {
    /// Cross-cutting UI state shared by every screen.
    #[cfg_attr(
        feature = "state-persistence",
        derive(serde::Serialize, serde::Deserialize)
    )]
    pub struct AppState patch AppStatePatch {
        /// A long-running action is in progress.
        pub is_loading: bool = false,
    }
}

/// The shared store type used throughout the demo.
pub type AppStore = Store<AppState>;

/// Build the app store. Call once, at the composition root.
#[must_use]
pub fn create_store() -> AppStore {
    Store::create(AppState::default)
}

/// Named setters and readers for [`AppState`] fields.
pub trait AppActions {
    fn is_loading(&self) -> bool;
    fn set_is_loading(&self, is_loading: bool);
}

impl AppActions for AppStore {
    fn is_loading(&self) -> bool {
        self.with_state(|s| s.is_loading)
    }

    fn set_is_loading(&self, is_loading: bool) {
        tracing::debug!(is_loading, "set_is_loading");
        self.set_state(AppStatePatch::default().is_loading(is_loading));
    }
}
