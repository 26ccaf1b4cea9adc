#![forbid(unsafe_code)]

//! Observable application state for UI layers.
//!
//! A [`Store`] holds one state record and notifies subscribers
//! synchronously when the part of the state they select changes. Rendering
//! code reads with [`Store::get_state`] or [`Store::with_state`], reacts via
//! [`Store::subscribe`], and requests changes via [`Store::set_state`].
//!
//! ```
//! use appstate::Store;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! appstate::define_state! {
//!     pub struct AppState patch AppPatch {
//!         pub is_loading: bool = false,
//!     }
//! }
//!
//! let store = Store::new(AppState::default());
//! let fired = Rc::new(Cell::new(0));
//! let fired_clone = Rc::clone(&fired);
//! let _sub = store.subscribe(
//!     |s: &AppState| s.is_loading,
//!     move |_| fired_clone.set(fired_clone.get() + 1),
//! );
//!
//! store.set_state(AppPatch::default().is_loading(true));
//! assert!(store.get_state().is_loading);
//! assert_eq!(fired.get(), 1);
//! ```
//!
//! # Feature Flags
//!
//! - `state-persistence`: [`persist`] module with JSON snapshot storage.

pub mod error;
#[cfg(feature = "state-persistence")]
pub mod persist;
pub mod state;
pub mod store;
pub mod subscription;

pub use error::{Result, StoreError};
pub use state::Merge;
pub use store::Store;
pub use subscription::{Subscription, SubscriptionId};
