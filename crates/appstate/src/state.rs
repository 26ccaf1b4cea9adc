#![forbid(unsafe_code)]

//! Declaring store state as a fixed record with a matching patch type.
//!
//! A store holds one record type `S`. Partial updates are expressed as a
//! *patch*: a companion struct with one `Option<T>` per field, where `None`
//! leaves the field untouched. [`Merge`] ties the two together.
//!
//! [`define_state!`](crate::define_state) generates the record, its
//! defaults, the patch and the `Merge` impl from a single field list:
//!
//! ```
//! appstate::define_state! {
//!     /// Cross-cutting UI flags.
//!     pub struct UiState patch UiPatch {
//!         pub is_loading: bool = false,
//!         pub title: String = String::from("Home"),
//!     }
//! }
//!
//! use appstate::Merge;
//!
//! let mut state = UiState::default();
//! state.merge(UiPatch::default().is_loading(true));
//! assert!(state.is_loading);
//! assert_eq!(state.title, "Home");
//! ```

/// Apply a partial update to a state record.
///
/// # Invariants
///
/// 1. Fields absent from the patch keep their previous value.
/// 2. Merging an empty patch is the identity.
/// 3. Merging is applied left to right: a later patch wins for the same field.
pub trait Merge {
    /// Partial update type for this record.
    type Patch;

    /// Overwrite the fields named by `patch`.
    fn merge(&mut self, patch: Self::Patch);
}

/// Declare a state record, its patch type and the [`Merge`] impl.
///
/// Every field must name a default value; `Default` for the record is built
/// from them. The patch type gets a chainable builder method per field,
/// named after the field.
///
/// The record derives `Debug`, `Clone` and `PartialEq`. Additional
/// attributes (for example serde derives) may be placed above `struct`.
#[macro_export]
macro_rules! define_state {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident patch $patch:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self {
                    $( $field: $default, )*
                }
            }
        }

        #[doc = concat!("Partial update for [`", stringify!($name), "`].")]
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $patch {
            $( $fvis $field: ::core::option::Option<$ty>, )*
        }

        impl $patch {
            $(
                #[doc = concat!("Set `", stringify!($field), "` in this patch.")]
                #[must_use]
                $fvis fn $field(mut self, value: $ty) -> Self {
                    self.$field = ::core::option::Option::Some(value);
                    self
                }
            )*

            /// Whether this patch names no field.
            #[must_use]
            #[allow(dead_code)]
            pub fn is_empty(&self) -> bool {
                true $( && self.$field.is_none() )*
            }
        }

        impl $crate::Merge for $name {
            type Patch = $patch;

            fn merge(&mut self, patch: $patch) {
                $(
                    if let ::core::option::Option::Some(value) = patch.$field {
                        self.$field = value;
                    }
                )*
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::Merge;

    crate::define_state! {
        struct Counter patch CounterPatch {
            count: u32 = 0,
            label: String = "idle".to_string(),
            ratio: f32 = 0.5,
        }
    }

    #[test]
    fn defaults_come_from_declaration() {
        let c = Counter::default();
        assert_eq!(c.count, 0);
        assert_eq!(c.label, "idle");
        assert_eq!(c.ratio, 0.5);
    }

    #[test]
    fn merge_replaces_only_named_fields() {
        let mut c = Counter::default();
        c.merge(CounterPatch::default().count(3));
        assert_eq!(c.count, 3);
        assert_eq!(c.label, "idle");

        c.merge(CounterPatch::default().label("busy".into()).ratio(1.0));
        assert_eq!(c.count, 3);
        assert_eq!(c.label, "busy");
        assert_eq!(c.ratio, 1.0);
    }

    #[test]
    fn empty_patch_is_identity() {
        let mut c = Counter::default();
        let before = c.clone();
        let patch = CounterPatch::default();
        assert!(patch.is_empty());
        c.merge(patch);
        assert_eq!(c, before);
    }

    #[test]
    fn builder_marks_patch_non_empty() {
        assert!(!CounterPatch::default().count(1).is_empty());
    }
}
