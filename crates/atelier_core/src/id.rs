//! Identifier newtypes.

/// Defines a string identifier newtype.
///
/// The generated type wraps a `String`, serializes transparently, and offers
/// [`generate`](#method.generate) for fresh `nanoid` identifiers with a
/// readable prefix.
///
/// # Example
///
/// ```
/// atelier_core::define_id! {
///     /// Identifier of a widget.
///     pub struct WidgetId("wdg");
/// }
///
/// let id = WidgetId::generate();
/// assert!(id.as_str().starts_with("wdg_"));
///
/// let fixed = WidgetId::from("wdg_fixed");
/// assert_eq!(fixed.to_string(), "wdg_fixed");
/// ```
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($prefix:literal);) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[derive($crate::__private::serde::Serialize, $crate::__private::serde::Deserialize)]
        #[serde(transparent, crate = "atelier_core::__private::serde")]
        $vis struct $name(String);

        impl $name {
            /// Generates a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, $crate::__private::nanoid!(12)))
            }

            /// Wraps an existing identifier string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}
