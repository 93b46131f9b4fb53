//! Secret wrapper for values that must never be displayed in plaintext.
//!
//! `Secret<T>` redacts itself in `Debug`, `Display` and `Serialize`, so a
//! secret that ends up in a log line, a preview table or a JSON dump shows
//! as `[secret]`. Reading the value requires an explicit call to
//! [`Secret::expose`] or [`Secret::into_inner`].

use serde::{Serialize, Serializer};
use std::fmt;

/// Placeholder rendered instead of a secret value.
pub const REDACTED: &str = "[secret]";

/// A value that must not be printed, logged, or serialized in plaintext.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    /// Wraps a value as a secret.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Returns a reference to the wrapped value.
    #[must_use]
    pub const fn expose(&self) -> &T {
        &self.0
    }

    /// Unwraps the secret, returning the plaintext value.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({REDACTED})")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> Serialize for Secret<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted_everywhere() {
        let secret = Secret::new(String::from("p@ss"));

        assert_eq!(format!("{secret}"), "[secret]");
        assert_eq!(format!("{secret:?}"), "Secret([secret])");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"[secret]\"");
    }

    #[test]
    fn test_secret_expose() {
        let secret = Secret::from(String::from("p@ss"));
        assert_eq!(secret.expose(), "p@ss");
        assert_eq!(secret.into_inner(), "p@ss");
    }
}
