//! Resource identifiers.

use std::fmt;

use super::resource::ResourceKind;

/// Unique identifier of a declared resource within a stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Urn {
    stack: String,
    kind: ResourceKind,
    name: String,
}

impl Urn {
    /// Creates a URN for a resource in a stack.
    #[must_use]
    pub fn new(stack: &str, kind: ResourceKind, name: &str) -> Self {
        Self {
            stack: stack.to_string(),
            kind,
            name: name.to_string(),
        }
    }

    /// Returns the stack name.
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Returns the resource kind.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns the logical resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "urn:infusethink:{}::{}::{}",
            self.stack,
            self.kind.type_token(),
            self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urn_display() {
        let urn = Urn::new("prod", ResourceKind::WebApp, "infusethink-api");
        assert_eq!(
            urn.to_string(),
            "urn:infusethink:prod::azure:web:WebApp::infusethink-api"
        );
        assert_eq!(urn.name(), "infusethink-api");
        assert_eq!(urn.kind(), ResourceKind::WebApp);
    }
}
