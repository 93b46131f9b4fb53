//! Deferred resource attributes.
//!
//! An [`Output<T>`] is a value that may only be known once the resources it
//! depends on have been created: a generated hostname, a server FQDN, a
//! connection string built from both. Outputs are never read eagerly;
//! transformations are chained onto them with [`Output::map`],
//! [`Output::try_map`], [`Output::zip`] and [`Output::all`] and evaluated
//! when an [`AttributeSource`] is available.
//!
//! Every output carries the set of resources it was derived from, which the
//! graph builder turns into data-flow edges, and a secret flag that survives
//! every transformation.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{InfraError, OutputError, Result};
use crate::graph::Urn;

/// Source of remote attributes, keyed by resource and attribute name.
pub trait AttributeSource {
    /// Returns the attribute if the resource has been created.
    fn attribute(&self, urn: &Urn, name: &str) -> Option<Value>;
}

/// Attribute source for previews: nothing has been created yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAttributes;

impl AttributeSource for NoAttributes {
    fn attribute(&self, _urn: &Urn, _name: &str) -> Option<Value> {
        None
    }
}

impl AttributeSource for BTreeMap<Urn, Map<String, Value>> {
    fn attribute(&self, urn: &Urn, name: &str) -> Option<Value> {
        self.get(urn).and_then(|attributes| attributes.get(name)).cloned()
    }
}

/// Result of evaluating an output against an attribute source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    /// The value is available.
    Known(T),
    /// The value depends on an attribute that is not available yet.
    Unknown,
}

impl<T> Resolved<T> {
    /// Returns the value if known.
    #[must_use]
    pub fn known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }

    /// Returns true if the value is known.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

type Resolver<T> = dyn Fn(&dyn AttributeSource) -> Result<Resolved<T>> + Send + Sync;

/// A deferred value with provenance and secrecy tracking.
pub struct Output<T> {
    resolver: Arc<Resolver<T>>,
    dependencies: BTreeSet<Urn>,
    secret: bool,
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            dependencies: self.dependencies.clone(),
            secret: self.secret,
        }
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("secret", &self.secret)
            .field("dependencies", &self.dependencies.len())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> Output<T> {
    /// Creates an output whose value is already known.
    #[must_use]
    pub fn known(value: T) -> Self {
        let resolver: Arc<Resolver<T>> =
            Arc::new(move |_: &dyn AttributeSource| -> Result<Resolved<T>> {
                Ok(Resolved::Known(value.clone()))
            });
        Self {
            resolver,
            dependencies: BTreeSet::new(),
            secret: false,
        }
    }

    /// Creates a known output that is marked secret.
    #[must_use]
    pub fn secret(value: T) -> Self {
        Self::known(value).into_secret()
    }

    /// Creates a known output owned by a resource.
    ///
    /// The value is available at declaration time (a name chosen by the
    /// caller), but consumers still depend on the resource existing.
    #[must_use]
    pub fn known_from(urn: &Urn, value: T) -> Self {
        Self::known(value).depends_on(urn)
    }
}

impl<T: DeserializeOwned + Send + Sync + 'static> Output<T> {
    /// Creates an output reading a remote attribute of a resource.
    #[must_use]
    pub fn attribute(urn: &Urn, name: &str) -> Self {
        let owner = urn.clone();
        let attribute = name.to_string();
        let resolver: Arc<Resolver<T>> =
            Arc::new(move |source: &dyn AttributeSource| -> Result<Resolved<T>> {
                let Some(value) = source.attribute(&owner, &attribute) else {
                    return Ok(Resolved::Unknown);
                };
                serde_json::from_value::<T>(value)
                    .map(Resolved::Known)
                    .map_err(|e| {
                        InfraError::from(OutputError::AttributeType {
                            urn: owner.to_string(),
                            attribute: attribute.clone(),
                            message: e.to_string(),
                        })
                    })
            });
        Self {
            resolver,
            dependencies: BTreeSet::from([urn.clone()]),
            secret: false,
        }
    }
}

impl<T: Send + Sync + 'static> Output<T> {
    /// Evaluates the output against an attribute source.
    ///
    /// # Errors
    ///
    /// Returns an error if an attribute has the wrong type or a
    /// transformation fails.
    pub fn resolve(&self, source: &dyn AttributeSource) -> Result<Resolved<T>> {
        (*self.resolver)(source)
    }

    /// Returns true if the value must never be shown in plaintext.
    #[must_use]
    pub const fn is_secret(&self) -> bool {
        self.secret
    }

    /// Returns the resources this value is derived from.
    #[must_use]
    pub const fn dependencies(&self) -> &BTreeSet<Urn> {
        &self.dependencies
    }

    /// Marks the output as secret.
    #[must_use]
    pub fn into_secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Adds a resource to the provenance of this value.
    #[must_use]
    pub fn depends_on(mut self, urn: &Urn) -> Self {
        self.dependencies.insert(urn.clone());
        self
    }

    /// Transforms the value once it is known.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Output<U>
    where
        U: Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.try_map(move |value| Ok(f(value)))
    }

    /// Transforms the value once it is known, allowing the transformation
    /// to fail.
    #[must_use]
    pub fn try_map<U, F>(self, f: F) -> Output<U>
    where
        U: Send + Sync + 'static,
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        let inner = self.resolver;
        let resolver: Arc<Resolver<U>> =
            Arc::new(move |source: &dyn AttributeSource| -> Result<Resolved<U>> {
                match (*inner)(source)? {
                    Resolved::Known(value) => f(value).map(Resolved::Known),
                    Resolved::Unknown => Ok(Resolved::Unknown),
                }
            });
        Output {
            resolver,
            dependencies: self.dependencies,
            secret: self.secret,
        }
    }

    /// Combines two outputs into one holding both values.
    ///
    /// The result is unknown while either side is unknown and secret if
    /// either side is secret.
    #[must_use]
    pub fn zip<U: Send + Sync + 'static>(self, other: Output<U>) -> Output<(T, U)> {
        let left = self.resolver;
        let right = other.resolver;
        let resolver: Arc<Resolver<(T, U)>> =
            Arc::new(move |source: &dyn AttributeSource| -> Result<Resolved<(T, U)>> {
                let left = (*left)(source)?;
                let right = (*right)(source)?;
                Ok(match (left, right) {
                    (Resolved::Known(l), Resolved::Known(r)) => Resolved::Known((l, r)),
                    _ => Resolved::Unknown,
                })
            });
        let mut dependencies = self.dependencies;
        dependencies.extend(other.dependencies);
        Output {
            resolver,
            dependencies,
            secret: self.secret || other.secret,
        }
    }

    /// Combines any number of outputs into one ordered list.
    #[must_use]
    pub fn all(outputs: Vec<Self>) -> Output<Vec<T>> {
        let secret = outputs.iter().any(|o| o.secret);
        let dependencies = outputs
            .iter()
            .flat_map(|o| o.dependencies.iter().cloned())
            .collect();
        let resolvers: Vec<Arc<Resolver<T>>> = outputs.into_iter().map(|o| o.resolver).collect();
        let resolver: Arc<Resolver<Vec<T>>> =
            Arc::new(move |source: &dyn AttributeSource| -> Result<Resolved<Vec<T>>> {
                let mut values = Vec::with_capacity(resolvers.len());
                let mut complete = true;
                for resolver in &resolvers {
                    match (**resolver)(source)? {
                        Resolved::Known(value) => values.push(value),
                        Resolved::Unknown => complete = false,
                    }
                }
                Ok(if complete {
                    Resolved::Known(values)
                } else {
                    Resolved::Unknown
                })
            });
        Output {
            resolver,
            dependencies,
            secret,
        }
    }
}

impl<T: Serialize + Send + Sync + 'static> Output<T> {
    /// Converts the output into a JSON value for use as a resource input.
    #[must_use]
    pub fn into_value(self) -> Output<Value> {
        self.try_map(|value| {
            serde_json::to_value(value).map_err(|e| {
                InfraError::from(OutputError::Serialization {
                    message: e.to_string(),
                })
            })
        })
    }
}

impl From<&str> for Output<String> {
    fn from(value: &str) -> Self {
        Self::known(value.to_string())
    }
}

impl From<String> for Output<String> {
    fn from(value: String) -> Self {
        Self::known(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResourceKind;
    use crate::output::Secret;

    fn web_app_urn() -> Urn {
        Urn::new("prod", ResourceKind::WebApp, "infusethink-api")
    }

    fn source_with(urn: &Urn, name: &str, value: Value) -> BTreeMap<Urn, Map<String, Value>> {
        let mut attributes = Map::new();
        attributes.insert(name.to_string(), value);
        BTreeMap::from([(urn.clone(), attributes)])
    }

    #[test]
    fn test_known_resolves_without_attributes() {
        let output = Output::known(String::from("westeurope"));
        assert_eq!(
            output.resolve(&NoAttributes).unwrap(),
            Resolved::Known(String::from("westeurope"))
        );
        assert!(output.dependencies().is_empty());
        assert!(!output.is_secret());
    }

    #[test]
    fn test_attribute_is_unknown_until_created() {
        let urn = web_app_urn();
        let host: Output<String> = Output::attribute(&urn, "defaultHostName");

        assert_eq!(host.resolve(&NoAttributes).unwrap(), Resolved::Unknown);
        assert!(host.dependencies().contains(&urn));

        let source = source_with(&urn, "defaultHostName", Value::from("api.azurewebsites.net"));
        assert_eq!(
            host.resolve(&source).unwrap(),
            Resolved::Known(String::from("api.azurewebsites.net"))
        );
    }

    #[test]
    fn test_attribute_type_mismatch() {
        let urn = web_app_urn();
        let host: Output<String> = Output::attribute(&urn, "defaultHostName");
        let source = source_with(&urn, "defaultHostName", Value::from(42));

        assert!(host.resolve(&source).is_err());
    }

    #[test]
    fn test_map_is_deferred() {
        let urn = web_app_urn();
        let url = Output::<String>::attribute(&urn, "defaultHostName")
            .map(|host| format!("https://{host}"));

        assert_eq!(url.resolve(&NoAttributes).unwrap(), Resolved::Unknown);

        let source = source_with(&urn, "defaultHostName", Value::from("api.azurewebsites.net"));
        assert_eq!(
            url.resolve(&source).unwrap(),
            Resolved::Known(String::from("https://api.azurewebsites.net"))
        );
    }

    #[test]
    fn test_zip_propagates_secret_and_dependencies() {
        let urn = web_app_urn();
        let host: Output<String> = Output::attribute(&urn, "defaultHostName");
        let password = Output::secret(Secret::new(String::from("p@ss")));

        let combined = host.zip(password);
        assert!(combined.is_secret());
        assert!(combined.dependencies().contains(&urn));
        assert_eq!(combined.resolve(&NoAttributes).unwrap(), Resolved::Unknown);
    }

    #[test]
    fn test_secret_survives_map() {
        let mapped = Output::secret(String::from("p@ss")).map(|s| s.len());
        assert!(mapped.is_secret());
        assert_eq!(mapped.resolve(&NoAttributes).unwrap(), Resolved::Known(4));
    }

    #[test]
    fn test_all_preserves_order() {
        let outputs = vec![
            Output::known(String::from("a")),
            Output::known(String::from("b")),
            Output::known(String::from("c")),
        ];
        let joined = Output::all(outputs).map(|parts| parts.join(","));
        assert_eq!(
            joined.resolve(&NoAttributes).unwrap(),
            Resolved::Known(String::from("a,b,c"))
        );
    }

    #[test]
    fn test_all_unknown_if_any_unknown() {
        let urn = web_app_urn();
        let outputs = vec![
            Output::known(String::from("a")),
            Output::attribute(&urn, "defaultHostName"),
        ];
        let all = Output::all(outputs);
        assert_eq!(all.resolve(&NoAttributes).unwrap(), Resolved::Unknown);
        assert!(all.dependencies().contains(&urn));
    }

    #[test]
    fn test_try_map_failure_surfaces() {
        let output = Output::known(300_usize).try_map(|len| {
            if len > 255 {
                Err(InfraError::from(OutputError::transform("too long")))
            } else {
                Ok(len)
            }
        });
        assert!(output.resolve(&NoAttributes).is_err());
    }

    #[test]
    fn test_debug_never_shows_value() {
        let output = Output::secret(String::from("p@ss"));
        let debug = format!("{output:?}");
        assert!(!debug.contains("p@ss"));
        assert!(debug.contains("secret: true"));
    }
}
