//! Stack graph construction.
//!
//! Modules register resources and exports with a [`StackBuilder`]. Calling
//! [`StackBuilder::finish`] validates the declarations and orders them so
//! that every resource comes after everything it depends on, whether the
//! edge comes from data flow or from an explicit `depends_on`.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::output::Output;

use super::resource::{Properties, ResourceDeclaration, ResourceKind, ResourceOptions};
use super::urn::Urn;

/// A named stack output.
#[derive(Debug, Clone)]
pub struct Export {
    /// Export name.
    pub name: String,
    /// Deferred export value.
    pub value: Output<Value>,
}

/// Collects resource declarations for one stack.
#[derive(Debug)]
pub struct StackBuilder {
    stack: String,
    resources: Vec<ResourceDeclaration>,
    index: BTreeMap<Urn, usize>,
    exports: Vec<Export>,
}

impl StackBuilder {
    /// Creates an empty builder for a stack.
    #[must_use]
    pub fn new(stack: &str) -> Self {
        Self {
            stack: stack.to_string(),
            resources: Vec::new(),
            index: BTreeMap::new(),
            exports: Vec::new(),
        }
    }

    /// Returns the stack name.
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Returns the URN a resource would get in this stack.
    #[must_use]
    pub fn urn(&self, kind: ResourceKind, logical_name: &str) -> Urn {
        Urn::new(&self.stack, kind, logical_name)
    }

    /// Returns true if the resource has been registered.
    #[must_use]
    pub fn contains(&self, urn: &Urn) -> bool {
        self.index.contains_key(urn)
    }

    /// Registers a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource with the same kind and logical name
    /// was already registered.
    pub fn register(
        &mut self,
        kind: ResourceKind,
        logical_name: &str,
        inputs: Properties,
        options: ResourceOptions,
    ) -> Result<Urn> {
        let urn = self.urn(kind, logical_name);
        if self.contains(&urn) {
            return Err(GraphError::DuplicateResource {
                urn: urn.to_string(),
            }
            .into());
        }

        debug!("Registering {}", urn);

        self.index.insert(urn.clone(), self.resources.len());
        self.resources.push(ResourceDeclaration {
            urn: urn.clone(),
            kind,
            logical_name: logical_name.to_string(),
            inputs,
            depends_on: options.depends_on.into_iter().collect(),
        });

        Ok(urn)
    }

    /// Registers a stack export.
    ///
    /// # Errors
    ///
    /// Returns an error if the export name is already taken.
    pub fn export<T>(&mut self, name: &str, value: Output<T>) -> Result<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        if self.exports.iter().any(|e| e.name == name) {
            return Err(GraphError::DuplicateExport {
                name: name.to_string(),
            }
            .into());
        }

        self.exports.push(Export {
            name: name.to_string(),
            value: value.into_value(),
        });
        Ok(())
    }

    /// Validates the declarations and orders them by dependency.
    ///
    /// Resources with no ordering constraint between them keep their
    /// declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency was never declared or the
    /// dependencies form a cycle.
    pub fn finish(self) -> Result<StackGraph> {
        let Self {
            stack,
            resources,
            index,
            exports,
        } = self;

        let mut dependencies: Vec<BTreeSet<usize>> = Vec::with_capacity(resources.len());
        for resource in &resources {
            let mut edges = BTreeSet::new();
            for dependency in resource.all_dependencies() {
                let Some(&position) = index.get(&dependency) else {
                    return Err(GraphError::UnknownDependency {
                        urn: resource.urn.to_string(),
                        dependency: dependency.to_string(),
                    }
                    .into());
                };
                edges.insert(position);
            }
            dependencies.push(edges);
        }

        for export in &exports {
            if let Some(missing) = export
                .value
                .dependencies()
                .iter()
                .find(|urn| !index.contains_key(*urn))
            {
                return Err(GraphError::UnknownDependency {
                    urn: format!("export {}", export.name),
                    dependency: missing.to_string(),
                }
                .into());
            }
        }

        let order = topological_order(&dependencies)
            .map_err(|cycle| describe_cycle(&resources, &dependencies, &cycle))?;

        let mut slots: Vec<Option<ResourceDeclaration>> = resources.into_iter().map(Some).collect();
        let ordered: Vec<ResourceDeclaration> = order
            .into_iter()
            .filter_map(|position| slots.get_mut(position).and_then(Option::take))
            .collect();

        debug!(
            "Stack {} has {} resources and {} exports",
            stack,
            ordered.len(),
            exports.len()
        );

        Ok(StackGraph {
            stack,
            resources: ordered,
            exports,
        })
    }
}

/// Kahn's algorithm with the lowest ready index first.
///
/// On a cycle, returns the indices that could not be ordered.
fn topological_order(dependencies: &[BTreeSet<usize>]) -> std::result::Result<Vec<usize>, Vec<usize>> {
    let count = dependencies.len();
    let mut remaining: Vec<usize> = dependencies.iter().map(BTreeSet::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (node, edges) in dependencies.iter().enumerate() {
        for &dependency in edges {
            dependents[dependency].push(node);
        }
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|&n| remaining[n] == 0).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &dependent in &dependents[node] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() == count {
        Ok(order)
    } else {
        Err((0..count).filter(|&n| remaining[n] > 0).collect())
    }
}

/// Walks unordered nodes until one repeats and renders that cycle.
fn describe_cycle(
    resources: &[ResourceDeclaration],
    dependencies: &[BTreeSet<usize>],
    stuck: &[usize],
) -> crate::error::InfraError {
    let stuck_set: BTreeSet<usize> = stuck.iter().copied().collect();
    let mut path: Vec<usize> = Vec::new();
    let mut current = stuck.first().copied();

    while let Some(node) = current {
        if let Some(start) = path.iter().position(|&n| n == node) {
            let names: Vec<String> = path[start..]
                .iter()
                .chain(std::iter::once(&node))
                .map(|&n| resources[n].urn.to_string())
                .collect();
            return GraphError::CircularDependency {
                cycle: names.join(" -> "),
            }
            .into();
        }
        path.push(node);
        current = dependencies[node]
            .iter()
            .copied()
            .find(|dependency| stuck_set.contains(dependency));
    }

    GraphError::CircularDependency {
        cycle: stuck
            .iter()
            .map(|&n| resources[n].urn.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
    .into()
}

/// A validated, dependency-ordered stack.
#[derive(Debug)]
pub struct StackGraph {
    stack: String,
    resources: Vec<ResourceDeclaration>,
    exports: Vec<Export>,
}

impl StackGraph {
    /// Returns the stack name.
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Returns resources in deployment order.
    #[must_use]
    pub fn resources(&self) -> &[ResourceDeclaration] {
        &self.resources
    }

    /// Returns exports in declaration order.
    #[must_use]
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    /// Finds a resource by URN.
    #[must_use]
    pub fn get(&self, urn: &Urn) -> Option<&ResourceDeclaration> {
        self.resources.iter().find(|r| &r.urn == urn)
    }

    /// Finds an export by name.
    #[must_use]
    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Returns the position of a resource in deployment order.
    #[must_use]
    pub fn position(&self, urn: &Urn) -> Option<usize> {
        self.resources.iter().position(|r| &r.urn == urn)
    }

    /// Returns resources of one kind in deployment order.
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceDeclaration> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    /// Returns the number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if the stack declares no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
