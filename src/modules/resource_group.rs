//! Resource group declaration.

use crate::config::TagSet;
use crate::error::Result;
use crate::graph::{Properties, ResourceKind, ResourceOptions, StackBuilder, Urn};
use crate::output::Output;

use super::APPLICATION;

/// Arguments for [`declare_resource_group`].
#[derive(Debug, Clone, Copy)]
pub struct ResourceGroupArgs<'a> {
    /// Short name, expanded to `rg-<logical_name>-<environment>`.
    pub logical_name: &'a str,
    /// Azure region.
    pub location: &'a str,
    /// Environment identifier, or `shared` for the shared stack.
    pub environment: &'a str,
    /// Caller tags, merged over the defaults.
    pub tags: &'a TagSet,
}

/// A declared resource group.
#[derive(Debug, Clone)]
pub struct ResourceGroupHandle {
    /// Resource identifier.
    pub urn: Urn,
    /// Azure resource group name.
    pub name: Output<String>,
    /// Azure region.
    pub location: String,
}

/// Declares the resource group of a stack.
///
/// # Errors
///
/// Returns an error if the resource group was already declared.
pub fn declare_resource_group(
    builder: &mut StackBuilder,
    args: ResourceGroupArgs<'_>,
) -> Result<ResourceGroupHandle> {
    let logical_name = format!("rg-{}-{}", args.logical_name, args.environment);
    let name = format!("rg-infusethink-{}", args.environment);

    let defaults = TagSet::new()
        .with("Environment", args.environment)
        .with("Application", APPLICATION)
        .with("ManagedBy", super::MANAGED_BY);
    let tags = TagSet::merge(&defaults, args.tags);

    let inputs = Properties::new()
        .set_value("name", name.as_str())
        .set_value("location", args.location)
        .set_value("tags", &tags);

    let urn = builder.register(
        ResourceKind::ResourceGroup,
        &logical_name,
        inputs,
        ResourceOptions::new(),
    )?;

    Ok(ResourceGroupHandle {
        name: Output::known_from(&urn, name),
        location: args.location.to_string(),
        urn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{NoAttributes, Resolved};

    #[test]
    fn test_names_and_tags() {
        let mut builder = StackBuilder::new("prod");
        let caller = TagSet::new().with("Owner", "Platform Team");
        let handle = declare_resource_group(
            &mut builder,
            ResourceGroupArgs {
                logical_name: "infusethink",
                location: "westeurope",
                environment: "prod",
                tags: &caller,
            },
        )
        .unwrap();

        assert_eq!(handle.urn.name(), "rg-infusethink-prod");
        assert_eq!(
            handle.name.resolve(&NoAttributes).unwrap(),
            Resolved::Known(String::from("rg-infusethink-prod"))
        );
        assert!(handle.name.dependencies().contains(&handle.urn));

        let graph = builder.finish().unwrap();
        let inputs = graph.get(&handle.urn).unwrap().inputs.resolve(&NoAttributes).unwrap();
        let tags = inputs.get("tags").unwrap();
        assert_eq!(tags["Environment"], "prod");
        assert_eq!(tags["Application"], "Infusethink");
        assert_eq!(tags["Owner"], "Platform Team");
    }

    #[test]
    fn test_caller_tag_overrides_default() {
        let mut builder = StackBuilder::new("shared");
        let caller = TagSet::new().with("Environment", "Shared");
        let handle = declare_resource_group(
            &mut builder,
            ResourceGroupArgs {
                logical_name: "infusethink",
                location: "westeurope",
                environment: "shared",
                tags: &caller,
            },
        )
        .unwrap();

        let graph = builder.finish().unwrap();
        let inputs = graph.get(&handle.urn).unwrap().inputs.resolve(&NoAttributes).unwrap();
        assert_eq!(inputs.get("tags").unwrap()["Environment"], "Shared");
    }
}
