//! Planning and submission.
//!
//! This module renders composed stacks as display-safe plans and submits
//! them to Azure Resource Manager, one resource at a time in dependency
//! order.

mod arm;
mod deployer;
mod plan;
mod provider;

pub use arm::{ArmProvider, api_version, flatten_attributes, request_body};
pub use deployer::{Deployer, DeploymentReport};
pub use plan::{ActionType, DeploymentPlan, PlannedAction, PlannedExport};
pub use provider::{AppliedResource, ApplyRequest, ResourceProvider};
