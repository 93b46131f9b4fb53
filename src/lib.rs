// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Infusethink Infra
//!
//! Declarative Azure infrastructure for the Infusethink web application.
//!
//! ## Overview
//!
//! One program describes three stacks:
//!
//! - `dev` and `prod`: a resource group, frontend and backend App Service
//!   hosting and, in production, a per-environment database, the
//!   `infuseth.ink` DNS zone with its mail records and managed certificates
//!   for the custom domains
//! - `shared`: the PostgreSQL flexible server the environment databases
//!   live on, exported to the other stacks through stack references
//!
//! ## Architecture
//!
//! 1. **Configuration**: static per-environment records plus stack settings
//!    from `Infusethink.<stack>.yaml` and the environment
//! 2. **Composition**: modules declare resources into a dependency graph,
//!    wiring attributes that are only known after deployment as deferred
//!    values
//! 3. **Engine**: the graph is previewed as an ordered plan, or submitted
//!    to Azure Resource Manager one resource at a time
//! 4. **State**: applied attributes and stack exports are stored per stack
//!
//! ## Modules
//!
//! - [`config`]: Configuration records, settings and validation
//! - [`output`]: Deferred values and secrets
//! - [`graph`]: Resource declarations and the stack graph
//! - [`modules`]: Resource group, hosting, database and DNS components
//! - [`stack`]: Composition roots and cross-stack references
//! - [`engine`]: Plans and Azure Resource Manager submission
//! - [`state`]: Stack state storage
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # Infusethink.prod.yaml
//! location: westeurope
//! subscription_id: 00000000-0000-0000-0000-000000000000
//! shared_stack: shared
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod modules;
pub mod output;
pub mod stack;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigResolver, ConfigValidator, ConfigurationRecord, Environment};
pub use engine::{ArmProvider, Deployer, DeploymentPlan, ResourceProvider};
pub use error::{InfraError, Result};
pub use graph::{StackBuilder, StackGraph, Urn};
pub use output::{Output, Secret};
pub use stack::{Composition, StackReference, compose_environment, compose_shared};
pub use state::{LocalStackStore, StackState, StackStore};
