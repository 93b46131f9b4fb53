//! Resource dependency graph.
//!
//! This module provides:
//! - Resource identifiers and kinds
//! - Deferred resource inputs
//! - Stack graph construction and ordering

mod builder;
mod resource;
mod urn;

pub use builder::{Export, StackBuilder, StackGraph};
pub use resource::{
    ADDRESS_KEYS, Properties, ResolvedInputs, ResourceDeclaration, ResourceKind, ResourceOptions,
    UNKNOWN_PLACEHOLDER,
};
pub use urn::Urn;
