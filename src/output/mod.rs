//! Deferred values and secrets.
//!
//! Resource attributes that only exist after the cloud provider has created
//! a resource are modelled as [`Output`] values; anything that must never be
//! printed in plaintext is wrapped in [`Secret`].

mod deferred;
mod secret;

pub use deferred::{AttributeSource, NoAttributes, Output, Resolved};
pub use secret::{REDACTED, Secret};
