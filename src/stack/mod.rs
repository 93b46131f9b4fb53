//! Stack composition.
//!
//! A stack is one independently deployed graph: the `shared` stack with the
//! database server, or one environment stack. Environment stacks read the
//! shared stack's exports through a [`StackReference`].

mod composition;
mod reference;
mod shared;

pub use composition::{
    Composition, DATABASE_URL_SETTING, DKIM_SELECTOR, DMARC_NAME, build_environment,
    compose_environment,
};
pub use reference::{SharedStackOutputs, StackReference};
pub use shared::compose_shared;
