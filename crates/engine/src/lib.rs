//! `itsm-engine` — the assembled authorization engine.
//!
//! [`Authorizer`] answers checks; [`Engine`] wires it together with the
//! tenant directory, provisioner and membership store over a chosen storage
//! backend.

pub mod authorizer;
pub mod bootstrap;
pub mod cli;
pub mod decision;

pub use authorizer::Authorizer;
pub use bootstrap::{
    BootstrapError, Engine, InMemoryBackend, STANDARD_RESOURCES, StandardResource, Storage,
    postgres_locator,
};
pub use decision::{Decision, DecisionBasis};
