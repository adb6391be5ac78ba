//! Resource-group definition: serde types, loading and validation.
//!
//! Split into focused submodules:
//! - `types`: document structs and the [`GroupPath`] key
//! - `loading`: JSON / YAML / file parsing entry points
//! - `validation`: fail-fast structural checks run on every load

mod loading;
mod types;
mod validation;

#[cfg(test)]
mod tests;

pub use types::{GroupPath, GroupSpec, ResourceGroupsDefinition, SchedulingPolicy, SelectorSpec};
