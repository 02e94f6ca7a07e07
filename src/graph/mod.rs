//! Dependency ordering for the artifacts of a run.
//!
//! - [`tree::DependencyTree`] levels artifacts so dependencies sit deeper
//!   than their dependents
//! - [`order::processing_order`] flattens the tree deepest level first

pub mod order;
pub mod tree;

use thiserror::Error;

pub use order::{processing_order, sort_artifacts};
pub use tree::{DependencyTree, NodeId};

/// Errors raised while ordering artifacts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Declared modules require each other in a loop
    #[error("Dependency cycle between declared modules: {}", modules.join(" -> "))]
    Cycle { modules: Vec<String> },
}
