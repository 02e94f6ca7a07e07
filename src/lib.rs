pub mod cli;
pub mod compiler;
pub mod executor;
pub mod graph;
pub mod logger;
pub mod model;
pub mod pipeline;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export common types for convenience
pub use compiler::JavacCompiler;
pub use executor::*;
pub use graph::{sort_artifacts, DependencyTree, OrderError};
pub use model::*;
pub use pipeline::{ModularizePipeline, ModularizedArchive, PipelineError, Severity};
pub use traits::*;
