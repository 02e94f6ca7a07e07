//! Processing order extraction.

use super::tree::DependencyTree;
use super::OrderError;
use crate::model::{Artifact, ArtifactSet};

/// Flattens a leveled tree into processing order, deepest level first.
///
/// Within a level artifacts keep breadth-first order. The root (level 0) is
/// never emitted.
pub fn processing_order(tree: &DependencyTree) -> Vec<&Artifact> {
    let leveled = tree.leveled();
    let max_level = leveled.iter().map(|(_, l)| *l).max().unwrap_or(0);

    let mut order = Vec::with_capacity(leveled.len().saturating_sub(1));
    for level in (1..=max_level).rev() {
        order.extend(
            leveled
                .iter()
                .filter(|(_, l)| *l == level)
                .filter_map(|(id, _)| tree.artifact(*id)),
        );
    }
    order
}

/// Orders `artifacts` so every declared dependency precedes its dependents.
pub fn sort_artifacts(artifacts: &ArtifactSet) -> Result<Vec<Artifact>, OrderError> {
    let tree = DependencyTree::build(artifacts)?;
    Ok(processing_order(&tree).into_iter().cloned().collect())
}
