//! Descriptor model: the artifacts a run should modularize.
//!
//! The descriptor file is a JSON array of [`Artifact`] objects. Each artifact
//! binds an archive file name to the [`Module`] it should become.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Exact archive file name, e.g. `commons-lang3-3.9.jar`
    pub name: String,
    pub module: Module,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    /// Java module identifier, e.g. `org.apache.commons.lang3`
    pub name: String,

    /// Packages to export. `None` means every package holding a class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports_packages: Option<Vec<String>>,

    /// Modules this one reads. `None` means no `requires` directives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_modules: Option<Vec<String>>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, module: Module) -> Self {
        Self {
            name: name.into(),
            module,
        }
    }

    /// Name of the module this artifact defines.
    pub fn module_name(&self) -> &str {
        &self.module.name
    }
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_exports<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports_packages = Some(packages.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_requires<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires_modules = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    /// Declared dependencies with duplicates removed, first occurrence kept.
    pub fn requires(&self) -> Vec<&str> {
        dedup_ordered(self.requires_modules.as_deref().unwrap_or_default())
    }

    /// Explicit exports with duplicates removed, or `None` when inferred.
    pub fn exports(&self) -> Option<Vec<&str>> {
        self.exports_packages.as_deref().map(dedup_ordered)
    }
}

fn dedup_ordered(values: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(String::as_str)
        .filter(|v| seen.insert(*v))
        .collect()
}

// ============================================================================
// Artifact Set
// ============================================================================

/// Insertion-ordered set of artifacts keyed by archive name.
///
/// Inserting an artifact whose name is already present is a no-op: the first
/// entry wins, matching how duplicate descriptor entries are treated.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    items: Vec<Artifact>,
    names: HashSet<String>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `artifact` unless one with the same name exists.
    ///
    /// Returns `true` if the artifact was inserted.
    pub fn insert(&mut self, artifact: Artifact) -> bool {
        if self.names.contains(&artifact.name) {
            debug!(artifact = %artifact.name, "Duplicate artifact dropped");
            return false;
        }
        self.names.insert(artifact.name.clone());
        self.items.push(artifact);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Artifact> {
        self.items.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.items.iter().find(|a| a.name == name)
    }

    /// First artifact whose module is named `module_name`.
    pub fn defining(&self, module_name: &str) -> Option<&Artifact> {
        self.items.iter().find(|a| a.module.name == module_name)
    }
}

impl FromIterator<Artifact> for ArtifactSet {
    fn from_iter<T: IntoIterator<Item = Artifact>>(iter: T) -> Self {
        let mut set = Self::new();
        for artifact in iter {
            set.insert(artifact);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ArtifactSet {
    type Item = &'a Artifact;
    type IntoIter = std::slice::Iter<'a, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ============================================================================
// Descriptor Loading
// ============================================================================

/// Errors raised while loading the modularization descriptor.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to read descriptor '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse descriptor: {0}")]
    Parse(#[from] serde_json::Error),

    /// An artifact or module name is blank
    #[error("Invalid artifact at index {index}: {reason}")]
    InvalidArtifact { index: usize, reason: String },
}

/// Parses descriptor JSON into a deduplicated [`ArtifactSet`].
pub fn parse_descriptor(content: &[u8]) -> Result<ArtifactSet, DescriptorError> {
    let raw: Vec<Artifact> = serde_json::from_slice(content)?;

    for (index, artifact) in raw.iter().enumerate() {
        if artifact.name.trim().is_empty() {
            return Err(DescriptorError::InvalidArtifact {
                index,
                reason: "empty artifact name".to_string(),
            });
        }
        if artifact.module.name.trim().is_empty() {
            return Err(DescriptorError::InvalidArtifact {
                index,
                reason: format!("artifact '{}' has an empty module name", artifact.name),
            });
        }
    }

    Ok(raw.into_iter().collect())
}

/// Reads and parses the descriptor file at `path`.
pub fn load_descriptor(path: &Path) -> Result<ArtifactSet, DescriptorError> {
    let content = std::fs::read(path).map_err(|source| DescriptorError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_descriptor(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor_camel_case_fields() {
        let json = br#"[
            {
                "name": "a.jar",
                "module": {
                    "name": "com.example.a",
                    "exportsPackages": ["com.example.a.api"],
                    "requiresModules": ["com.example.b", "java.sql"]
                }
            },
            { "name": "b.jar", "module": { "name": "com.example.b" } }
        ]"#;

        let set = parse_descriptor(json).unwrap();
        assert_eq!(set.len(), 2);

        let a = set.get("a.jar").unwrap();
        assert_eq!(a.module_name(), "com.example.a");
        assert_eq!(a.module.exports(), Some(vec!["com.example.a.api"]));
        assert_eq!(a.module.requires(), vec!["com.example.b", "java.sql"]);

        let b = set.get("b.jar").unwrap();
        assert!(b.module.exports_packages.is_none());
        assert!(b.module.requires().is_empty());
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let json = br#"[
            { "name": "a.jar", "module": { "name": "first" } },
            { "name": "b.jar", "module": { "name": "other" } },
            { "name": "a.jar", "module": { "name": "second" } }
        ]"#;

        let set = parse_descriptor(json).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a.jar").unwrap().module_name(), "first");
        let names: Vec<_> = set.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a.jar", "b.jar"]);
    }

    #[test]
    fn test_empty_descriptor_parses_to_empty_set() {
        let set = parse_descriptor(b"[]").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_blank_module_name_rejected() {
        let json = br#"[{ "name": "a.jar", "module": { "name": " " } }]"#;
        let err = parse_descriptor(json).unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidArtifact { index: 0, .. }));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = parse_descriptor(b"{ not json").unwrap_err();
        assert!(matches!(err, DescriptorError::Parse(_)));
    }

    #[test]
    fn test_requires_dedup_preserves_order() {
        let module = Module::new("m").with_requires(["b", "a", "b"]);
        assert_eq!(module.requires(), vec!["b", "a"]);
    }

    #[test]
    fn test_defining_finds_first_module_owner() {
        let set: ArtifactSet = vec![
            Artifact::new("x.jar", Module::new("shared")),
            Artifact::new("y.jar", Module::new("shared")),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.defining("shared").unwrap().name, "x.jar");
        assert!(set.defining("missing").is_none());
    }
}
