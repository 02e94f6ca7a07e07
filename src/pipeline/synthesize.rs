//! Module descriptor synthesis.
//!
//! Renders `module-info.java` for a [`Module`], writes it to the scratch root
//! and runs the [`DescriptorCompiler`]. The compiled `module-info.class` bytes
//! are the stage output.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::model::Module;
use crate::traits::{CompileError, DescriptorCompiler, DESCRIPTOR_CLASS, DESCRIPTOR_SOURCE};

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Failed to write module-info.java: {0}")]
    WriteSource(#[source] std::io::Error),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The compiler ran but reported problems
    #[error("Compilation failed:\n{0}")]
    Diagnostic(String),

    /// The compiler reported nothing but left no class file behind
    #[error("Compiler produced no module-info.class: {0}")]
    MissingOutput(#[source] std::io::Error),
}

/// Renders the module descriptor source.
///
/// Exports come from `module.exports_packages` when present, otherwise from
/// `inferred`. A module without declared dependencies gets no `requires`
/// lines.
pub fn render_descriptor(module: &Module, inferred: &BTreeSet<String>) -> String {
    let mut source = format!("module {} {{\n", module.name);

    let exports: Vec<&str> = match module.exports() {
        Some(explicit) => explicit,
        None => inferred.iter().map(String::as_str).collect(),
    };
    for package in exports {
        let _ = writeln!(source, "    exports {package};");
    }
    for required in module.requires() {
        let _ = writeln!(source, "    requires {required};");
    }

    source.push_str("}\n");
    source
}

/// Writes and compiles the descriptor of one module.
pub struct DescriptorSynthesizer<'a, C: DescriptorCompiler> {
    compiler: &'a C,
    module_path: &'a OsStr,
}

impl<'a, C: DescriptorCompiler> DescriptorSynthesizer<'a, C> {
    pub fn new(compiler: &'a C, module_path: &'a OsStr) -> Self {
        Self {
            compiler,
            module_path,
        }
    }

    /// Produces the compiled descriptor for `module` inside `scratch`.
    ///
    /// # Errors
    ///
    /// - [`SynthesisError::WriteSource`] if the source cannot be written
    /// - [`SynthesisError::Compile`] if the compiler cannot run or times out
    /// - [`SynthesisError::Diagnostic`] if the compiler reports problems
    /// - [`SynthesisError::MissingOutput`] if no class file was produced
    pub async fn synthesize(
        &self,
        scratch: &Path,
        module: &Module,
        inferred: &BTreeSet<String>,
    ) -> Result<Vec<u8>, SynthesisError> {
        let source = render_descriptor(module, inferred);
        debug!(module = %module.name, descriptor = %source, "Descriptor rendered");

        tokio::fs::write(scratch.join(DESCRIPTOR_SOURCE), source.as_bytes())
            .await
            .map_err(SynthesisError::WriteSource)?;

        if let Some(diagnostic) = self.compiler.compile(scratch, self.module_path).await? {
            return Err(SynthesisError::Diagnostic(diagnostic));
        }

        tokio::fs::read(scratch.join(DESCRIPTOR_CLASS))
            .await
            .map_err(SynthesisError::MissingOutput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeCompiler, FakeOutcome};

    fn packages(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_inferred_exports_without_requires() {
        let module = Module::new("com.acme");
        let source = render_descriptor(&module, &packages(&["com.acme", "com.acme.impl"]));
        assert_eq!(
            source,
            "module com.acme {\n    exports com.acme;\n    exports com.acme.impl;\n}\n"
        );
    }

    #[test]
    fn test_render_explicit_exports_and_requires() {
        let module = Module::new("com.acme")
            .with_exports(["com.acme.api"])
            .with_requires(["java.sql", "org.slf4j"]);
        // Inferred packages are ignored when exports are explicit
        let source = render_descriptor(&module, &packages(&["com.acme.internal"]));
        assert_eq!(
            source,
            "module com.acme {\n    exports com.acme.api;\n    requires java.sql;\n    requires org.slf4j;\n}\n"
        );
    }

    #[test]
    fn test_render_empty_explicit_exports_exports_nothing() {
        let module = Module::new("com.acme").with_exports(Vec::<String>::new());
        let source = render_descriptor(&module, &packages(&["com.acme"]));
        assert_eq!(source, "module com.acme {\n}\n");
    }

    #[tokio::test]
    async fn test_synthesize_returns_compiled_bytes() {
        let scratch = tempfile::tempdir().unwrap();
        let compiler = FakeCompiler::new();
        let synthesizer = DescriptorSynthesizer::new(&compiler, OsStr::new("/mods"));

        let bytes = synthesizer
            .synthesize(scratch.path(), &Module::new("m"), &packages(&["p"]))
            .await
            .unwrap();

        assert!(bytes.starts_with(FakeCompiler::MAGIC));
        assert!(scratch.path().join(DESCRIPTOR_SOURCE).exists());
        let calls = compiler.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].module_path, "/mods");
    }

    #[tokio::test]
    async fn test_synthesize_diagnostic_is_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let compiler =
            FakeCompiler::new().with_outcome("m", FakeOutcome::Diagnostic("module not found: x"));
        let synthesizer = DescriptorSynthesizer::new(&compiler, OsStr::new(""));

        let err = synthesizer
            .synthesize(scratch.path(), &Module::new("m"), &BTreeSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Diagnostic(ref d) if d.contains("module not found")));
    }

    #[tokio::test]
    async fn test_synthesize_missing_output_is_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let compiler = FakeCompiler::new().with_outcome("m", FakeOutcome::NoOutput);
        let synthesizer = DescriptorSynthesizer::new(&compiler, OsStr::new(""));

        let err = synthesizer
            .synthesize(scratch.path(), &Module::new("m"), &BTreeSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::MissingOutput(_)));
    }

    #[tokio::test]
    async fn test_synthesize_timeout_is_distinct() {
        let scratch = tempfile::tempdir().unwrap();
        let compiler = FakeCompiler::new().with_outcome("m", FakeOutcome::Timeout);
        let synthesizer = DescriptorSynthesizer::new(&compiler, OsStr::new(""));

        let err = synthesizer
            .synthesize(scratch.path(), &Module::new("m"), &BTreeSet::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::Compile(CompileError::Timeout { .. })
        ));
    }
}
