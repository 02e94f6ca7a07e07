use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;

/// File name of the module descriptor source written before compilation.
pub const DESCRIPTOR_SOURCE: &str = "module-info.java";

/// File name of the compiled module descriptor, and of its archive entry.
pub const DESCRIPTOR_CLASS: &str = "module-info.class";

#[derive(Error, Debug)]
pub enum CompileError {
    /// The compiler process could not be started at all
    #[error("Failed to launch compiler '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Compiler did not finish within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compiles a `module-info.java` into `module-info.class`.
///
/// One value is built per run and handed to the pipeline.
#[async_trait]
pub trait DescriptorCompiler: Send + Sync {
    /// Short name used in logs (e.g. "javac").
    fn compiler_id(&self) -> &str;

    /// Compiles `<source_dir>/module-info.java`, writing
    /// `<source_dir>/module-info.class` on success.
    ///
    /// `module_path` is passed through as the compiler's module path so that
    /// already modularized dependencies resolve.
    ///
    /// Returns `Ok(Some(diagnostic))` when the compiler reported problems,
    /// `Ok(None)` when it ran cleanly.
    async fn compile(
        &self,
        source_dir: &Path,
        module_path: &OsStr,
    ) -> Result<Option<String>, CompileError>;
}
