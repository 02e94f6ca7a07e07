//! Per-archive modularization pipeline.
//!
//! This module provides the [`ModularizePipeline`] coordinator that runs the
//! stages for one source JAR (Extract → Synthesize → Patch) with:
//! - Blocking archive I/O moved off the runtime via `spawn_blocking`
//! - Configurable timeouts per blocking stage
//! - Structured logging via `tracing`
//! - Scratch cleanup on every exit path via RAII (`Drop` on [`ScratchDir`])

pub mod extract;
pub mod patch;
pub mod scratch;
pub mod synthesize;

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::model::Artifact;
use crate::traits::{CompileError, DescriptorCompiler};

pub use extract::{ExtractError, ExtractInput, Extraction, JarExtractor};
pub use patch::{output_archive_name, JarPatcher, PatchError, PatchInput, PatchOutput};
pub use scratch::ScratchDir;
pub use synthesize::{render_descriptor, DescriptorSynthesizer, SynthesisError};

// ============================================================================
// Stage Trait
// ============================================================================

/// Blocking pipeline stage that transforms Input → Output.
///
/// Stages own their input so that resources such as a [`ScratchDir`] are
/// released inside the stage when it fails.
pub trait ArchiveStage: Send + Sync {
    type Input;
    type Output;
    type Error: std::error::Error + Send + Sync + 'static;

    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;

    /// Name used in logs and timeout errors.
    fn stage_name(&self) -> &'static str;
}

// ============================================================================
// Pipeline Types
// ============================================================================

/// Result of modularizing one archive.
#[derive(Debug, Clone)]
pub struct ModularizedArchive {
    pub source: PathBuf,
    pub output: PathBuf,
    pub module: String,

    /// Number of `exports` directives in the descriptor
    pub exported_packages: usize,

    pub stats: PipelineStats,
}

/// Timing and volume of one pipeline run.
#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    pub total_duration_ms: u64,
    pub extraction_duration_ms: u64,
    pub synthesis_duration_ms: u64,
    pub patch_duration_ms: u64,
    pub files_extracted: usize,
    pub entries_copied: usize,
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Whether a failure ends only the current artifact or the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Recoverable,
    Fatal,
}

/// Errors that can occur while modularizing one archive.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Failed to create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    /// Blocking stage exceeded its timeout
    #[error("Stage '{stage}' timed out after {timeout_secs}s")]
    StageTimeout { stage: String, timeout_secs: u64 },

    /// Blocking stage panicked or was cancelled
    #[error("Stage '{stage}' aborted: {message}")]
    StageAborted { stage: String, message: String },

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Patch(#[from] PatchError),
}

impl PipelineError {
    /// A compiler that cannot be launched fails every artifact the same way,
    /// so it ends the run; everything else is local to the artifact.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Synthesis(SynthesisError::Compile(CompileError::Launch { .. })) => {
                Severity::Fatal
            }
            _ => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Modularizes single archives into an output directory.
///
/// The compiler is supplied once and shared by every archive the pipeline
/// processes. Compiled descriptors resolve their `requires` against the output
/// directory (plus any extra module path), so archives must be fed in
/// dependency order.
///
/// # Example
///
/// ```ignore
/// use jar_modularizer::{JavacCompiler, ModularizePipeline};
///
/// let pipeline = ModularizePipeline::new(JavacCompiler::new(), "/work/mods")
///     .with_timeout(Duration::from_secs(60));
/// let done = pipeline.execute(Path::new("/work/lib.jar"), &artifact).await?;
/// println!("wrote {}", done.output.display());
/// ```
pub struct ModularizePipeline<C>
where
    C: DescriptorCompiler,
{
    compiler: C,

    /// Destination of patched archives and parent of scratch directories
    output_dir: PathBuf,

    /// Module path handed to the compiler
    module_path: OsString,

    /// Timeout for each blocking stage (default: 5 minutes)
    stage_timeout: Duration,

    auto_cleanup: bool,
}

impl<C> ModularizePipeline<C>
where
    C: DescriptorCompiler,
{
    /// Creates a pipeline writing into `output_dir`.
    ///
    /// Default configuration:
    /// - Module path: `output_dir` only
    /// - Timeout: 5 minutes per blocking stage
    /// - Auto-cleanup: enabled
    pub fn new(compiler: C, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            compiler,
            module_path: output_dir.clone().into_os_string(),
            output_dir,
            stage_timeout: Duration::from_secs(300),
            auto_cleanup: true,
        }
    }

    /// Appends `extra` (a platform path list) to the compiler module path.
    pub fn with_module_path(mut self, extra: Option<&OsStr>) -> Self {
        if let Some(extra) = extra.filter(|e| !e.is_empty()) {
            self.module_path.push(if cfg!(windows) { ";" } else { ":" });
            self.module_path.push(extra);
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// If `false`, scratch directories are left in the output directory.
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.auto_cleanup = cleanup;
        self
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn module_path(&self) -> &OsStr {
        &self.module_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Modularizes `archive` into the module described by `artifact`.
    ///
    /// Stages:
    /// 1. Scratch allocation in the output directory
    /// 2. Extraction (refuses archives that already hold a descriptor)
    /// 3. Descriptor synthesis and compilation
    /// 4. Patching into `<stem>-mod.jar`
    /// 5. Scratch cleanup, on success and failure alike
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`]; check [`PipelineError::severity`] to decide
    /// whether other archives can still be processed. A partially written
    /// output archive is left in place.
    pub async fn execute(
        &self,
        archive: &Path,
        artifact: &Artifact,
    ) -> Result<ModularizedArchive, PipelineError> {
        let start = Instant::now();
        let mut stats = PipelineStats::default();

        // ====================================================================
        // Stage 1: Scratch + Extraction
        // ====================================================================

        let scratch = ScratchDir::create(&self.output_dir, &artifact.name, self.auto_cleanup)
            .map_err(PipelineError::Scratch)?;

        let extraction_start = Instant::now();
        let extraction = self
            .run_blocking(
                JarExtractor,
                ExtractInput {
                    archive: archive.to_path_buf(),
                    scratch,
                },
            )
            .await?;
        stats.extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
        stats.files_extracted = extraction.files;
        debug!(
            archive = %artifact.name,
            duration_ms = stats.extraction_duration_ms,
            packages = extraction.packages.len(),
            "Extraction completed"
        );

        // ====================================================================
        // Stage 2: Descriptor synthesis
        // ====================================================================
        //
        // `extraction.scratch` lives until the end of this function; dropping
        // it on any `?` below removes the directory.

        let synthesis_start = Instant::now();
        let synthesizer = DescriptorSynthesizer::new(&self.compiler, &self.module_path);
        let descriptor = synthesizer
            .synthesize(
                extraction.scratch.path(),
                &artifact.module,
                &extraction.packages,
            )
            .await?;
        stats.synthesis_duration_ms = synthesis_start.elapsed().as_millis() as u64;
        let exported_packages = artifact
            .module
            .exports()
            .map_or(extraction.packages.len(), |e| e.len());
        debug!(
            archive = %artifact.name,
            compiler = self.compiler.compiler_id(),
            duration_ms = stats.synthesis_duration_ms,
            "Descriptor compiled"
        );

        // ====================================================================
        // Stage 3: Patch
        // ====================================================================

        let patch_start = Instant::now();
        let output = self
            .output_dir
            .join(output_archive_name(&artifact.name));
        let patched = self
            .run_blocking(
                JarPatcher,
                PatchInput {
                    source: archive.to_path_buf(),
                    output,
                    descriptor,
                },
            )
            .await
            .inspect_err(|e| {
                if let PipelineError::Patch(patch) = e {
                    warn!(
                        output = %patch.output().display(),
                        "Partially written archive left in place"
                    );
                }
            })?;
        stats.patch_duration_ms = patch_start.elapsed().as_millis() as u64;
        stats.entries_copied = patched.entries_copied;

        drop(extraction);
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            archive = %artifact.name,
            module = %artifact.module.name,
            output = %patched.path.display(),
            duration_ms = stats.total_duration_ms,
            "Archive modularized"
        );

        Ok(ModularizedArchive {
            source: archive.to_path_buf(),
            output: patched.path,
            module: artifact.module.name.clone(),
            exported_packages,
            stats,
        })
    }

    /// Runs a blocking stage on the blocking pool under the stage timeout.
    async fn run_blocking<S>(&self, stage: S, input: S::Input) -> Result<S::Output, PipelineError>
    where
        S: ArchiveStage + 'static,
        S::Input: Send + 'static,
        S::Output: Send + 'static,
        PipelineError: From<S::Error>,
    {
        let name = stage.stage_name();
        let joined = timeout(
            self.stage_timeout,
            tokio::task::spawn_blocking(move || stage.execute(input)),
        )
        .await
        .map_err(|_| PipelineError::StageTimeout {
            stage: name.to_string(),
            timeout_secs: self.stage_timeout.as_secs(),
        })?
        .map_err(|e| PipelineError::StageAborted {
            stage: name.to_string(),
            message: e.to_string(),
        })?;
        Ok(joined?)
    }
}

// ============================================================================
// Tests
// ============================================================================
