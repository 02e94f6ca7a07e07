//! Run orchestration: load the descriptor, order the artifacts and push each
//! matching source archive through the [`ModularizePipeline`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::graph::{sort_artifacts, OrderError};
use crate::model::{load_descriptor, DescriptorError};
use crate::pipeline::{ModularizePipeline, PipelineError, Severity};
use crate::traits::DescriptorCompiler;

// ============================================================================
// Configuration
// ============================================================================

/// Settings of one modularization run.
#[derive(Debug, Clone)]
pub struct ModularizerConfig {
    pub descriptor: PathBuf,
    pub source_dir: PathBuf,

    /// Defaults to `<source_dir>/mods`
    pub dest_dir: Option<PathBuf>,

    /// Extra module path entries (platform path list) for the compiler
    pub module_path: Option<OsString>,

    pub stage_timeout: Duration,
    pub cleanup: bool,
}

impl ModularizerConfig {
    pub fn new(descriptor: impl Into<PathBuf>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            descriptor: descriptor.into(),
            source_dir: source_dir.into(),
            dest_dir: None,
            module_path: None,
            stage_timeout: Duration::from_secs(300),
            cleanup: true,
        }
    }

    pub fn with_dest_dir(mut self, dest_dir: impl Into<PathBuf>) -> Self {
        self.dest_dir = Some(dest_dir.into());
        self
    }

    pub fn with_module_path(mut self, module_path: impl Into<OsString>) -> Self {
        self.module_path = Some(module_path.into());
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Effective destination directory.
    pub fn dest_dir(&self) -> PathBuf {
        self.dest_dir
            .clone()
            .unwrap_or_else(|| self.source_dir.join("mods"))
    }
}

// ============================================================================
// Run Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Loading,
    Sorting,
    Processing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub modularized: usize,
    pub errors: usize,

    /// Artifacts with no matching source archive
    pub skipped: usize,

    pub duration: Duration,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }
}

/// Failures that end the whole run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("Descriptor '{}' declares no artifacts", path.display())]
    EmptyDescriptor { path: PathBuf },

    #[error("Failed to scan source directory '{}': {source}", path.display())]
    SourceScan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No JAR files found in '{}'", path.display())]
    NoSourceArchives { path: PathBuf },

    #[error("Failed to create destination directory '{}': {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Order(#[from] OrderError),

    /// A pipeline failure that cannot be confined to one archive
    #[error("Aborted while processing '{archive}': {source}")]
    Compiler {
        archive: String,
        #[source]
        source: PipelineError,
    },
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives one run over a descriptor and a source directory.
///
/// Counters are kept on the instance and stay queryable after
/// [`Modularizer::run`] returns, whether it succeeded or not.
pub struct Modularizer<C>
where
    C: DescriptorCompiler,
{
    config: ModularizerConfig,
    pipeline: ModularizePipeline<C>,
    phase: RunPhase,
    modularized: usize,
    errors: usize,
    skipped: usize,
}

impl<C> Modularizer<C>
where
    C: DescriptorCompiler,
{
    pub fn new(config: ModularizerConfig, compiler: C) -> Self {
        let pipeline = ModularizePipeline::new(compiler, config.dest_dir())
            .with_module_path(config.module_path.as_deref())
            .with_timeout(config.stage_timeout)
            .with_cleanup(config.cleanup);
        Self {
            config,
            pipeline,
            phase: RunPhase::Idle,
            modularized: 0,
            errors: 0,
            skipped: 0,
        }
    }

    pub fn config(&self) -> &ModularizerConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &ModularizePipeline<C> {
        &self.pipeline
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn modularized(&self) -> usize {
        self.modularized
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Runs every phase to completion.
    ///
    /// Per-archive failures are counted and logged; only failures listed in
    /// [`RunError`] stop the run.
    #[instrument(
        skip(self),
        fields(
            descriptor = %self.config.descriptor.display(),
            source = %self.config.source_dir.display()
        )
    )]
    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        let start = Instant::now();
        self.modularized = 0;
        self.errors = 0;
        self.skipped = 0;

        // ====================================================================
        // Loading
        // ====================================================================

        self.phase = RunPhase::Loading;
        let artifacts = load_descriptor(&self.config.descriptor)?;
        if artifacts.is_empty() {
            return Err(RunError::EmptyDescriptor {
                path: self.config.descriptor.clone(),
            });
        }

        let archives = scan_archives(&self.config.source_dir)?;
        if archives.is_empty() {
            return Err(RunError::NoSourceArchives {
                path: self.config.source_dir.clone(),
            });
        }

        let dest_dir = self.config.dest_dir();
        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|source| RunError::Destination {
                path: dest_dir.clone(),
                source,
            })?;
        debug!(
            artifacts = artifacts.len(),
            archives = archives.len(),
            dest = %dest_dir.display(),
            "Inputs loaded"
        );

        // ====================================================================
        // Sorting
        // ====================================================================

        self.phase = RunPhase::Sorting;
        let ordered = sort_artifacts(&artifacts)?;
        debug!(
            order = ?ordered.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            "Processing order resolved"
        );

        // ====================================================================
        // Processing
        // ====================================================================

        self.phase = RunPhase::Processing;
        for artifact in &ordered {
            let Some(archive) = archives.iter().find(|a| a.file_name == artifact.name) else {
                warn!(archive = %artifact.name, "No source archive matches artifact, skipping");
                self.skipped += 1;
                continue;
            };

            match self.pipeline.execute(&archive.path, artifact).await {
                Ok(_) => self.modularized += 1,
                Err(e) if e.severity() == Severity::Fatal => {
                    error!(archive = %artifact.name, error = %e, "Aborting run");
                    self.errors += 1;
                    return Err(RunError::Compiler {
                        archive: artifact.name.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    error!(archive = %artifact.name, module = %artifact.module.name, error = %e, "Failed to modularize archive");
                    self.errors += 1;
                }
            }
        }

        self.phase = RunPhase::Done;
        let summary = RunSummary {
            modularized: self.modularized,
            errors: self.errors,
            skipped: self.skipped,
            duration: start.elapsed(),
        };
        info!(
            modularized = summary.modularized,
            errors = summary.errors,
            skipped = summary.skipped,
            duration_ms = summary.duration.as_millis() as u64,
            "Run finished"
        );
        Ok(summary)
    }
}

struct SourceArchive {
    file_name: String,
    path: PathBuf,
}

/// Lists the `*.jar` files directly inside `dir`, sorted by name.
fn scan_archives(dir: &Path) -> Result<Vec<SourceArchive>, RunError> {
    let scan_err = |source| RunError::SourceScan {
        path: dir.to_path_buf(),
        source,
    };

    let mut archives = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        let path = entry.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "jar") {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        archives.push(SourceArchive {
            file_name: file_name.to_string(),
            path: path.clone(),
        });
    }
    archives.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(archives)
}

// ============================================================================
// Tests
// ============================================================================
