//! Command-line interface of the `jar-modularizer` binary.

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::compiler::JavacCompiler;
use crate::executor::ModularizerConfig;

/// Turns plain JARs into Java modules described by a JSON descriptor
#[derive(Parser, Debug)]
#[command(name = "jar-modularizer", version, about)]
pub struct Cli {
    /// JSON file listing each artifact and the module it becomes
    #[arg(short, long)]
    pub descriptor: PathBuf,

    /// Directory holding the source JARs (not searched recursively)
    #[arg(short, long)]
    pub source: PathBuf,

    /// Output directory for modularized JARs [default: <SOURCE>/mods]
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Extra module path entries for resolving `requires`
    #[arg(long, value_name = "PATHS")]
    pub module_path: Option<OsString>,

    /// JDK whose `javac` compiles the descriptors [default: $JAVA_HOME, then PATH]
    #[arg(long, value_name = "DIR")]
    pub jdk_home: Option<PathBuf>,

    /// Seconds to wait for one descriptor compilation
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub compile_timeout: u64,

    /// Leave per-archive scratch directories in the output directory
    #[arg(long)]
    pub keep_scratch: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Invalid command-line inputs, detected before a run starts.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Descriptor '{}' is not a file", .0.display())]
    DescriptorNotFile(PathBuf),

    #[error("Source '{}' is not a directory", .0.display())]
    SourceNotDirectory(PathBuf),
}

impl Cli {
    pub fn validate(&self) -> Result<(), CliError> {
        if !self.descriptor.is_file() {
            return Err(CliError::DescriptorNotFile(self.descriptor.clone()));
        }
        if !self.source.is_dir() {
            return Err(CliError::SourceNotDirectory(self.source.clone()));
        }
        Ok(())
    }

    pub fn config(&self) -> ModularizerConfig {
        let mut config = ModularizerConfig::new(&self.descriptor, &self.source)
            .with_cleanup(!self.keep_scratch);
        if let Some(dest) = &self.dest {
            config = config.with_dest_dir(dest);
        }
        if let Some(module_path) = &self.module_path {
            config = config.with_module_path(module_path);
        }
        config
    }

    /// Builds the compiler and logs which `javac` it resolved to.
    pub fn compiler(&self) -> JavacCompiler {
        let compiler = self.resolve_compiler();
        info!(
            program = %compiler.program().display(),
            timeout_secs = self.compile_timeout,
            "Using descriptor compiler"
        );
        compiler
    }

    /// An unusable `--jdk-home` falls back to the default lookup with a warning.
    fn resolve_compiler(&self) -> JavacCompiler {
        let compiler =
            JavacCompiler::new().with_timeout(Duration::from_secs(self.compile_timeout));
        let Some(jdk_home) = &self.jdk_home else {
            return compiler;
        };
        match compiler.clone().with_jdk_home(jdk_home) {
            Ok(configured) => configured,
            Err(invalid) => {
                warn!(
                    jdk_home = %invalid.display(),
                    "No executable javac under JDK home, using default lookup"
                );
                compiler
            }
        }
    }
}

/// How a run ended, as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Successful,
    PartialFailure,
    Fatal,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Successful => 0,
            Self::PartialFailure => 1,
            Self::Fatal => 2,
        }
    }
}

/// Summary block printed at the end of every run, fatal or not.
pub fn render_summary(
    status: RunStatus,
    modularized: usize,
    errors: usize,
    skipped: usize,
    elapsed: Duration,
) -> String {
    let headline = match status {
        RunStatus::Successful => "SUCCESSFUL",
        RunStatus::PartialFailure => "Finished with some non-fatal errors",
        RunStatus::Fatal => "FAILED: run aborted by a fatal error",
    };

    let mut out = format!("\n{headline}\n");
    let _ = writeln!(out, "{modularized} JARs modularized in {elapsed:.2?}");
    if skipped > 0 {
        let _ = writeln!(out, "{skipped} artifacts without a matching JAR");
    }
    let _ = writeln!(out, "{errors} errors found");
    out
}
