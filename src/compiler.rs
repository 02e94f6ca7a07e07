//! `javac`-backed [`DescriptorCompiler`].

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::traits::{CompileError, DescriptorCompiler, DESCRIPTOR_SOURCE};

#[cfg(windows)]
const JAVAC: &str = "javac.exe";
#[cfg(not(windows))]
const JAVAC: &str = "javac";

/// Default wait budget for a single descriptor compilation.
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the JDK's `javac` as a child process.
///
/// Without an explicit JDK home the compiler uses `JAVA_HOME` when it points
/// at a usable JDK, and falls back to `javac` on `PATH` otherwise.
#[derive(Debug, Clone)]
pub struct JavacCompiler {
    jdk_home: Option<PathBuf>,
    timeout: Duration,
}

impl Default for JavacCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl JavacCompiler {
    pub fn new() -> Self {
        let jdk_home = std::env::var_os("JAVA_HOME")
            .map(PathBuf::from)
            .filter(|home| Self::validate_jdk_home(home));
        Self {
            jdk_home,
            timeout: DEFAULT_COMPILE_TIMEOUT,
        }
    }

    /// Uses the JDK installed at `jdk_home`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `jdk_home/bin/javac` is missing or not executable.
    pub fn with_jdk_home(mut self, jdk_home: impl Into<PathBuf>) -> Result<Self, PathBuf> {
        let jdk_home = jdk_home.into();
        if !Self::validate_jdk_home(&jdk_home) {
            return Err(jdk_home);
        }
        self.jdk_home = Some(jdk_home);
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn jdk_home(&self) -> Option<&Path> {
        self.jdk_home.as_deref()
    }

    /// `true` if `jdk_home/bin/javac` exists and is executable.
    pub fn validate_jdk_home(jdk_home: &Path) -> bool {
        let javac = jdk_home.join("bin").join(JAVAC);
        match std::fs::metadata(&javac) {
            Ok(meta) => meta.is_file() && is_executable(&meta),
            Err(_) => false,
        }
    }

    /// Path (or bare name) of the `javac` binary to run.
    pub fn program(&self) -> PathBuf {
        match &self.jdk_home {
            Some(home) => home.join("bin").join(JAVAC),
            None => PathBuf::from(JAVAC),
        }
    }

    fn arguments(source_dir: &Path, module_path: &OsStr) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-d".into(), source_dir.as_os_str().to_owned()];
        if !module_path.is_empty() {
            args.push("--module-path".into());
            args.push(module_path.to_owned());
        }
        args.push(source_dir.join(DESCRIPTOR_SOURCE).into_os_string());
        args
    }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    true
}

fn command_line(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl DescriptorCompiler for JavacCompiler {
    fn compiler_id(&self) -> &str {
        "javac"
    }

    async fn compile(
        &self,
        source_dir: &Path,
        module_path: &OsStr,
    ) -> Result<Option<String>, CompileError> {
        let program = self.program();
        let args = Self::arguments(source_dir, module_path);
        let rendered = command_line(&program, &args);
        debug!(command = %rendered, "Invoking compiler");

        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CompileError::Launch {
                program: program.display().to_string(),
                source,
            })?;

        // Dropping the wait future on timeout kills the child
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(command = %rendered, "Compiler timed out");
                return Err(CompileError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            return Ok(Some(format!("Command: {rendered}\n{}", stderr.trim_end())));
        }
        if !output.status.success() {
            return Ok(Some(format!(
                "Command: {rendered}\nCompiler exited with {}",
                output.status
            )));
        }
        Ok(None)
    }
}
