//! Fixtures shared by unit tests: JAR builders and a scripted compiler.

use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::traits::{CompileError, DescriptorCompiler, DESCRIPTOR_CLASS, DESCRIPTOR_SOURCE};

pub enum Entry {
    Dir(String),
    File(String, Vec<u8>),
}

pub fn dir(name: &str) -> Entry {
    Entry::Dir(name.to_string())
}

pub fn file(name: &str, data: &[u8]) -> Entry {
    Entry::File(name.to_string(), data.to_vec())
}

/// Writes a JAR holding `entries` in the given order.
pub fn write_jar(path: &Path, entries: &[Entry]) {
    let mut writer = ZipWriter::new(std::fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for entry in entries {
        match entry {
            Entry::Dir(name) => writer.add_directory(name.as_str(), options).unwrap(),
            Entry::File(name, data) => {
                writer.start_file(name.as_str(), options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
    }
    writer.finish().unwrap();
}

/// Reads every entry of a JAR as `(name, bytes)` in archive order.
/// Directory entries have empty contents.
pub fn read_jar(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        out.push((entry.name().to_string(), data));
    }
    out
}

/// A small library JAR with two packages and a resource.
pub fn sample_jar(path: &Path) {
    write_jar(
        path,
        &[
            dir("META-INF/"),
            file("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            dir("com/"),
            dir("com/acme/"),
            file("com/acme/Api.class", b"\xca\xfe\xba\xbe api"),
            file("com/acme/impl/Impl.class", b"\xca\xfe\xba\xbe impl"),
            file("com/acme/res/data.properties", b"k=v"),
        ],
    );
}

#[derive(Debug, Clone)]
pub enum FakeOutcome {
    Diagnostic(&'static str),
    NoOutput,
    Timeout,
    LaunchFailure,
}

#[derive(Debug, Clone)]
pub struct CompileCall {
    pub module: String,
    pub source: String,
    pub module_path: String,

    /// `*-mod.jar` files visible on the module path when the call was made
    pub visible_modules: Vec<String>,
}

/// Compiler double: "compiles" by writing a magic header followed by the
/// descriptor source, unless an outcome is scripted for the module.
#[derive(Default)]
pub struct FakeCompiler {
    outcomes: HashMap<String, FakeOutcome>,
    calls: Mutex<Vec<CompileCall>>,
}

impl FakeCompiler {
    pub const MAGIC: &'static [u8] = b"\xca\xfe\xba\xbe";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, module: &str, outcome: FakeOutcome) -> Self {
        self.outcomes.insert(module.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> Vec<CompileCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn module_name(source: &str) -> String {
    source
        .trim_start()
        .strip_prefix("module ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}

fn visible_modules(module_path: &OsStr) -> Vec<String> {
    let mut found = Vec::new();
    for dir in std::env::split_paths(module_path) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with("-mod.jar") {
                found.push(name);
            }
        }
    }
    found.sort();
    found
}

#[async_trait]
impl DescriptorCompiler for FakeCompiler {
    fn compiler_id(&self) -> &str {
        "fake"
    }

    async fn compile(
        &self,
        source_dir: &Path,
        module_path: &OsStr,
    ) -> Result<Option<String>, CompileError> {
        let source = std::fs::read_to_string(source_dir.join(DESCRIPTOR_SOURCE))?;
        let module = module_name(&source);
        self.calls.lock().unwrap().push(CompileCall {
            module: module.clone(),
            source: source.clone(),
            module_path: module_path.to_string_lossy().into_owned(),
            visible_modules: visible_modules(module_path),
        });

        match self.outcomes.get(&module) {
            Some(FakeOutcome::Diagnostic(text)) => Ok(Some(text.to_string())),
            Some(FakeOutcome::NoOutput) => Ok(None),
            Some(FakeOutcome::Timeout) => Err(CompileError::Timeout { timeout_secs: 5 }),
            Some(FakeOutcome::LaunchFailure) => Err(CompileError::Launch {
                program: "javac".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "javac not found"),
            }),
            None => {
                let mut class = Self::MAGIC.to_vec();
                class.extend_from_slice(source.as_bytes());
                std::fs::write(source_dir.join(DESCRIPTOR_CLASS), class)?;
                Ok(None)
            }
        }
    }
}
