//! Archive patching stage.
//!
//! Writes a copy of the source JAR with the compiled module descriptor
//! appended. Existing entries are copied raw, so names, compression and bytes
//! are exactly those of the original.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::ArchiveStage;
use crate::traits::DESCRIPTOR_CLASS;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Failed to patch '{}': {source}", output.display())]
    Archive {
        output: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("I/O error writing '{}': {source}", output.display())]
    Io {
        output: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PatchError {
    /// Path of the (possibly partial) output archive.
    pub fn output(&self) -> &PathBuf {
        match self {
            Self::Archive { output, .. } | Self::Io { output, .. } => output,
        }
    }
}

pub struct PatchInput {
    pub source: PathBuf,
    pub output: PathBuf,
    pub descriptor: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PatchOutput {
    pub path: PathBuf,

    /// Entries copied from the source archive (the descriptor not included)
    pub entries_copied: usize,
}

/// Output archive name for `source_name`: `lib.jar` becomes `lib-mod.jar`.
pub fn output_archive_name(source_name: &str) -> String {
    let stem = source_name.strip_suffix(".jar").unwrap_or(source_name);
    format!("{stem}-mod.jar")
}

pub struct JarPatcher;

impl JarPatcher {
    fn patch(input: &PatchInput) -> Result<usize, PatchError> {
        let zip_err = |source| PatchError::Archive {
            output: input.output.clone(),
            source,
        };
        let io_err = |source| PatchError::Io {
            output: input.output.clone(),
            source,
        };

        let reader = File::open(&input.source).map_err(io_err)?;
        let mut original = ZipArchive::new(BufReader::new(reader)).map_err(zip_err)?;

        let out = File::create(&input.output).map_err(io_err)?;
        let mut writer = ZipWriter::new(BufWriter::new(out));

        for i in 0..original.len() {
            let entry = original.by_index_raw(i).map_err(zip_err)?;
            writer.raw_copy_file(entry).map_err(zip_err)?;
        }

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(DESCRIPTOR_CLASS, options).map_err(zip_err)?;
        writer.write_all(&input.descriptor).map_err(io_err)?;

        let mut out = writer.finish().map_err(zip_err)?;
        out.flush().map_err(io_err)?;
        Ok(original.len())
    }
}

impl ArchiveStage for JarPatcher {
    type Input = PatchInput;
    type Output = PatchOutput;
    type Error = PatchError;

    fn execute(&self, input: PatchInput) -> Result<PatchOutput, PatchError> {
        let entries_copied = Self::patch(&input)?;
        Ok(PatchOutput {
            path: input.output,
            entries_copied,
        })
    }

    fn stage_name(&self) -> &'static str {
        "patch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{read_jar, sample_jar};

    #[test]
    fn test_output_archive_name() {
        assert_eq!(output_archive_name("lib.jar"), "lib-mod.jar");
        assert_eq!(output_archive_name("commons-io-2.6.jar"), "commons-io-2.6-mod.jar");
        assert_eq!(output_archive_name("odd"), "odd-mod.jar");
    }

    #[test]
    fn test_patch_copies_entries_and_appends_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lib.jar");
        let output = dir.path().join("lib-mod.jar");
        sample_jar(&source);

        let result = JarPatcher
            .execute(PatchInput {
                source: source.clone(),
                output: output.clone(),
                descriptor: b"compiled".to_vec(),
            })
            .unwrap();
        assert_eq!(result.path, output);

        let before = read_jar(&source);
        let after = read_jar(&output);
        assert_eq!(result.entries_copied, before.len());
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(&after[..before.len()], &before[..]);

        let (name, data) = after.last().unwrap();
        assert_eq!(name, DESCRIPTOR_CLASS);
        assert_eq!(data, b"compiled");
    }

    #[test]
    fn test_patch_missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JarPatcher
            .execute(PatchInput {
                source: dir.path().join("missing.jar"),
                output: dir.path().join("missing-mod.jar"),
                descriptor: Vec::new(),
            })
            .unwrap_err();
        assert!(matches!(err, PatchError::Io { .. }));
        assert_eq!(err.output(), &dir.path().join("missing-mod.jar"));
    }
}
