//! Archive extraction stage.
//!
//! Unpacks a source JAR into its [`ScratchDir`] and records every package
//! that holds at least one compiled class. These are the export candidates
//! used when a module does not list its exports explicitly.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use super::scratch::ScratchDir;
use super::ArchiveStage;
use crate::traits::DESCRIPTOR_CLASS;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// Refuse to modularize an archive twice
    #[error("Archive already contains a module descriptor ('{entry}')")]
    AlreadyModular { entry: String },

    #[error("Entry '{entry}' escapes the extraction directory")]
    PathTraversal { entry: String },

    #[error("Invalid archive: {0}")]
    Archive(#[from] ZipError),

    #[error("I/O error during extraction: {0}")]
    Io(#[from] io::Error),
}

pub struct ExtractInput {
    pub archive: PathBuf,
    pub scratch: ScratchDir,
}

/// Unpacked archive plus what was learned while unpacking it.
#[derive(Debug)]
pub struct Extraction {
    pub scratch: ScratchDir,

    /// Packages containing at least one `.class` entry, sorted
    pub packages: BTreeSet<String>,

    pub files: usize,
    pub directories: usize,
}

/// `true` for the archive entry of a compiled module descriptor, including
/// multi-release copies under `META-INF/versions/<n>/`.
pub fn is_module_descriptor(entry: &str) -> bool {
    entry
        .rsplit('/')
        .next()
        .is_some_and(|file| file == DESCRIPTOR_CLASS)
}

/// Package of a class entry in dot notation.
///
/// Returns `None` for non-class entries, classes in the unnamed package, and
/// anything under `META-INF/`.
pub fn class_package(entry: &str) -> Option<String> {
    if !entry.ends_with(".class") || entry.starts_with("META-INF/") {
        return None;
    }
    let (dir, _) = entry.rsplit_once('/')?;
    if dir.is_empty() {
        return None;
    }
    Some(dir.replace('/', "."))
}

pub struct JarExtractor;

impl ArchiveStage for JarExtractor {
    type Input = ExtractInput;
    type Output = Extraction;
    type Error = ExtractError;

    fn execute(&self, input: ExtractInput) -> Result<Extraction, ExtractError> {
        let ExtractInput { archive, scratch } = input;
        let mut zip = ZipArchive::new(BufReader::new(File::open(&archive)?))?;

        let mut names: Vec<String> = zip.file_names().map(str::to_owned).collect();
        if let Some(entry) = names.iter().find(|n| is_module_descriptor(n)) {
            return Err(ExtractError::AlreadyModular {
                entry: entry.clone(),
            });
        }

        // Sorted so directories are created before the files inside them
        names.sort();

        let mut packages = BTreeSet::new();
        let mut files = 0usize;
        let mut directories = 0usize;

        for name in &names {
            let mut entry = zip.by_name(name)?;
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| ExtractError::PathTraversal {
                    entry: name.clone(),
                })?;
            let target = scratch.safe_child(&relative)?;

            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                directories += 1;
                continue;
            }

            if let Some(package) = class_package(name) {
                packages.insert(package);
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            files += 1;
        }

        debug!(
            archive = %archive.display(),
            files,
            directories,
            packages = packages.len(),
            "Archive extracted"
        );

        Ok(Extraction {
            scratch,
            packages,
            files,
            directories,
        })
    }

    fn stage_name(&self) -> &'static str {
        "extract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{file, sample_jar, write_jar};

    #[test]
    fn test_class_package() {
        assert_eq!(class_package("com/acme/Foo.class").as_deref(), Some("com.acme"));
        assert_eq!(class_package("com/acme/Foo$Inner.class").as_deref(), Some("com.acme"));
        assert_eq!(class_package("Foo.class"), None);
        assert_eq!(class_package("com/acme/readme.txt"), None);
        assert_eq!(class_package("com/acme/"), None);
        assert_eq!(class_package("META-INF/versions/11/com/acme/Foo.class"), None);
    }

    #[test]
    fn test_is_module_descriptor() {
        assert!(is_module_descriptor("module-info.class"));
        assert!(is_module_descriptor("META-INF/versions/9/module-info.class"));
        assert!(!is_module_descriptor("module-info.java"));
        assert!(!is_module_descriptor("com/acme/not-module-info.class"));
    }

    #[test]
    fn test_extracts_files_and_collects_packages() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        sample_jar(&jar);

        let scratch = ScratchDir::create(dir.path(), "lib.jar", true).unwrap();
        let extraction = JarExtractor
            .execute(ExtractInput {
                archive: jar,
                scratch,
            })
            .unwrap();

        let packages: Vec<_> = extraction.packages.iter().map(String::as_str).collect();
        assert_eq!(packages, vec!["com.acme", "com.acme.impl"]);
        assert_eq!(extraction.files, 4);
        assert_eq!(extraction.directories, 3);

        let root = extraction.scratch.path();
        assert_eq!(
            std::fs::read(root.join("com/acme/impl/Impl.class")).unwrap(),
            b"\xca\xfe\xba\xbe impl"
        );
        assert_eq!(std::fs::read(root.join("com/acme/res/data.properties")).unwrap(), b"k=v");
    }

    #[test]
    fn test_rejects_archive_with_module_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("modular.jar");
        write_jar(
            &jar,
            &[
                file("module-info.class", b"\xca\xfe\xba\xbe"),
                file("com/acme/Api.class", b"\xca\xfe\xba\xbe"),
            ],
        );

        let scratch = ScratchDir::create(dir.path(), "modular.jar", true).unwrap();
        let scratch_path = scratch.path().to_path_buf();
        let err = JarExtractor
            .execute(ExtractInput {
                archive: jar,
                scratch,
            })
            .unwrap_err();

        assert!(matches!(err, ExtractError::AlreadyModular { .. }));
        // Scratch was dropped with the failed input
        assert!(!scratch_path.exists());
    }

    #[test]
    fn test_corrupt_archive_is_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("broken.jar");
        std::fs::write(&jar, b"this is not a zip file").unwrap();

        let scratch = ScratchDir::create(dir.path(), "broken.jar", true).unwrap();
        let err = JarExtractor
            .execute(ExtractInput {
                archive: jar,
                scratch,
            })
            .unwrap_err();
        assert!(matches!(err, ExtractError::Archive(_)));
    }
}
