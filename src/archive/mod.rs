//! Turning a verified artifact into a staging tree.
//!
//! # Structure
//!
//! - `member` - Per-member safety rules (containment, symlinks, modes, size cap)
//! - `tar_gz` - `.tar.gz` / `.tgz` extractor
//! - `zip` - `.zip` extractor

mod member;
mod tar_gz;
mod zip;

use anyhow::{Context, Result, anyhow};
use log::debug;
use std::path::Path;

use crate::formula::{InstallSpec, InstallType};
use crate::runtime::Runtime;

pub use member::{MAX_EXTRACT_SIZE, member_target, sanitize_mode, strip_path};
pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

/// Trait for format-specific archive extractors
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle the given archive format
    fn can_handle(&self, archive_path: &Path) -> bool;

    /// Unpack the archive into `dest`, dropping `strip_components` leading segments
    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        dest: &Path,
        strip_components: usize,
    ) -> Result<()>;
}

/// Dispatcher that selects the appropriate extractor based on archive format.
pub struct ArchiveExtractorImpl {
    tar_gz: TarGzExtractor,
    zip: ZipExtractor,
}

impl Default for ArchiveExtractorImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractorImpl {
    pub fn new() -> Self {
        Self {
            tar_gz: TarGzExtractor,
            zip: ZipExtractor,
        }
    }
}

impl ArchiveExtractor for ArchiveExtractorImpl {
    fn can_handle(&self, archive_path: &Path) -> bool {
        self.tar_gz.can_handle(archive_path) || self.zip.can_handle(archive_path)
    }

    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        dest: &Path,
        strip_components: usize,
    ) -> Result<()> {
        if self.tar_gz.can_handle(archive_path) {
            return self
                .tar_gz
                .extract(runtime, archive_path, dest, strip_components);
        }
        if self.zip.can_handle(archive_path) {
            return self
                .zip
                .extract(runtime, archive_path, dest, strip_components);
        }
        Err(anyhow!(
            "Unsupported archive format: {}",
            archive_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| archive_path.display().to_string())
        ))
    }
}

/// Lay out `artifact` under `dest` according to `spec`.
///
/// `binary` artifacts are copied to `dest/bin/<binary_name>`; `archive`
/// artifacts are unpacked member by member.
#[tracing::instrument(skip(runtime, spec))]
pub fn extract<R: Runtime>(
    runtime: &R,
    artifact: &Path,
    dest: &Path,
    spec: &InstallSpec,
) -> Result<()> {
    runtime
        .create_dir_all(dest)
        .with_context(|| format!("create dest dir {}", dest.display()))?;

    match spec.kind {
        InstallType::Binary => install_binary(runtime, artifact, dest, spec.binary_name.as_deref()),
        InstallType::Archive => {
            ArchiveExtractorImpl::new().extract(runtime, artifact, dest, spec.strip_components)?;
            if let Some(binary_name) = spec.binary_name.as_deref() {
                promote_root_binary(runtime, dest, binary_name)?;
            }
            Ok(())
        }
    }
}

/// Copy a bare executable into `dest/bin/` with mode 0755.
fn install_binary<R: Runtime>(
    runtime: &R,
    artifact: &Path,
    dest: &Path,
    binary_name: Option<&str>,
) -> Result<()> {
    let name = match binary_name {
        Some(name) => name.to_string(),
        None => artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("artifact path has no file name")?,
    };
    let bin_dir = dest.join("bin");
    runtime.create_dir_all(&bin_dir)?;

    let target = bin_dir.join(&name);
    debug!("Installing binary {:?} as {:?}", artifact, target);
    runtime
        .copy(artifact, &target)
        .with_context(|| format!("copy binary to {}", target.display()))?;
    runtime.set_permissions(&target, 0o755)
}

/// Archives that ship their executable at the root get it moved into `bin/`,
/// unless the archive already has a `bin/` directory.
fn promote_root_binary<R: Runtime>(runtime: &R, dest: &Path, binary_name: &str) -> Result<()> {
    let root_binary = dest.join(binary_name);
    let bin_dir = dest.join("bin");
    if !runtime.is_file(&root_binary) || runtime.exists(&bin_dir) {
        return Ok(());
    }

    debug!("Moving {:?} into bin/", root_binary);
    runtime
        .create_dir_all(&bin_dir)
        .context("create bin dir")?;
    runtime
        .rename(&root_binary, &bin_dir.join(binary_name))
        .context("move binary to bin/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs::{self, File};
    use std::path::PathBuf;
    use tar::Builder;
    use tempfile::tempdir;

    fn create_test_archive(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let enc = GzEncoder::new(file, Compression::default());
        let mut tar = Builder::new(enc);

        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            tar.append(&header, content.as_bytes()).unwrap();
        }

        tar.into_inner().unwrap().finish().unwrap();
    }

    fn archive_spec(binary_name: Option<&str>, strip_components: usize) -> InstallSpec {
        InstallSpec {
            kind: InstallType::Archive,
            binary_name: binary_name.map(String::from),
            strip_components,
        }
    }

    #[test]
    fn test_extractor_impl_can_handle() {
        let extractor = ArchiveExtractorImpl::new();
        assert!(extractor.can_handle(Path::new("file.tar.gz")));
        assert!(extractor.can_handle(Path::new("file.tgz")));
        assert!(extractor.can_handle(Path::new("file.zip")));
        assert!(!extractor.can_handle(Path::new("file.unknown")));
    }

    #[test]
    fn test_extractor_impl_unsupported_format() {
        // Strict mock: nothing may be touched for an unknown format.
        let runtime = MockRuntime::new();
        let result = ArchiveExtractorImpl::new().extract(
            &runtime,
            Path::new("/tmp/file.tar.xz"),
            Path::new("/tmp/out"),
            0,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Unsupported archive format: file.tar.xz"));
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_binary() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let artifact = dir.path().join("jq-1.7.1");
        fs::write(&artifact, "ELF").unwrap();
        let dest = dir.path().join("stage");

        let spec = InstallSpec {
            kind: InstallType::Binary,
            binary_name: Some("jq".to_string()),
            strip_components: 0,
        };
        extract(&RealRuntime, &artifact, &dest, &spec).unwrap();

        let installed = dest.join("bin/jq");
        assert_eq!(fs::read_to_string(&installed).unwrap(), "ELF");
        assert_eq!(
            fs::metadata(&installed).unwrap().permissions().mode() & 0o777,
            0o755
        );
    }

    #[test]
    fn test_extract_binary_defaults_to_artifact_name() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("tool-2.0");
        fs::write(&artifact, "ELF").unwrap();
        let dest = dir.path().join("stage");

        let spec = InstallSpec {
            kind: InstallType::Binary,
            binary_name: None,
            strip_components: 0,
        };
        extract(&RealRuntime, &artifact, &dest, &spec).unwrap();
        assert!(dest.join("bin/tool-2.0").is_file());
    }

    #[test]
    fn test_extract_archive_promotes_root_binary() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("fd.tar.gz");
        create_test_archive(
            &archive,
            &[("fd-9.0/fd", "ELF"), ("fd-9.0/LICENSE", "MIT")],
        );
        let dest = dir.path().join("stage");

        extract(&RealRuntime, &archive, &dest, &archive_spec(Some("fd"), 1)).unwrap();

        assert!(dest.join("bin/fd").is_file());
        assert!(!dest.join("fd").exists());
        assert!(dest.join("LICENSE").is_file());
    }

    #[test]
    fn test_extract_archive_keeps_existing_bin_dir() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("rg.tar.gz");
        create_test_archive(&archive, &[("rg", "root copy"), ("bin/other", "x")]);
        let dest = dir.path().join("stage");

        extract(&RealRuntime, &archive, &dest, &archive_spec(Some("rg"), 0)).unwrap();

        assert!(dest.join("rg").is_file());
        assert!(!dest.join("bin/rg").exists());
    }

    #[test]
    fn test_extract_unsupported_archive_is_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("tool.rar");
        fs::write(&archive, "rar").unwrap();

        let err = extract(
            &RealRuntime,
            &archive,
            &dir.path().join("stage"),
            &archive_spec(None, 0),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unsupported archive format"));
    }

    #[test]
    fn test_promote_root_binary_with_mock() {
        let dest = PathBuf::from("/stage");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_is_file()
            .with(mockall::predicate::eq(dest.join("jq")))
            .returning(|_| true);
        runtime
            .expect_exists()
            .with(mockall::predicate::eq(dest.join("bin")))
            .returning(|_| false);
        runtime
            .expect_create_dir_all()
            .with(mockall::predicate::eq(dest.join("bin")))
            .returning(|_| Ok(()));
        runtime
            .expect_rename()
            .with(
                mockall::predicate::eq(dest.join("jq")),
                mockall::predicate::eq(dest.join("bin/jq")),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        promote_root_binary(&runtime, &dest, "jq").unwrap();
    }
}
