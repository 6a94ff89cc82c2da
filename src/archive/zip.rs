use anyhow::{Context, Result};
use log::debug;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

use super::ArchiveExtractor;
use super::member::{MemberWriter, strip_path};
use crate::runtime::Runtime;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;
/// Longest symlink target accepted from an archive (PATH_MAX on Linux).
const MAX_LINK_TARGET: usize = 4096;

/// Extractor for .zip archives
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".zip")
    }

    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        dest: &Path,
        strip_components: usize,
    ) -> Result<()> {
        debug!("Extracting zip archive to {:?}...", dest);
        let mut file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        // zip crate requires Read + Seek, but Runtime::open returns Box<dyn Read + Send>
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read archive {:?}", archive_path))?;
        let mut archive =
            ZipArchive::new(std::io::Cursor::new(buffer)).context("Failed to parse ZIP archive")?;

        let writer = MemberWriter::new(runtime, dest)?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to read ZIP entry {}", i))?;

            let Some(name) = strip_path(entry.name(), strip_components) else {
                continue;
            };
            let mode = entry.unix_mode().unwrap_or(0);

            if entry.is_dir() {
                writer.directory(&name, mode)?;
            } else if mode & S_IFMT == S_IFLNK {
                let mut raw = Vec::new();
                (&mut entry)
                    .take(MAX_LINK_TARGET as u64 + 1)
                    .read_to_end(&mut raw)
                    .with_context(|| format!("Failed to read symlink entry {:?}", name))?;
                match decode_link_target(raw) {
                    Some(link_target) => writer.symlink(&name, &link_target)?,
                    None => debug!("Skipping symlink entry {:?}: unusable target", name),
                }
            } else {
                writer.file(&name, mode, &mut entry)?;
            }
        }

        writer.finish()
    }
}

/// A zip symlink's content is its target; `None` if it is too long or not UTF-8.
fn decode_link_target(raw: Vec<u8>) -> Option<String> {
    if raw.len() > MAX_LINK_TARGET {
        return None;
    }
    String::from_utf8(raw).ok()
}
