use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::debug;
use std::path::Path;
use tar::{Archive, EntryType};

use super::ArchiveExtractor;
use super::member::{MemberWriter, strip_path};
use crate::runtime::Runtime;

/// Extractor for .tar.gz / .tgz archives
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        dest: &Path,
        strip_components: usize,
    ) -> Result<()> {
        debug!("Extracting tar.gz archive to {:?}...", dest);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        let mut archive = Archive::new(GzDecoder::new(file));
        let writer = MemberWriter::new(runtime, dest)?;

        for entry in archive.entries().context("read tar")? {
            let mut entry = entry.context("read tar")?;
            let raw_name = entry
                .path()
                .context("read tar entry path")?
                .to_string_lossy()
                .into_owned();
            let Some(name) = strip_path(&raw_name, strip_components) else {
                continue;
            };
            let mode = entry.header().mode().unwrap_or(0);
            let kind = entry.header().entry_type();

            match kind {
                EntryType::Directory => writer.directory(&name, mode)?,
                EntryType::Regular | EntryType::Continuous => {
                    writer.file(&name, mode, &mut entry)?
                }
                EntryType::Symlink => {
                    let Some(link) = entry.link_name().context("read tar link name")? else {
                        continue;
                    };
                    writer.symlink(&name, &link.to_string_lossy())?
                }
                other => debug!("Skipping tar entry {:?} of type {:?}", name, other),
            }
        }

        writer.finish()
    }
}
