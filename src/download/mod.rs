//! Fetching artifacts into the scratch directory and checking them.

mod verify;

pub use verify::{VerifyError, sha256_file, verify_sha256};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

pub use crate::http::FetchError;
use crate::fsutil::format_size;
use crate::http::HttpClient;
use crate::runtime::Runtime;
use crate::validation::validate_sha256;

/// Retrieves a URL into a local file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// HTTPS-only fetcher writing through the [`Runtime`].
pub struct HttpsFetcher<'a, R: Runtime> {
    runtime: &'a R,
    http_client: HttpClient,
    show_progress: bool,
}

impl<'a, R: Runtime> HttpsFetcher<'a, R> {
    pub fn new(runtime: &'a R, http_client: HttpClient) -> Self {
        Self {
            runtime,
            http_client,
            show_progress: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }
}

#[async_trait]
impl<R: Runtime> Fetcher for HttpsFetcher<'_, R> {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        if !url.starts_with("https://") {
            return Err(FetchError::InsecureUrl(url.to_string()).into());
        }
        download_file(
            self.runtime,
            url,
            dest,
            &self.http_client,
            self.show_progress,
        )
        .await
    }
}

/// Stream `url` into `dest`. A partially written file is removed on failure.
#[tracing::instrument(skip(runtime, http_client))]
pub async fn download_file<R: Runtime>(
    runtime: &R,
    url: &str,
    dest: &Path,
    http_client: &HttpClient,
    show_progress: bool,
) -> Result<u64> {
    info!("Downloading file from {}...", url);
    let label = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = http_client
        .download_file(
            url,
            || {
                runtime
                    .create_file(dest)
                    .with_context(|| format!("create file {}", dest.display()))
            },
            |done, total| {
                if show_progress {
                    print_progress(&label, done, total);
                }
            },
        )
        .await;

    match result {
        Ok(bytes) => {
            if show_progress {
                println!("\rDownloaded {} ({})", label, format_size(bytes));
            }
            info!("Download complete.");
            Ok(bytes)
        }
        Err(e) => {
            if show_progress {
                println!();
            }
            if runtime.exists(dest)
                && let Err(remove_err) = runtime.remove_file(dest)
            {
                warn!("Failed to remove partial download {}: {:#}", dest.display(), remove_err);
            }
            Err(e)
        }
    }
}

fn print_progress(label: &str, done: u64, total: Option<u64>) {
    match total {
        Some(total) if total > 0 => print!(
            "\rDownloading {}... {:.1}% ({}/{})",
            label,
            done as f64 / total as f64 * 100.0,
            format_size(done),
            format_size(total)
        ),
        _ => print!("\rDownloading {}... {}", label, format_size(done)),
    }
    let _ = std::io::stdout().flush();
}

/// File extension of the URL's last path segment, keeping multi-part
/// tar suffixes intact: `.tar.gz`, `.zip`, or empty.
pub fn url_extension(url: &str) -> String {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return String::new();
    };
    let base = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if let Some(idx) = base.find(".tar.") {
        return base[idx..].to_string();
    }
    Path::new(base)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Scratch file name for an artifact: `<name>-<version><ext>`.
pub fn artifact_file_name(name: &str, version: &str, url: &str) -> String {
    format!("{}-{}{}", name, version, url_extension(url))
}

/// Fetch `url` into `tmp_dir/<name>-<version><ext>` and verify it against `sha256`.
///
/// The digest is checked for well-formedness before any network traffic.
/// Whatever was downloaded is removed if verification fails. Errors carry
/// the step (`download <name>` or `verify <name>`).
#[tracing::instrument(skip(runtime, fetcher))]
pub async fn fetch_verified<R: Runtime, F: Fetcher + ?Sized>(
    runtime: &R,
    fetcher: &F,
    tmp_dir: &Path,
    name: &str,
    version: &str,
    url: &str,
    sha256: &str,
) -> Result<PathBuf> {
    validate_sha256(sha256)
        .map_err(VerifyError::from)
        .with_context(|| format!("verify {}", name))?;

    runtime
        .create_dir_all(tmp_dir)
        .with_context(|| format!("create {}", tmp_dir.display()))?;
    let dest = tmp_dir.join(artifact_file_name(name, version, url));

    fetcher
        .fetch(url, &dest)
        .await
        .with_context(|| format!("download {}", name))?;
    debug!("Saved to {}", dest.display());

    verify_sha256(runtime, &dest, sha256).with_context(|| format!("verify {}", name))?;
    Ok(dest)
}
