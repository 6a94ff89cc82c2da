//! HTTP client streaming response bodies into a caller-supplied writer.

use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use std::io::Write;
use thiserror::Error;

pub const USER_AGENT: &str = "grew-cli";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("refusing to download over insecure HTTP: {0}")]
    InsecureUrl(String),
    #[error("download {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client identifying itself as [`USER_AGENT`].
    pub fn with_default_agent() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("build HTTP client")?;
        Ok(Self::new(client))
    }

    /// Downloads `url` into the writer produced by `create_writer`.
    ///
    /// The writer is only created once the server has answered with a success
    /// status. `on_progress` receives the running byte count and the total
    /// length when the server announced one.
    #[tracing::instrument(skip(self, create_writer, on_progress))]
    pub async fn download_file<W, F, P>(
        &self,
        url: &str,
        create_writer: F,
        mut on_progress: P,
    ) -> Result<u64>
    where
        W: Write,
        F: FnOnce() -> Result<W>,
        P: FnMut(u64, Option<u64>),
    {
        debug!("GET {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("download {}", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let total = response.content_length();
        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("read body of {}", url))?
        {
            writer
                .write_all(&chunk)
                .with_context(|| format!("write body of {}", url))?;
            downloaded_bytes += chunk.len() as u64;
            on_progress(downloaded_bytes, total);
        }
        writer.flush().with_context(|| format!("flush body of {}", url))?;

        debug!("Received {} bytes from {}", downloaded_bytes, url);
        Ok(downloaded_bytes)
    }
}
