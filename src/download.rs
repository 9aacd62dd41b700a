//! Streams a build artifact from the CI service into the artifact store.

use futures_util::StreamExt;
use std::fmt::Display;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{RelayError, Result};
use crate::storage::ArtifactStore;
use crate::utils::{filename_from_url, megabytes};

/// A fully written artifact, ready for distribution
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Run that owns the artifact's storage scope
    pub run_id: String,
    pub source_url: String,
    pub filename: String,
    /// Declared `Content-Length`, when the server sent one
    pub expected_len: Option<u64>,
    pub transferred: u64,
}

#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    store: ArtifactStore,
}

impl Downloader {
    pub fn new(client: reqwest::Client, store: ArtifactStore) -> Self {
        Self { client, store }
    }

    /// Download `url` into the run's scope under its last path segment.
    ///
    /// Any file already stored under that name is removed first, so a second
    /// download of the same name replaces the first instead of appending to it.
    /// A failed transfer may leave a partial file behind; see [`Downloader::discard`].
    pub async fn download(&self, run_id: &str, url: &str) -> Result<Artifact> {
        let filename = filename_from_url(url)?;
        let store = self.store.scoped(run_id)?;
        info!("Downloading binary {} -> {}", url, filename);

        if store
            .remove(&filename)
            .await
            .map_err(|e| disk_failure(&filename, e))?
        {
            debug!("Removed stale artifact {}", filename);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::Transfer(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Transfer(format!(
                "GET {} returned HTTP {}",
                url, status
            )));
        }

        let expected_len = response.content_length();
        let mut file = store
            .create(&filename)
            .await
            .map_err(|e| disk_failure(&filename, e))?;
        let mut stream = response.bytes_stream();
        let mut transferred: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                RelayError::Transfer(format!(
                    "Stream from {} broke after {} bytes: {}",
                    url, transferred, e
                ))
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| disk_failure(&filename, e))?;
            transferred += chunk.len() as u64;
            log_progress(transferred, expected_len);
        }
        file.flush().await.map_err(|e| disk_failure(&filename, e))?;

        if let Some(expected) = expected_len {
            if transferred != expected {
                return Err(RelayError::Transfer(format!(
                    "Expected {} bytes from {}, received {}",
                    expected, url, transferred
                )));
            }
        }

        info!(
            "Downloaded {} ({:.2} mb)",
            filename,
            megabytes(transferred)
        );

        Ok(Artifact {
            run_id: run_id.to_string(),
            source_url: url.to_string(),
            filename,
            expected_len,
            transferred,
        })
    }

    /// Drop whatever a run left in its storage scope
    pub async fn discard(&self, run_id: &str) -> Result<()> {
        self.store.scoped(run_id)?.purge().await
    }
}

fn disk_failure(filename: &str, e: impl Display) -> RelayError {
    RelayError::Transfer(format!("Writing {} failed: {}", filename, e))
}

fn log_progress(transferred: u64, expected_len: Option<u64>) {
    match expected_len {
        Some(total) if total > 0 => debug!(
            "Downloading {:.2}%, Downloaded: {:.2} mb, Total: {:.2} mb",
            100.0 * transferred as f64 / total as f64,
            megabytes(transferred),
            megabytes(total)
        ),
        _ => debug!("Downloaded: {:.2} mb", megabytes(transferred)),
    }
}
