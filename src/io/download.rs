//! Streamed download with SHA256 verification
//!
//! Bytes are hashed as they arrive and land in a `.part` file next to the
//! destination; only a fully verified download is renamed into place, so a
//! later run can never mistake an interrupted or corrupt fetch for a valid
//! cache hit.

use std::path::Path;

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::USER_AGENT;
use crate::types::Sha256Digest;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

/// Download `url` to `dest` with streaming SHA256 verification.
pub async fn download_and_verify(
    client: &Client,
    url: &str,
    dest: &Path,
    expected_hash: &Sha256Digest,
) -> Result<(), DownloadError> {
    let part = partial_path(dest);

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?
        .error_for_status()?;

    let mut file = File::create(&part).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();

    // Chunk-at-a-time keeps the loop interruptible and memory flat.
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                tokio::fs::remove_file(&part).await.ok();
                return Err(DownloadError::Http(e));
            }
        };
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
    }

    file.flush().await?;
    drop(file);

    let actual_hash = hex::encode(hasher.finalize());
    if actual_hash != expected_hash.as_str() {
        tokio::fs::remove_file(&part).await.ok();
        return Err(DownloadError::HashMismatch {
            expected: expected_hash.to_string(),
            actual: actual_hash,
        });
    }

    tokio::fs::rename(&part, dest).await?;
    Ok(())
}

fn partial_path(dest: &Path) -> std::path::PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
