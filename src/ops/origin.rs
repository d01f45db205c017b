//! Origin archive resolution
//!
//! Guarantees the base archive named by the bundle's origin descriptor is
//! present in the repo cache, downloading it at most once.

use std::path::PathBuf;

use reqwest::Client;
use tracing::{debug, info};

use crate::RepoLayout;
use crate::core::manifest::OriginDescriptor;
use crate::io::download;
use crate::ops::error::AssembleError;
use crate::types::digest_file;

/// Return the local path of the origin archive, fetching it if the cache
/// holds no verified copy.
///
/// The dominant path on repeated runs is the cache hit: an existing file
/// whose checksum matches is returned with no network access. A cached file
/// that no longer verifies is replaced by a fresh download. Nothing is
/// retried here; retry policy belongs to the operator.
pub async fn resolve(
    client: &Client,
    origin: &OriginDescriptor,
    layout: &RepoLayout,
) -> Result<PathBuf, AssembleError> {
    let dest = layout.cache_dir().join(origin.file_name());

    if dest.is_file() {
        if digest_file(&dest)? == origin.hash {
            debug!(path = %dest.display(), "origin archive cache hit");
            return Ok(dest);
        }
        info!(path = %dest.display(), "cached origin archive failed verification, refetching");
    }

    std::fs::create_dir_all(layout.cache_dir())?;
    info!(url = %origin.url, "fetching origin archive");
    download::download_and_verify(client, &origin.url, &dest, &origin.hash).await?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::digest_bytes;
    use tempfile::tempdir;

    #[tokio::test]
    async fn cache_hit_never_touches_the_network() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path());
        std::fs::create_dir_all(layout.cache_dir()).unwrap();
        std::fs::write(layout.cache_dir().join("base.jar"), b"cached").unwrap();

        let origin = OriginDescriptor {
            // Unroutable on purpose: a cache hit must not dial out.
            url: "http://127.0.0.1:1/base.jar".to_string(),
            hash: digest_bytes(b"cached"),
        };

        let path = resolve(&Client::new(), &origin, &layout).await.unwrap();
        assert_eq!(path, layout.cache_dir().join("base.jar"));
    }

    #[tokio::test]
    async fn stale_cache_is_refetched() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/base.jar")
            .with_body(b"fresh")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path());
        std::fs::create_dir_all(layout.cache_dir()).unwrap();
        std::fs::write(layout.cache_dir().join("base.jar"), b"stale").unwrap();

        let origin = OriginDescriptor {
            url: format!("{}/base.jar", server.url()),
            hash: digest_bytes(b"fresh"),
        };

        let path = resolve(&Client::new(), &origin, &layout).await.unwrap();
        mock.assert_async().await;
        assert_eq!(std::fs::read(&path).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn download_failure_propagates() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path());

        let origin = OriginDescriptor {
            url: "http://127.0.0.1:1/base.jar".to_string(),
            hash: digest_bytes(b"unreachable"),
        };

        let err = resolve(&Client::new(), &origin, &layout).await.unwrap_err();
        assert!(matches!(err, AssembleError::Download(_)));
    }
}
