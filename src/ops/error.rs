//! Domain-specific errors for assembly operations

use crate::core::descriptor::DescriptorError;
use crate::core::manifest::ManifestError;
use crate::io::download::DownloadError;
use crate::io::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("Malformed manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Entry {category}/{name} not found in bundle or origin archive")]
    MissingEntry { category: String, name: String },

    #[error("Patch target {category}/{name} not found in origin archive")]
    MissingPatchTarget { category: String, name: String },

    #[error("Checksum mismatch for {name}: expected {expected}, got {actual}")]
    Integrity {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Patched output for {name} failed verification: expected {expected}, got {actual}")]
    PatchVerification {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Patch list present but bundle carries no origin descriptor")]
    MissingOrigin,

    #[error("Failed to apply delta for {name}: {reason}")]
    Delta { name: String, reason: String },

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
