//! Install descriptor for skip-reassembly on subsequent runs
//!
//! The descriptor (`install.toml`) records the files a successful assembly
//! produced. The next run reuses the install only if every one of them still
//! exists; a single missing file invalidates the whole record, because a
//! half-complete image could mix stale and fresh entries.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Persisted record of one successful assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallDescriptor {
    /// Descriptor format version
    pub version: u32,
    /// When the install was produced
    pub generated_at: String,
    /// The primary artifact of the image
    pub output_artifact: PathBuf,
    /// Downstream entry point name, carried as plain data for the launcher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_entry: Option<String>,
    /// Every file the install depends on, in classpath order
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl InstallDescriptor {
    pub fn new(
        output_artifact: PathBuf,
        main_entry: Option<String>,
        files: Vec<PathBuf>,
    ) -> Self {
        Self {
            version: 1,
            generated_at: now_iso8601(),
            output_artifact,
            main_entry,
            files,
        }
    }

    /// Load a descriptor from path
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save the descriptor to path
    pub fn save(&self, path: &Path) -> Result<(), DescriptorError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Whether the recorded install can be reused unmodified.
    ///
    /// Existence-only: checksums were verified once at assembly time, and a
    /// full re-verification would cost as much as a reinstall. Returns false
    /// as soon as any referenced path is no longer a regular file.
    pub fn is_reusable(&self) -> bool {
        if !is_regular_file(&self.output_artifact) {
            return false;
        }
        self.files.iter().all(|p| is_regular_file(p))
    }

    /// Paths referenced by the descriptor that are missing, for reporting.
    pub fn missing_files(&self) -> Vec<&Path> {
        std::iter::once(self.output_artifact.as_path())
            .chain(self.files.iter().map(PathBuf::as_path))
            .filter(|p| !is_regular_file(p))
            .collect()
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Get current time in ISO 8601 format
fn now_iso8601() -> String {
    use chrono::prelude::*;
    let utc: DateTime<Utc> = Utc::now();
    utc.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
