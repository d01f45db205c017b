//! clasp - bootstrap classpath assembler
//!
//! Prepares a runnable application image from a declarative bundle: resolves
//! which files must exist locally, fetches and caches the origin archive when
//! patches need it, extracts or patches individual entries into two ordered
//! categories, and decides whether a previous install can be reused as-is.
//!
//! # Architecture
//!
//! - **Typestate Pattern**: assembly runs as `AssemblyPlan` →
//!   `ResolvedAssembly` → `AssembledImage`, so an origin archive cannot be
//!   opened before manifests are parsed, nor patches applied before the
//!   origin is resolved.
//! - **Keyed byte stores**: bundles and origin archives are read through the
//!   `EntryStore` trait, so the engine never depends on a container format.
//! - **Newtypes**: `Sha256Digest` keeps unvalidated hex out of the engine.
//!
//! # Repo layout
//!
//! ```text
//! .clasp/
//! ├── cache/         # Downloaded origin archives (verified by hash)
//! ├── app/           # Primary category output
//! ├── libraries/     # Secondary category output
//! └── install.toml   # Install descriptor for skip-reassembly
//! ```

pub mod core;
pub mod io;
pub mod ops;
pub mod types;

// Re-exports for convenience
pub use crate::core::descriptor::InstallDescriptor;
pub use crate::core::manifest::{CATEGORIES, PRIMARY_CATEGORY};
pub use crate::ops::assemble::{AssembledImage, assemble};
pub use crate::ops::error::AssembleError;

use std::path::{Path, PathBuf};

/// On-disk layout of one assembly repo.
///
/// Threaded explicitly through the engine; there is no ambient global repo
/// directory.
#[derive(Debug, Clone)]
pub struct RepoLayout {
    root: PathBuf,
}

impl RepoLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Downloaded origin archives: `<root>/cache`
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Output directory for one category: `<root>/<category>`
    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.root.join(category)
    }

    /// Final path of one image entry: `<root>/<category>/<name>`
    pub fn entry_path(&self, category: &str, name: &str) -> PathBuf {
        self.category_dir(category).join(name)
    }

    /// Install descriptor: `<root>/install.toml`
    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join("install.toml")
    }
}

/// Extract the filename from a URL.
///
/// # Example
///
/// ```
/// use clasp::filename_from_url;
///
/// assert_eq!(filename_from_url("https://example.com/path/to/base.jar"), "base.jar");
/// assert_eq!(filename_from_url(""), "");
/// ```
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}

/// User Agent string
pub const USER_AGENT: &str = concat!("clasp/", env!("CARGO_PKG_VERSION"));
