//! Entry extraction
//!
//! Materializes manifest entries into a category's output directory from the
//! bundled namespace, falling back to the origin archive. Every write is
//! verified against the manifest hash and committed atomically per file.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::RepoLayout;
use crate::core::manifest::ManifestEntry;
use crate::io::store::EntryStore;
use crate::ops::error::AssembleError;
use crate::types::{Sha256Digest, digest_bytes, digest_file};

/// Extract every manifest entry of one category not covered by a patch.
///
/// Entries named in `patched` are skipped outright: the patch engine is
/// authoritative for them and extracting first would be wasted work. Lookup
/// order is bundle first, then the origin archive at the same key.
pub fn extract_category(
    category: &str,
    entries: &[ManifestEntry],
    patched: &HashSet<String>,
    bundle: &mut dyn EntryStore,
    mut origin: Option<&mut (dyn EntryStore + '_)>,
    layout: &RepoLayout,
) -> Result<BTreeMap<String, PathBuf>, AssembleError> {
    let mut resolved = BTreeMap::new();

    for entry in entries {
        if patched.contains(&entry.name) {
            debug!(category, name = %entry.name, "skipping extraction, patch covers entry");
            continue;
        }

        let dest = layout.entry_path(category, &entry.name);

        // Re-extracting an already-correct file is a no-op.
        if existing_matches(&dest, &entry.hash, entry.size)? {
            debug!(category, name = %entry.name, "existing output verified, skipping copy");
            resolved.insert(entry.name.clone(), dest);
            continue;
        }

        let key = format!("{category}/{}", entry.name);
        let bytes = match bundle.read(&key)? {
            Some(bytes) => bytes,
            None => {
                let from_origin = match origin {
                    Some(ref mut store) => store.read(&key)?,
                    None => None,
                };
                from_origin.ok_or_else(|| AssembleError::MissingEntry {
                    category: category.to_string(),
                    name: entry.name.clone(),
                })?
            }
        };

        let actual = digest_bytes(&bytes);
        if actual != entry.hash {
            return Err(AssembleError::Integrity {
                name: entry.name.clone(),
                expected: entry.hash.to_string(),
                actual: actual.to_string(),
            });
        }

        write_atomic(&dest, &bytes)?;
        debug!(category, name = %entry.name, "extracted");
        resolved.insert(entry.name.clone(), dest);
    }

    Ok(resolved)
}

/// True if `dest` already holds the expected content.
///
/// The size hint rules out obviously stale files without hashing them.
fn existing_matches(
    dest: &Path,
    hash: &Sha256Digest,
    size: Option<u64>,
) -> Result<bool, AssembleError> {
    let meta = match fs::metadata(dest) {
        Ok(meta) if meta.is_file() => meta,
        _ => return Ok(false),
    };
    if let Some(size) = size {
        if meta.len() != size {
            return Ok(false);
        }
    }
    Ok(digest_file(dest)? == *hash)
}

/// Write `bytes` to `dest` via a sibling temp file and rename, creating
/// parent directories as needed. Readers never observe a partial file.
pub(crate) fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| io::Error::other(format!("no parent directory for {}", dest.display())))?;
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
