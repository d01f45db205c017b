//! Bundle list parsing
//!
//! The bundle describes the image with line-oriented, tab-delimited lists:
//! one manifest per category (`app.list`, `libraries.list`), a patch list
//! (`patches.list`), and a single-line origin descriptor (`origin`).

use thiserror::Error;

use crate::filename_from_url;
use crate::types::Sha256Digest;

/// Image categories in classpath order. The `app` entries must come first
/// when the image is linearized: they shadow classes shipped in `libraries`.
pub const CATEGORIES: [&str; 2] = ["app", "libraries"];

/// The category whose first entry is the primary artifact.
pub const PRIMARY_CATEGORY: &str = CATEGORIES[0];

const DELIM: char = '\t';

/// Field marking a patch directive as "create new" (no base entry).
const NO_BASE: &str = "-";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("{file}:{line}: {reason}")]
    Malformed {
        file: String,
        line: usize,
        reason: String,
    },
}

impl ManifestError {
    fn malformed(file: &str, line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            file: file.to_string(),
            line,
            reason: reason.into(),
        }
    }
}

/// One expected output file: `<sha256> \t <name> [\t <size>]`.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub name: String,
    pub hash: Sha256Digest,
    pub size: Option<u64>,
}

/// One binary patch:
/// `<category> \t <name> \t <patch-ref> \t <base-sha256|-> \t <patch-sha256> \t <output-sha256>`.
///
/// `base_hash` is `None` for "create new" directives, which materialize an
/// entry that has no base in the origin archive.
#[derive(Debug, Clone)]
pub struct PatchDirective {
    pub category: String,
    pub name: String,
    pub patch: String,
    pub base_hash: Option<Sha256Digest>,
    pub patch_hash: Sha256Digest,
    pub output_hash: Sha256Digest,
}

/// The base archive patches are derived from: `<url> \t <sha256>`.
#[derive(Debug, Clone)]
pub struct OriginDescriptor {
    pub url: String,
    pub hash: Sha256Digest,
}

impl OriginDescriptor {
    /// Cache file name, derived from the last path segment of the URL.
    pub fn file_name(&self) -> &str {
        filename_from_url(&self.url)
    }
}

/// Parse a category manifest. Blank lines are ignored; order is preserved.
pub fn parse_entries(file: &str, text: &str) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut entries: Vec<ManifestEntry> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lineno = idx + 1;

        let fields: Vec<&str> = line.split(DELIM).collect();
        if fields.len() < 2 || fields.len() > 3 {
            return Err(ManifestError::malformed(
                file,
                lineno,
                format!("expected 2 or 3 fields, got {}", fields.len()),
            ));
        }

        let hash = Sha256Digest::new(fields[0])
            .map_err(|e| ManifestError::malformed(file, lineno, format!("invalid hash: {e}")))?;
        let name = validate_name(fields[1])
            .map_err(|e| ManifestError::malformed(file, lineno, e))?;
        let size = match fields.get(2) {
            Some(s) => Some(s.parse::<u64>().map_err(|_| {
                ManifestError::malformed(file, lineno, format!("invalid size '{s}'"))
            })?),
            None => None,
        };

        if entries.iter().any(|e| e.name == name) {
            return Err(ManifestError::malformed(
                file,
                lineno,
                format!("duplicate entry '{name}'"),
            ));
        }

        entries.push(ManifestEntry { name, hash, size });
    }

    Ok(entries)
}

/// Parse the patch list. At most one directive per `(category, name)` pair.
pub fn parse_patches(file: &str, text: &str) -> Result<Vec<PatchDirective>, ManifestError> {
    let mut patches: Vec<PatchDirective> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lineno = idx + 1;

        let fields: Vec<&str> = line.split(DELIM).collect();
        if fields.len() != 6 {
            return Err(ManifestError::malformed(
                file,
                lineno,
                format!("expected 6 fields, got {}", fields.len()),
            ));
        }

        let category = fields[0];
        if !CATEGORIES.contains(&category) {
            return Err(ManifestError::malformed(
                file,
                lineno,
                format!("unknown category '{category}'"),
            ));
        }

        let name = validate_name(fields[1])
            .map_err(|e| ManifestError::malformed(file, lineno, e))?;
        let patch = validate_name(fields[2])
            .map_err(|e| ManifestError::malformed(file, lineno, e))?;

        let base_hash = if fields[3] == NO_BASE {
            None
        } else {
            Some(Sha256Digest::new(fields[3]).map_err(|e| {
                ManifestError::malformed(file, lineno, format!("invalid base hash: {e}"))
            })?)
        };
        let patch_hash = Sha256Digest::new(fields[4]).map_err(|e| {
            ManifestError::malformed(file, lineno, format!("invalid patch hash: {e}"))
        })?;
        let output_hash = Sha256Digest::new(fields[5]).map_err(|e| {
            ManifestError::malformed(file, lineno, format!("invalid output hash: {e}"))
        })?;

        if patches
            .iter()
            .any(|p| p.category == category && p.name == name)
        {
            return Err(ManifestError::malformed(
                file,
                lineno,
                format!("duplicate patch directive for {category}/{name}"),
            ));
        }

        patches.push(PatchDirective {
            category: category.to_string(),
            name,
            patch,
            base_hash,
            patch_hash,
            output_hash,
        });
    }

    Ok(patches)
}

/// Parse the origin descriptor: exactly one non-blank `<url> \t <sha256>` line.
pub fn parse_origin(file: &str, text: &str) -> Result<OriginDescriptor, ManifestError> {
    let mut origin: Option<OriginDescriptor> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lineno = idx + 1;

        if origin.is_some() {
            return Err(ManifestError::malformed(file, lineno, "trailing content"));
        }

        let fields: Vec<&str> = line.split(DELIM).collect();
        if fields.len() != 2 {
            return Err(ManifestError::malformed(
                file,
                lineno,
                format!("expected 2 fields, got {}", fields.len()),
            ));
        }

        let url = fields[0].to_string();
        if filename_from_url(&url).is_empty() {
            return Err(ManifestError::malformed(
                file,
                lineno,
                format!("cannot derive a file name from '{url}'"),
            ));
        }
        let hash = Sha256Digest::new(fields[1])
            .map_err(|e| ManifestError::malformed(file, lineno, format!("invalid hash: {e}")))?;

        origin = Some(OriginDescriptor { url, hash });
    }

    origin.ok_or_else(|| ManifestError::malformed(file, 1, "empty origin descriptor"))
}

/// Entry names become paths under the repo and keys into byte stores, so
/// they must be clean relative paths. Subdirectories are allowed.
fn validate_name(name: &str) -> Result<String, String> {
    if name.is_empty() {
        return Err("empty entry name".to_string());
    }
    if name.starts_with('/') {
        return Err(format!("absolute entry name '{name}'"));
    }
    if name.contains('\\') {
        return Err(format!("backslash in entry name '{name}'"));
    }
    if name.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(format!("invalid entry name '{name}'"));
    }
    Ok(name.to_string())
}
