//! Diff command (bundle authoring)
//!
//! Writes a patch payload and prints the matching `patches.list` line.

use std::path::Path;

use anyhow::{Context, Result};

use clasp::io::delta;
use clasp::types::digest_bytes;

const COMPRESSION_LEVEL: i32 = 19;

pub fn diff(
    category: &str,
    name: &str,
    target: &Path,
    base: Option<&Path>,
    out: &Path,
) -> Result<()> {
    let base_bytes = match base {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
        }
        None => Vec::new(),
    };
    let target_bytes = std::fs::read(target)
        .with_context(|| format!("failed to read {}", target.display()))?;

    let payload = delta::generate_delta(&base_bytes, &target_bytes, COMPRESSION_LEVEL)?;
    std::fs::write(out, &payload)
        .with_context(|| format!("failed to write {}", out.display()))?;

    let base_field = match base {
        Some(_) => digest_bytes(&base_bytes).to_string(),
        None => "-".to_string(),
    };
    let patch_name = out
        .file_name()
        .context("output path has no file name")?
        .to_string_lossy();

    // Ready to paste into patches.list.
    println!(
        "{category}\t{name}\t{patch_name}\t{base_field}\t{}\t{}",
        digest_bytes(&payload),
        digest_bytes(&target_bytes)
    );
    Ok(())
}
