//! Hash command (bundle authoring)

use std::path::PathBuf;

use anyhow::{Context, Result};

use clasp::types::digest_file;

/// Print `<sha256>  <path>` for each file, ready for a manifest line.
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let digest = digest_file(path)
            .with_context(|| format!("failed to hash {}", path.display()))?;
        println!("{digest}  {}", path.display());
    }
    Ok(())
}
