//! Clean command

use anyhow::Result;
use tracing::info;

use clasp::RepoLayout;

/// Drop cached origin archives. The next patched assembly refetches.
pub fn clean(layout: &RepoLayout) -> Result<()> {
    let cache = layout.cache_dir();
    if cache.exists() {
        std::fs::remove_dir_all(&cache)?;
        info!(path = %cache.display(), "removed download cache");
    }
    println!("cache is clean");
    Ok(())
}
