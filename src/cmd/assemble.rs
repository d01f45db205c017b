//! Assemble command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

use clasp::{InstallDescriptor, RepoLayout};

/// Run the full assembly and print the linearized file set on stdout.
///
/// If the previous install's descriptor still validates, assembly is skipped
/// entirely and the recorded file set is reprinted; a missing or stale
/// descriptor is a normal signal to rebuild, never an error.
pub async fn assemble(bundle: &Path, layout: &RepoLayout, force: bool) -> Result<()> {
    if !force {
        if let Ok(descriptor) = InstallDescriptor::load(&layout.descriptor_path()) {
            if descriptor.is_reusable() {
                info!("previous install is intact, skipping assembly (use --force to rebuild)");
                for path in &descriptor.files {
                    println!("{}", path.display());
                }
                return Ok(());
            }
            info!("previous install is incomplete, reassembling");
        }
    }

    let client = Client::builder().tcp_nodelay(true).build()?;
    let image = clasp::assemble(&client, bundle, layout).await?;

    let files: Vec<PathBuf> = image
        .linearize()
        .into_iter()
        .map(Path::to_path_buf)
        .collect();
    let primary = image
        .primary_artifact()
        .context("assembled image has no primary artifact")?
        .to_path_buf();

    std::fs::create_dir_all(layout.root())?;
    let descriptor = InstallDescriptor::new(primary, image.main_entry.clone(), files.clone());
    descriptor.save(&layout.descriptor_path())?;

    info!(files = files.len(), "assembly complete");
    for path in &files {
        println!("{}", path.display());
    }
    Ok(())
}
