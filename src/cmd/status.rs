//! Status command

use anyhow::Result;

use clasp::{InstallDescriptor, RepoLayout};

/// Report whether the recorded install can be reused.
pub fn status(layout: &RepoLayout) -> Result<()> {
    let path = layout.descriptor_path();
    match InstallDescriptor::load(&path) {
        Ok(descriptor) if descriptor.is_reusable() => {
            println!("install intact ({} files)", descriptor.files.len());
            if let Some(main) = &descriptor.main_entry {
                println!("entry point: {main}");
            }
            println!("primary artifact: {}", descriptor.output_artifact.display());
        }
        Ok(descriptor) => {
            println!("reassembly required");
            for missing in descriptor.missing_files() {
                println!("  missing: {}", missing.display());
            }
        }
        Err(_) => {
            println!("no install recorded at {}", path.display());
        }
    }
    Ok(())
}
