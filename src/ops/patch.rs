//! Binary patch application
//!
//! Derives output entries from origin-archive bases plus bundled delta
//! payloads. Base, payload, and output are all hash-verified: a stale or
//! mismatched origin archive must fail loudly, never produce a broken entry.

use std::path::PathBuf;

use tracing::debug;

use crate::RepoLayout;
use crate::core::manifest::PatchDirective;
use crate::io::delta;
use crate::io::store::EntryStore;
use crate::ops::error::AssembleError;
use crate::ops::extract::write_atomic;
use crate::types::{digest_bytes, digest_file};

/// Key prefix for patch payloads in the bundled namespace.
const PATCHES_PREFIX: &str = "patches";

/// Apply one patch directive, writing the verified output into its
/// category's directory and returning the output path.
pub fn apply_patch(
    directive: &PatchDirective,
    origin: &mut (dyn EntryStore + '_),
    bundle: &mut dyn EntryStore,
    layout: &RepoLayout,
) -> Result<PathBuf, AssembleError> {
    let dest = layout.entry_path(&directive.category, &directive.name);

    // An output that already verifies is authoritative; patching again
    // would reproduce it bit for bit anyway.
    if dest.is_file() && digest_file(&dest)? == directive.output_hash {
        debug!(
            category = %directive.category,
            name = %directive.name,
            "existing patched output verified, skipping"
        );
        return Ok(dest);
    }

    let base = read_base(directive, origin)?;

    let patch_key = format!("{PATCHES_PREFIX}/{}", directive.patch);
    let payload = bundle
        .read(&patch_key)?
        .ok_or_else(|| AssembleError::MissingEntry {
            category: PATCHES_PREFIX.to_string(),
            name: directive.patch.clone(),
        })?;
    let payload_digest = digest_bytes(&payload);
    if payload_digest != directive.patch_hash {
        return Err(AssembleError::Integrity {
            name: directive.patch.clone(),
            expected: directive.patch_hash.to_string(),
            actual: payload_digest.to_string(),
        });
    }

    let output = delta::apply_delta(&base, &payload).map_err(|e| AssembleError::Delta {
        name: directive.name.clone(),
        reason: e.to_string(),
    })?;

    let output_digest = digest_bytes(&output);
    if output_digest != directive.output_hash {
        return Err(AssembleError::PatchVerification {
            name: directive.name.clone(),
            expected: directive.output_hash.to_string(),
            actual: output_digest.to_string(),
        });
    }

    write_atomic(&dest, &output)?;
    debug!(category = %directive.category, name = %directive.name, "patched");
    Ok(dest)
}

/// Fetch and verify the patch base, before any delta work happens.
///
/// Create-new directives (`base_hash: None`) have no base in the origin
/// archive and patch against empty bytes.
fn read_base(
    directive: &PatchDirective,
    origin: &mut (dyn EntryStore + '_),
) -> Result<Vec<u8>, AssembleError> {
    let Some(expected) = &directive.base_hash else {
        return Ok(Vec::new());
    };

    let key = format!("{}/{}", directive.category, directive.name);
    let base = origin
        .read(&key)?
        .ok_or_else(|| AssembleError::MissingPatchTarget {
            category: directive.category.clone(),
            name: directive.name.clone(),
        })?;

    let actual = digest_bytes(&base);
    if actual != *expected {
        return Err(AssembleError::Integrity {
            name: directive.name.clone(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::DirStore;
    use crate::types::Sha256Digest;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const BASE: &[u8] = b"original entry bytes, shared structure";
    const OUTPUT: &[u8] = b"original entry bytes, shared structure, patched tail";

    fn store_with(root: &Path, files: &[(&str, &[u8])]) -> DirStore {
        for (key, content) in files {
            let path = root.join(key);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        DirStore::new(root)
    }

    fn directive(payload: &[u8], base_hash: Option<Sha256Digest>) -> PatchDirective {
        PatchDirective {
            category: "libraries".to_string(),
            name: "a.jar".to_string(),
            patch: "a.jar.patch".to_string(),
            base_hash,
            patch_hash: digest_bytes(payload),
            output_hash: digest_bytes(OUTPUT),
        }
    }

    fn fixture(dir: &Path, base: &[u8]) -> (DirStore, DirStore, PatchDirective) {
        let payload = delta::generate_delta(base, OUTPUT, 3).unwrap();
        let bundle = store_with(&dir.join("bundle"), &[("patches/a.jar.patch", &payload)]);
        let origin = store_with(&dir.join("origin"), &[("libraries/a.jar", base)]);
        let d = directive(&payload, Some(digest_bytes(base)));
        (bundle, origin, d)
    }

    #[test]
    fn applies_and_verifies() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path().join("repo"));
        let (mut bundle, mut origin, d) = fixture(dir.path(), BASE);

        let path = apply_patch(&d, &mut origin, &mut bundle, &layout).unwrap();
        assert_eq!(fs::read(&path).unwrap(), OUTPUT);
        assert_eq!(path, layout.entry_path("libraries", "a.jar"));
    }

    #[test]
    fn corrupted_base_fails_before_patching() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path().join("repo"));
        let (mut bundle, _, d) = fixture(dir.path(), BASE);
        let mut origin = store_with(
            &dir.path().join("origin2"),
            &[("libraries/a.jar", b"corrupted base")],
        );

        let err = apply_patch(&d, &mut origin, &mut bundle, &layout).unwrap_err();
        assert!(matches!(err, AssembleError::Integrity { ref name, .. } if name == "a.jar"));
        assert!(!layout.entry_path("libraries", "a.jar").exists());
    }

    #[test]
    fn missing_base_is_fatal() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path().join("repo"));
        let (mut bundle, _, d) = fixture(dir.path(), BASE);
        let mut origin = store_with(&dir.path().join("empty-origin"), &[]);

        let err = apply_patch(&d, &mut origin, &mut bundle, &layout).unwrap_err();
        assert!(matches!(err, AssembleError::MissingPatchTarget { .. }));
    }

    #[test]
    fn missing_payload_is_fatal() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path().join("repo"));
        let (_, mut origin, d) = fixture(dir.path(), BASE);
        let mut bundle = store_with(&dir.path().join("empty-bundle"), &[]);

        let err = apply_patch(&d, &mut origin, &mut bundle, &layout).unwrap_err();
        assert!(
            matches!(err, AssembleError::MissingEntry { ref category, .. } if category == "patches")
        );
    }

    #[test]
    fn tampered_payload_is_fatal() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path().join("repo"));
        let (_, mut origin, d) = fixture(dir.path(), BASE);
        let mut bundle = store_with(
            &dir.path().join("bundle2"),
            &[("patches/a.jar.patch", b"not the payload")],
        );

        let err = apply_patch(&d, &mut origin, &mut bundle, &layout).unwrap_err();
        assert!(
            matches!(err, AssembleError::Integrity { ref name, .. } if name == "a.jar.patch")
        );
    }

    #[test]
    fn wrong_output_hash_is_a_verification_failure() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path().join("repo"));
        let (mut bundle, mut origin, mut d) = fixture(dir.path(), BASE);
        d.output_hash = digest_bytes(b"some other output entirely");

        let err = apply_patch(&d, &mut origin, &mut bundle, &layout).unwrap_err();
        assert!(matches!(err, AssembleError::PatchVerification { .. }));
        assert!(!layout.entry_path("libraries", "a.jar").exists());
    }

    #[test]
    fn create_new_needs_no_base() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path().join("repo"));
        let payload = delta::generate_delta(&[], OUTPUT, 3).unwrap();
        let mut bundle = store_with(
            &dir.path().join("bundle"),
            &[("patches/a.jar.patch", &payload)],
        );
        let mut origin = store_with(&dir.path().join("origin"), &[]);
        let d = directive(&payload, None);

        let path = apply_patch(&d, &mut origin, &mut bundle, &layout).unwrap();
        assert_eq!(fs::read(&path).unwrap(), OUTPUT);
    }

    #[test]
    fn verified_output_short_circuits() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path().join("repo"));
        let (mut bundle, _, d) = fixture(dir.path(), BASE);

        // Pre-place the correct output; even a useless origin must not be read.
        let dest = layout.entry_path("libraries", "a.jar");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, OUTPUT).unwrap();
        let mut origin = store_with(&dir.path().join("empty-origin"), &[]);

        let path = apply_patch(&d, &mut origin, &mut bundle, &layout).unwrap();
        assert_eq!(path, dest);
    }

    #[test]
    fn repeated_application_is_byte_identical() {
        let dir = tempdir().unwrap();
        let layout = RepoLayout::new(dir.path().join("repo"));
        let (mut bundle, mut origin, d) = fixture(dir.path(), BASE);

        let path = apply_patch(&d, &mut origin, &mut bundle, &layout).unwrap();
        let first = fs::read(&path).unwrap();
        fs::remove_file(&path).unwrap();
        apply_patch(&d, &mut origin, &mut bundle, &layout).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }
}
