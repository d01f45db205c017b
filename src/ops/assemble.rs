//! Assembly orchestration
//!
//! Models the run as explicit state transitions:
//! `AssemblyPlan` -> `ResolvedAssembly` -> `AssembledImage`
//!
//! This enforces at compile-time that manifests are parsed before the origin
//! archive is resolved, and that the origin is resolved before anything is
//! extracted or patched.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::debug;

use crate::RepoLayout;
use crate::core::manifest::{
    self, CATEGORIES, ManifestEntry, OriginDescriptor, PRIMARY_CATEGORY, PatchDirective,
};
use crate::io::store::{self, EntryStore};
use crate::ops::error::AssembleError;
use crate::ops::{extract, origin, patch};

/// One category's manifest as read from the bundle.
///
/// `entries: None` means the list resource is absent (the category does not
/// exist in this bundle), which is distinct from an empty-but-present list:
/// an absent category is omitted from the image unless a patch targets it,
/// while an empty one still yields an initialized, empty map.
#[derive(Debug)]
struct CategoryManifest {
    category: &'static str,
    entries: Option<Vec<ManifestEntry>>,
}

/// Parsed bundle lists; nothing has touched the network or the repo yet.
#[derive(Debug)]
pub struct AssemblyPlan {
    manifests: Vec<CategoryManifest>,
    patches: Vec<PatchDirective>,
    origin: Option<OriginDescriptor>,
    main_entry: Option<String>,
}

impl AssemblyPlan {
    /// Read and parse every list resource from the bundle.
    ///
    /// Fails fast with [`AssembleError::MissingOrigin`] when patch
    /// directives exist without an origin descriptor, before any extraction
    /// work begins.
    pub fn from_bundle(bundle: &mut dyn EntryStore) -> Result<Self, AssembleError> {
        let mut manifests = Vec::new();
        for category in CATEGORIES {
            let file = format!("{category}.list");
            let entries = match read_text(bundle, &file)? {
                Some(text) => Some(manifest::parse_entries(&file, &text)?),
                None => None,
            };
            manifests.push(CategoryManifest { category, entries });
        }

        let patches = match read_text(bundle, "patches.list")? {
            Some(text) => manifest::parse_patches("patches.list", &text)?,
            None => Vec::new(),
        };

        let origin = match read_text(bundle, "origin")? {
            Some(text) => Some(manifest::parse_origin("origin", &text)?),
            None => None,
        };

        let main_entry = read_text(bundle, "entrypoint")?
            .map(|text| text.trim().to_string())
            .filter(|name| !name.is_empty());

        if !patches.is_empty() && origin.is_none() {
            return Err(AssembleError::MissingOrigin);
        }

        Ok(Self {
            manifests,
            patches,
            origin,
            main_entry,
        })
    }

    /// Resolve the origin archive, but only if a patch actually needs it.
    pub async fn resolve(
        self,
        client: &Client,
        layout: &RepoLayout,
    ) -> Result<ResolvedAssembly, AssembleError> {
        let origin_path = if self.patches.is_empty() {
            debug!("no patch directives, origin archive not required");
            None
        } else {
            match &self.origin {
                Some(descriptor) => Some(origin::resolve(client, descriptor, layout).await?),
                None => return Err(AssembleError::MissingOrigin),
            }
        };

        Ok(ResolvedAssembly {
            manifests: self.manifests,
            patches: self.patches,
            main_entry: self.main_entry,
            origin_path,
        })
    }
}

/// A plan whose origin archive (when needed) is verified on disk.
#[derive(Debug)]
pub struct ResolvedAssembly {
    manifests: Vec<CategoryManifest>,
    patches: Vec<PatchDirective>,
    main_entry: Option<String>,
    origin_path: Option<PathBuf>,
}

impl ResolvedAssembly {
    /// Extract all manifest entries, then apply every patch. Blocking.
    ///
    /// The origin store is owned here and dropped on every exit path,
    /// success or failure, before the result leaves this function.
    pub fn run(
        self,
        bundle: &mut dyn EntryStore,
        layout: &RepoLayout,
    ) -> Result<AssembledImage, AssembleError> {
        let mut origin_store: Option<Box<dyn EntryStore>> = match &self.origin_path {
            Some(path) => Some(store::open(path)?),
            None => None,
        };

        let mut patched_names: HashMap<&str, HashSet<String>> = HashMap::new();
        for directive in &self.patches {
            patched_names
                .entry(directive.category.as_str())
                .or_default()
                .insert(directive.name.clone());
        }
        let no_patches = HashSet::new();

        let mut categories: Vec<CategoryImage> = Vec::new();
        for m in &self.manifests {
            let patched = patched_names.get(m.category).unwrap_or(&no_patches);
            let entries: &[ManifestEntry] = match &m.entries {
                Some(entries) => entries,
                // Patches may populate a category that has no manifest; it
                // still needs an initialized map. Without patches an absent
                // category is simply not part of the image.
                None if !patched.is_empty() => &[],
                None => {
                    debug!(category = m.category, "manifest absent, category skipped");
                    continue;
                }
            };

            let map = extract::extract_category(
                m.category,
                entries,
                patched,
                bundle,
                origin_store.as_deref_mut(),
                layout,
            )?;
            categories.push(CategoryImage {
                category: m.category.to_string(),
                entries: map,
            });
        }

        for directive in &self.patches {
            let origin = origin_store
                .as_deref_mut()
                .ok_or(AssembleError::MissingOrigin)?;
            let path = patch::apply_patch(directive, origin, bundle, layout)?;
            let image = categories
                .iter_mut()
                .find(|c| c.category == directive.category)
                .ok_or_else(|| {
                    AssembleError::Other(format!(
                        "patch targets unknown category {}",
                        directive.category
                    ))
                })?;
            // The directive is authoritative for its key: it replaces any
            // extraction result.
            image.entries.insert(directive.name.clone(), path);
        }

        drop(origin_store);

        let primary = primary_artifact(&self.manifests, &categories);
        Ok(AssembledImage {
            categories,
            origin_path: self.origin_path,
            main_entry: self.main_entry,
            primary,
        })
    }
}

/// One category's resolved entries, `name -> local path`.
#[derive(Debug, Clone)]
pub struct CategoryImage {
    pub category: String,
    pub entries: BTreeMap<String, PathBuf>,
}

/// The final verified file set, plus origin-derived metadata.
#[derive(Debug, Clone)]
pub struct AssembledImage {
    /// Category maps in classpath order: all `app` entries precede all
    /// `libraries` entries when the image is linearized.
    pub categories: Vec<CategoryImage>,
    /// Local path of the origin archive, when one was resolved.
    pub origin_path: Option<PathBuf>,
    /// Downstream entry point name, carried as plain data.
    pub main_entry: Option<String>,
    primary: Option<PathBuf>,
}

impl AssembledImage {
    pub fn category(&self, name: &str) -> Option<&CategoryImage> {
        self.categories.iter().find(|c| c.category == name)
    }

    /// All image paths, primary category first.
    pub fn linearize(&self) -> Vec<&Path> {
        self.categories
            .iter()
            .flat_map(|c| c.entries.values())
            .map(PathBuf::as_path)
            .collect()
    }

    /// The image's primary artifact (the first entry of the `app` category).
    pub fn primary_artifact(&self) -> Option<&Path> {
        self.primary.as_deref()
    }
}

/// The first manifest entry of the primary category, falling back to the
/// map's first entry when the category exists only through patches.
fn primary_artifact(
    manifests: &[CategoryManifest],
    categories: &[CategoryImage],
) -> Option<PathBuf> {
    let image = categories.iter().find(|c| c.category == PRIMARY_CATEGORY)?;
    let first_name = manifests
        .iter()
        .find(|m| m.category == PRIMARY_CATEGORY)
        .and_then(|m| m.entries.as_ref())
        .and_then(|entries| entries.first())
        .map(|e| e.name.as_str());

    match first_name {
        Some(name) => image
            .entries
            .get(name)
            .or_else(|| image.entries.values().next())
            .cloned(),
        None => image.entries.values().next().cloned(),
    }
}

/// Run the whole pipeline: parse, resolve, extract, patch.
///
/// Network access happens on the async caller's runtime; extraction and
/// patching run on the blocking pool.
pub async fn assemble(
    client: &Client,
    bundle_path: &Path,
    layout: &RepoLayout,
) -> Result<AssembledImage, AssembleError> {
    let mut bundle = store::open(bundle_path)?;
    let plan = AssemblyPlan::from_bundle(bundle.as_mut())?;
    let resolved = plan.resolve(client, layout).await?;

    let layout = layout.clone();
    tokio::task::spawn_blocking(move || {
        let mut bundle = bundle;
        resolved.run(bundle.as_mut(), &layout)
    })
    .await
    .map_err(|e| AssembleError::Other(format!("assembly task failed: {e}")))?
}

fn read_text(bundle: &mut dyn EntryStore, key: &str) -> Result<Option<String>, AssembleError> {
    match bundle.read(key)? {
        Some(bytes) => {
            let text = String::from_utf8(bytes).map_err(|_| {
                AssembleError::Manifest(manifest::ManifestError::Malformed {
                    file: key.to_string(),
                    line: 1,
                    reason: "invalid UTF-8".to_string(),
                })
            })?;
            Ok(Some(text))
        }
        None => Ok(None),
    }
}
