//! Migration planning: local tree → ordered list of `MigrationUnit`s.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;
use walkdir::WalkDir;

use super::sanitize::{destination_key, sanitize_key_component, MediaCategory};
use crate::config::{ALLOWED_EXTENSIONS, BRAND_MEDIA_SUBDIRS};
use crate::error_handling::PlanError;

/// One local file to move into storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationUnit {
    /// Brand folder name as found on disk
    pub subject: String,
    /// Brand media or product media
    pub category: MediaCategory,
    /// Product folder name, for product media
    pub product: Option<String>,
    /// File to upload
    pub local_path: PathBuf,
    /// Sanitized storage key
    pub destination_key: String,
    /// Local file size
    pub size_bytes: u64,
    /// Content type sent with the upload
    pub mime_type: String,
}

impl MigrationUnit {
    /// File name of the local file.
    pub fn file_name(&self) -> String {
        self.local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The planned units plus what planning had to leave out.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    /// Units in walk order (brand, then path, sorted by name)
    pub units: Vec<MigrationUnit>,
    /// Files excluded because a key component sanitized to nothing
    pub rejected: Vec<PathBuf>,
    /// Requested subjects with no matching brand folder
    pub unresolved_subjects: Vec<String>,
}

/// Narrows what `plan_migration_with` looks at.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Brand names to include (empty = every brand folder)
    pub subjects: Vec<String>,
    /// Cap on the number of brand folders
    pub max_subjects: Option<usize>,
    /// Keep only units whose destination key is in this set
    pub only_keys: Option<HashSet<String>>,
}

/// Plans every brand folder under `root`.
///
/// # Errors
///
/// See `plan_migration_with`.
pub fn plan_migration(root: &Path) -> Result<MigrationPlan, PlanError> {
    plan_migration_with(root, &PlanOptions::default())
}

/// Walks `root` and builds the migration plan.
///
/// Layout:
/// - `root/<brand>/<file>` and `root/<brand>/images|videos/**/<file>` are
///   brand media
/// - `root/<brand>/<product>/**/<file>` is product media
/// - files directly under `root` are ignored
///
/// Only files with an allowed extension are planned. The walk is sorted by
/// file name, so the same tree always yields the same plan.
///
/// # Errors
///
/// - `PlanError::SourceDirMissing` if `root` is not a directory
/// - `PlanError::Walk` if a directory cannot be read
/// - `PlanError::KeyCollision` if two files map to the same destination key
pub fn plan_migration_with(root: &Path, options: &PlanOptions) -> Result<MigrationPlan, PlanError> {
    if !root.is_dir() {
        return Err(PlanError::SourceDirMissing(root.to_path_buf()));
    }

    let folders = brand_folders(root)?;
    let mut plan = MigrationPlan::default();
    let mut brands: Vec<String> = if options.subjects.is_empty() {
        folders.clone()
    } else {
        let mut resolved = Vec::new();
        for name in &options.subjects {
            match resolve_folder_name(name, &folders) {
                Some(folder) if !resolved.contains(&folder) => resolved.push(folder),
                Some(_) => {}
                None => {
                    warn!("No brand folder found for '{}' under {}", name, root.display());
                    plan.unresolved_subjects.push(name.clone());
                }
            }
        }
        resolved
    };
    if let Some(max) = options.max_subjects {
        brands.truncate(max);
    }

    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    for brand in &brands {
        plan_brand(root, brand, &mut plan, &mut claimed)?;
    }

    if let Some(keys) = &options.only_keys {
        let before = plan.units.len();
        plan.units.retain(|u| keys.contains(&u.destination_key));
        debug!(
            "Failure list narrowed the plan from {} to {} units",
            before,
            plan.units.len()
        );
    }
    Ok(plan)
}

fn plan_brand(
    root: &Path,
    brand: &str,
    plan: &mut MigrationPlan,
    claimed: &mut HashMap<String, PathBuf>,
) -> Result<(), PlanError> {
    let brand_dir = root.join(brand);
    for entry in WalkDir::new(&brand_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.file_name()))
    {
        let entry = entry?;
        if !entry.file_type().is_file() || !has_allowed_extension(entry.path()) {
            continue;
        }
        let path = entry.path();
        let Some(components) = relative_components(&brand_dir, path) else {
            warn!("Skipping file with a non UTF-8 name: {}", path.display());
            plan.rejected.push(path.to_path_buf());
            continue;
        };

        let (category, product) = classify(&components);
        let file_name = components[components.len() - 1].as_str();
        let Some(key) = destination_key(brand, category, product.as_deref(), file_name) else {
            warn!(
                "Skipping {}: a key component sanitizes to nothing",
                path.display()
            );
            plan.rejected.push(path.to_path_buf());
            continue;
        };

        if let Some(first) = claimed.get(&key) {
            return Err(PlanError::KeyCollision {
                key,
                first: first.clone(),
                second: path.to_path_buf(),
            });
        }
        claimed.insert(key.clone(), path.to_path_buf());

        plan.units.push(MigrationUnit {
            subject: brand.to_string(),
            category,
            product,
            local_path: path.to_path_buf(),
            destination_key: key,
            size_bytes: entry.metadata()?.len(),
            mime_type: mime_for(path),
        });
    }
    Ok(())
}

/// Brand folder names directly under `root`, sorted.
fn brand_folders(root: &Path) -> Result<Vec<String>, PlanError> {
    let mut folders = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_dir() || is_hidden(entry.file_name()) {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) => folders.push(name.to_string()),
            None => warn!(
                "Skipping brand folder with a non UTF-8 name: {}",
                entry.path().display()
            ),
        }
    }
    Ok(folders)
}

/// Maps a requested subject name to an on-disk brand folder.
///
/// Tries an exact match, then case-insensitive, then a match on the
/// sanitized names.
pub fn resolve_folder_name(name: &str, folders: &[String]) -> Option<String> {
    if let Some(exact) = folders.iter().find(|f| f.as_str() == name) {
        return Some(exact.clone());
    }
    let lower = name.to_lowercase();
    if let Some(found) = folders.iter().find(|f| f.to_lowercase() == lower) {
        return Some(found.clone());
    }
    let sanitized = sanitize_key_component(name).to_lowercase();
    if sanitized.is_empty() {
        return None;
    }
    folders
        .iter()
        .find(|f| sanitize_key_component(f).to_lowercase() == sanitized)
        .cloned()
}

fn classify(components: &[String]) -> (MediaCategory, Option<String>) {
    if components.len() == 1 {
        return (MediaCategory::BrandMedia, None);
    }
    let first = components[0].as_str();
    if BRAND_MEDIA_SUBDIRS
        .iter()
        .any(|d| d.eq_ignore_ascii_case(first))
    {
        (MediaCategory::BrandMedia, None)
    } else {
        (MediaCategory::ProductMedia, Some(first.to_string()))
    }
}

fn relative_components(base: &Path, path: &Path) -> Option<Vec<String>> {
    path.strip_prefix(base)
        .ok()?
        .components()
        .map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect()
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn has_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Content type for a local file, with a fixed table for the media types
/// `mime_guess` might not know.
pub fn mime_for(path: &Path) -> String {
    if let Some(mime) = mime_guess::from_path(path).first() {
        return mime.essence_str().to_string();
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
    .to_string()
}
