//! Subject list loading.
//!
//! A run works on one canonical list of subjects (brands). The list comes
//! from inline names and/or a subjects file, is deduplicated
//! case-insensitively, and optionally capped with `max_subjects`.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::SubjectSource;
use crate::error_handling::PreconditionError;
use crate::migrate::sanitize_key_component;

/// One brand or profile processed by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    /// Human-facing name; also the local folder name
    pub display_name: String,
    /// Handle on the remote site, when known up front
    pub remote_handle: Option<String>,
    /// Local folder holding this subject's content
    pub local_path: Option<PathBuf>,
}

impl Subject {
    /// A subject known only by its display name.
    pub fn new(display_name: impl Into<String>) -> Self {
        Subject {
            display_name: display_name.into(),
            remote_handle: None,
            local_path: None,
        }
    }

    /// Handles to try, in order, when `remote_handle` is absent.
    pub fn handle_candidates(&self) -> Vec<String> {
        match &self.remote_handle {
            Some(handle) => vec![handle.clone()],
            None => handle_candidates(&self.display_name),
        }
    }

    /// Folder for this subject, relative to an output or source root.
    ///
    /// `local_path` is used as given when it stays below the root. Otherwise
    /// the display name is used, sanitized like a key component if it is not
    /// a single plain path segment. Returns `None` when neither yields a
    /// folder that stays below the root.
    pub fn local_folder(&self) -> Option<PathBuf> {
        if let Some(path) = &self.local_path {
            if stays_below_root(path) {
                return Some(path.clone());
            }
            warn!(
                "Ignoring local path {} of '{}': it leaves the root",
                path.display(),
                self.display_name
            );
        }
        let name = self.display_name.trim();
        if is_plain_segment(name) {
            return Some(PathBuf::from(name));
        }
        let sanitized = sanitize_key_component(name);
        is_plain_segment(&sanitized).then(|| PathBuf::from(sanitized))
    }

    /// Name used to find this subject's folder in a local tree.
    pub fn folder_query(&self) -> String {
        match &self.local_path {
            Some(path) => path.display().to_string(),
            None => self.display_name.clone(),
        }
    }
}

fn stays_below_root(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

fn is_plain_segment(name: &str) -> bool {
    !name.contains(['/', '\\'])
        && matches!(
            Path::new(name).components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        )
}

/// Derives remote handle guesses from a display name.
///
/// Lowercased, with trademark signs and every character other than letters,
/// digits, `_`, `-` and whitespace removed. Candidates are the words joined
/// with nothing (hyphens dropped too), with `_`, and with `-`. Duplicates are
/// dropped, so a single-word name yields one candidate.
///
/// ```
/// use brand_harvest::handle_candidates;
///
/// assert_eq!(
///     handle_candidates("Blue Fox"),
///     ["bluefox", "blue_fox", "blue-fox"]
/// );
/// assert_eq!(handle_candidates("Linen & Co"), ["linenco", "linen_co", "linen-co"]);
/// ```
pub fn handle_candidates(display_name: &str) -> Vec<String> {
    let cleaned: String = display_name
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '™' | '®' | '©'))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '_' | '-'))
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();

    let joined = words.concat().replace('-', "");
    let mut candidates: Vec<String> = Vec::with_capacity(3);
    for candidate in [joined, words.join("_"), words.join("-")] {
        if !candidate.is_empty() && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// A subjects file entry: a bare name or an object with details.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubjectEntry {
    Name(String),
    Detailed(SubjectFields),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubjectFields {
    #[serde(alias = "display_name", alias = "name")]
    display_name: String,
    #[serde(default, alias = "remote_handle", alias = "handle")]
    remote_handle: Option<String>,
    #[serde(default, alias = "local_path")]
    local_path: Option<PathBuf>,
}

impl SubjectEntry {
    fn into_subject(self) -> Option<Subject> {
        match self {
            SubjectEntry::Name(name) => parse_subject_entry(&name),
            SubjectEntry::Detailed(fields) => {
                let display_name = fields.display_name.trim();
                if display_name.is_empty() {
                    return None;
                }
                Some(Subject {
                    display_name: display_name.to_string(),
                    remote_handle: fields
                        .remote_handle
                        .map(|h| h.trim().to_string())
                        .filter(|h| !h.is_empty()),
                    local_path: fields.local_path.filter(|p| !p.as_os_str().is_empty()),
                })
            }
        }
    }
}

/// Parses one inline subject: `Name` or `Name=handle`.
///
/// Returns `None` for a blank name.
pub fn parse_subject_entry(text: &str) -> Option<Subject> {
    let (name, handle) = match text.split_once('=') {
        Some((name, handle)) => (name.trim(), Some(handle.trim())),
        None => (text.trim(), None),
    };
    if name.is_empty() {
        return None;
    }
    Some(Subject {
        remote_handle: handle.filter(|h| !h.is_empty()).map(str::to_string),
        ..Subject::new(name)
    })
}

/// Parses the contents of a subjects file.
///
/// Accepts a JSON array whose items are names or objects with
/// `displayName`, `remoteHandle` and `localPath`. Otherwise one subject per
/// line, where a line may hold several comma-separated `Name` or
/// `Name=handle` entries. Blank lines and lines starting with `#` are
/// skipped.
pub fn parse_subject_list(text: &str) -> Vec<Subject> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        match serde_json::from_str::<Vec<SubjectEntry>>(trimmed) {
            Ok(entries) => {
                return entries
                    .into_iter()
                    .filter_map(SubjectEntry::into_subject)
                    .collect()
            }
            Err(e) => debug!("Subjects file is not a JSON array, reading as lines: {}", e),
        }
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split(','))
        .filter_map(parse_subject_entry)
        .collect()
}

/// Drops repeated subjects (case-insensitive name), keeping the first.
pub fn dedup_subjects(subjects: Vec<Subject>) -> Vec<Subject> {
    let mut seen = HashSet::new();
    subjects
        .into_iter()
        .filter(|subject| {
            let fresh = seen.insert(subject.display_name.to_lowercase());
            if !fresh {
                warn!("Dropping duplicate subject '{}'", subject.display_name);
            }
            fresh
        })
        .collect()
}

/// Builds the run's subject list from inline names and the subjects file.
///
/// # Errors
///
/// Returns `PreconditionError::SubjectsFile` if the file cannot be read.
pub async fn load_subjects(source: &SubjectSource) -> Result<Vec<Subject>, PreconditionError> {
    let mut subjects: Vec<Subject> = source
        .names
        .iter()
        .filter_map(|name| parse_subject_entry(name))
        .collect();
    if let Some(path) = &source.file {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            PreconditionError::SubjectsFile {
                path: path.clone(),
                source: e,
            }
        })?;
        subjects.extend(parse_subject_list(&text));
    }

    let mut subjects = dedup_subjects(subjects);
    if let Some(max) = source.max_subjects {
        if subjects.len() > max {
            debug!("Limiting run to the first {} of {} subjects", max, subjects.len());
            subjects.truncate(max);
        }
    }
    Ok(subjects)
}
