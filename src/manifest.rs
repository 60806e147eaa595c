//! Manifest discovery and version extraction.
//!
//! The authoritative version number lives in the `android:versionCode`
//! attribute on the root `<manifest>` element of `AndroidManifest.xml`.
//! A manifest that is malformed or lacks the attribute at some historical
//! commit is a routine outcome of walking old revisions, so extraction
//! returns a three-way [`VersionLookup`] instead of an error.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

/// File name the discovery walk looks for.
pub const FILE_NAME: &str = "AndroidManifest.xml";

const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";
const VERSION_ATTRIBUTE: &str = "versionCode";

/// Result of reading the version attribute out of one manifest revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionLookup {
    /// The root element carries a non-empty version attribute.
    Found(String),

    /// Well-formed document, but no version attribute on the root element.
    Absent,

    /// The document does not parse as XML.
    Malformed,
}

/// Extract the version identifier from manifest content.
pub fn version_code(xml: &str) -> VersionLookup {
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(_) => return VersionLookup::Malformed,
    };

    match doc.root_element().attribute((ANDROID_NS, VERSION_ATTRIBUTE)) {
        Some(value) if !value.is_empty() => VersionLookup::Found(value.to_string()),
        _ => VersionLookup::Absent,
    }
}

/// Find every manifest under `repo`, as repo-relative paths in a stable
/// (sorted) order. The caller treats the first one as authoritative.
///
/// The walk sees the whole tree, including hidden directories and paths
/// listed in ignore files. A tracked manifest can legitimately live under a
/// gitignored directory, so ignore rules must not hide it. Only the `.git`
/// database itself is skipped.
pub fn discover(repo: &Path) -> Vec<PathBuf> {
    let walk = WalkBuilder::new(repo)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .sort_by_file_path(|a, b| a.cmp(b))
        .build();

    let mut found = Vec::new();
    for entry in walk.flatten() {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if entry.file_name() != FILE_NAME {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(repo) {
            found.push(rel.to_path_buf());
        }
    }
    found
}
