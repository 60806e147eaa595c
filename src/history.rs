//! History extraction for the tracked manifest path.

use std::path::Path;

use crate::git::{self, Vcs};

/// One revision that touched the manifest path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Full commit hash.
    pub commit: String,

    /// Raw `git describe` label for the commit, empty when no tag is
    /// reachable. May carry a distance suffix like `v41-3-gabcdef`.
    pub describe: String,
}

/// Extract the manifest's commit history, oldest entry first.
///
/// The query walks the full (non-simplified) history with rename following,
/// so a path that was deleted and later re-added under the same name yields
/// commits on both sides of the gap. git emits newest-first; the reversal
/// happens here in memory rather than via `git log --reverse`, because
/// reverse traversal combined with path limiting truncates history at the
/// deletion.
///
/// Any failure of the underlying query (unknown ref, unreadable repository)
/// is fatal; no partial sequence is returned.
pub async fn extract<V: Vcs>(
    vcs: &V,
    start_ref: &str,
    path: &Path,
) -> Result<Vec<HistoryEntry>, git::Error> {
    let raw = vcs.file_history(start_ref, path).await?;

    let mut entries: Vec<HistoryEntry> = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect();
    entries.reverse();

    Ok(entries)
}

/// Parse a `<hash> <describe>` log line; the describe half may be missing.
fn parse_line(line: &str) -> HistoryEntry {
    match line.split_once(' ') {
        Some((commit, describe)) => HistoryEntry {
            commit: commit.to_string(),
            describe: describe.trim().to_string(),
        },
        None => HistoryEntry {
            commit: line.trim().to_string(),
            describe: String::new(),
        },
    }
}
