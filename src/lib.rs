//! Retrostamp: Reconstruct missing version tags from a manifest's commit history.
//!
//! Retrostamp walks every commit that touched the tracked `AndroidManifest.xml`,
//! reads the declared version at that revision, and checks that a matching
//! `v<version>` tag exists somewhere in the repository. Missing tags are
//! reported, and created retroactively with `--apply`.
//!
//! # Architecture
//!
//! - **Git**: The narrow version-control capability (history, content, tags)
//!   and its subprocess-backed implementation
//! - **History**: Extract the manifest's full commit history, oldest first
//! - **Manifest**: Discover manifest files and read the version attribute
//! - **Reconcile**: The single-pass engine deciding report and repair actions

mod git;
mod history;
mod manifest;
mod reconcile;

pub use git::{Git, Vcs};
pub use history::{HistoryEntry, extract};
pub use manifest::{VersionLookup, discover, version_code};
pub use reconcile::{Outcome, Reconciler, Repair, Report, RunOptions, run};
