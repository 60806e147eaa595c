//! The reconciliation walk.
//!
//! One forward pass over the manifest's commit history: read the manifest at
//! each commit, pull out its version, and make sure a `v<version>` tag exists
//! somewhere in the repository. Discrepancies are reported on stdout;
//! with `--apply` the missing tags are created.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::git::{self, Git, Vcs};
use crate::history::{self, HistoryEntry};
use crate::manifest::{self, VersionLookup};

/// Options for a whole run, mirroring the CLI surface.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Repository to scan.
    pub repo: PathBuf,

    /// History starting point, e.g. `origin/master`.
    pub branch: String,

    /// Explicit manifest path; skips discovery.
    pub manifest: Option<PathBuf>,

    /// Create missing tags instead of only reporting them.
    pub apply: bool,

    /// Let git's stderr through instead of discarding it.
    pub verbose: bool,
}

/// Run the full reconciliation: find the manifest, extract its history,
/// walk it. Exits cleanly (without error) when the repo has no manifest.
pub async fn run(opts: RunOptions) -> Result<(), Error> {
    let repo = opts.repo.canonicalize().map_err(|e| Error::RepoPath {
        path: opts.repo.display().to_string(),
        source: e,
    })?;
    if !repo.is_dir() {
        return Err(Error::NotADirectory {
            path: repo.display().to_string(),
        });
    }

    if !opts.apply {
        println!("Running in dry/test mode. No changes will be made");
        println!("For permanent changes use `--apply` switch.");
        println!();
    }

    println!("Looking for {} in {}", manifest::FILE_NAME, repo.display());

    let Some(manifest) = select_manifest(&repo, opts.manifest.as_deref())?.manifest else {
        println!("No {} in repo: {}", manifest::FILE_NAME, repo.display());
        return Ok(());
    };

    let git = Git::new(repo, opts.verbose);
    let entries = history::extract(&git, &opts.branch, &manifest).await?;
    tracing::debug!(entries = entries.len(), "extracted manifest history");

    Reconciler::new(&git, manifest, !opts.apply)
        .walk(&entries)
        .await?;

    Ok(())
}

/// Which manifest a run settled on, plus the notices printed on the way.
#[derive(Debug, Default)]
struct ManifestChoice {
    /// Repo-relative manifest path; `None` when the repo has none at all.
    manifest: Option<PathBuf>,

    /// Notice lines, in the order they went to stdout.
    lines: Vec<String>,
}

impl ManifestChoice {
    fn emit(&mut self, line: String) {
        println!("{line}");
        self.lines.push(line);
    }
}

/// Pick the manifest to reconcile against.
///
/// An explicit path must exist and resolve inside the repository. Otherwise
/// the first discovered manifest wins and the rest get an informational
/// notice.
fn select_manifest(repo: &Path, explicit: Option<&Path>) -> Result<ManifestChoice, Error> {
    let mut choice = ManifestChoice::default();

    if let Some(path) = explicit {
        let resolved = path.canonicalize().map_err(|e| Error::ManifestPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let rel = resolved
            .strip_prefix(repo)
            .map_err(|_| Error::ManifestOutsideRepo {
                path: resolved.display().to_string(),
            })?;
        choice.emit(format!("Using user selected manifest file: {}", rel.display()));
        choice.manifest = Some(rel.to_path_buf());
        return Ok(choice);
    }

    let mut found = manifest::discover(repo).into_iter();
    let Some(selected) = found.next() else {
        return Ok(choice);
    };
    choice.emit(format!("Selected manifest file: {}", selected.display()));

    let mut has_multiple = false;
    for ignored in found {
        has_multiple = true;
        choice.emit(format!("Ignore additional manifest: {}", ignored.display()));
    }
    if has_multiple {
        choice.emit(String::new());
        choice.emit("Multiple manifests have been found.".to_string());
        choice.emit("If the selected one is not correct use `--manifest` option.".to_string());
        choice.emit(String::new());
    }

    choice.manifest = Some(selected);
    Ok(choice)
}

/// Classification of one history entry after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Manifest path does not exist at this commit.
    FileAbsent,

    /// Manifest content at this commit does not parse.
    Malformed,

    /// Manifest parses but carries no version attribute.
    NoVersion,

    /// Version unchanged since the previous signal; no tag check performed.
    SameVersion,

    /// The commit's describe label already names the expected tag.
    TagMatches,

    /// The expected tag exists on some commit (not necessarily this one).
    /// `orphaned` is set when that commit is reachable from no branch.
    TagElsewhere { commit: String, orphaned: bool },

    /// The expected tag does not exist anywhere.
    TagMissing(Repair),
}

/// What happened about a missing tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// Dry-run: reported only.
    DryRun,

    /// A creation attempt for this expected tag already happened this run.
    AlreadyAttempted,

    /// Annotated tag created.
    Tagged,

    /// Annotated creation refused; a lightweight marker tag was left instead.
    Marked,
}

/// Everything the walk reported.
#[derive(Debug, Default)]
pub struct Report {
    /// Report lines, in the order they went to stdout.
    pub lines: Vec<String>,

    /// One outcome per history entry walked.
    pub outcomes: Vec<Outcome>,
}

/// The reconciliation engine.
///
/// State is an explicit fold over the entry sequence: the last version that
/// produced a signal (adjacent duplicates are suppressed) and the set of
/// expected tags a creation attempt was already made for this run.
pub struct Reconciler<'v, V: Vcs> {
    vcs: &'v V,
    manifest: PathBuf,
    dry_run: bool,
    last_version: Option<String>,
    stamped: HashSet<String>,
    lines: Vec<String>,
}

impl<'v, V: Vcs> Reconciler<'v, V> {
    pub fn new(vcs: &'v V, manifest: PathBuf, dry_run: bool) -> Self {
        Self {
            vcs,
            manifest,
            dry_run,
            last_version: None,
            stamped: HashSet::new(),
            lines: Vec::new(),
        }
    }

    /// Walk the entries oldest-first and produce the report.
    pub async fn walk(mut self, entries: &[HistoryEntry]) -> Result<Report, git::Error> {
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            outcomes.push(self.step(entry).await?);
        }

        Ok(Report {
            lines: self.lines,
            outcomes,
        })
    }

    /// Reconcile a single history entry.
    async fn step(&mut self, entry: &HistoryEntry) -> Result<Outcome, git::Error> {
        let Some(content) = self.vcs.show_file(&entry.commit, &self.manifest).await? else {
            // Deleted or not yet added at this commit.
            return Ok(Outcome::FileAbsent);
        };

        let version = match manifest::version_code(&content) {
            VersionLookup::Found(version) => version,
            VersionLookup::Absent => return Ok(Outcome::NoVersion),
            VersionLookup::Malformed => {
                self.emit(format!("malformed manifest at commit {}", entry.commit));
                return Ok(Outcome::Malformed);
            }
        };

        // A manifest can be touched without the version changing.
        if self.last_version.as_deref() == Some(version.as_str()) {
            return Ok(Outcome::SameVersion);
        }
        self.last_version = Some(version.clone());

        let expected = format!("v{version}");

        // The describe label carries a distance suffix when the tag sits on
        // an ancestor, e.g. "v41-3-gabcdef"; only the base name counts.
        let base = entry.describe.split('-').next().unwrap_or("");
        if base == expected {
            return Ok(Outcome::TagMatches);
        }

        // Tags are repository-wide. The right tag may already sit on another
        // commit (an ancestor, or a divergent one); recreating it would make
        // a conflicting duplicate.
        if let Some(at) = self.vcs.resolve_tag(&expected).await? {
            self.emit(format!("tag \"{expected}\" already on {at}"));

            let branches = self.vcs.branches_with_commit(&at).await?;
            let orphaned = branches.is_empty();
            if orphaned {
                self.emit(format!(
                    "WARNING: commit {at} with tag \"{expected}\" is not on any branch, fix ASAP"
                ));
            }
            return Ok(Outcome::TagElsewhere {
                commit: at,
                orphaned,
            });
        }

        self.emit(format!(
            "there should be tag \"{expected}\", but got \"{}\" on this commit: {}",
            entry.describe, entry.commit
        ));

        if self.dry_run {
            return Ok(Outcome::TagMissing(Repair::DryRun));
        }
        if !self.stamped.insert(expected.clone()) {
            return Ok(Outcome::TagMissing(Repair::AlreadyAttempted));
        }

        let message = format!("Version {version}");
        if self
            .vcs
            .create_annotated_tag(&expected, &entry.commit, &message)
            .await?
        {
            return Ok(Outcome::TagMissing(Repair::Tagged));
        }

        // Leave a lightweight marker on the suspect commit instead.
        tracing::warn!(tag = %expected, commit = %entry.commit, "annotated tag refused");
        let marker = format!("retrostamp/expected-{expected}");
        if !self
            .vcs
            .create_lightweight_tag(&marker, &entry.commit)
            .await?
        {
            self.emit(format!(
                "failed to create marker tag \"{marker}\" at {}",
                entry.commit
            ));
        }
        Ok(Outcome::TagMissing(Repair::Marked))
    }

    fn emit(&mut self, line: String) {
        println!("{line}");
        self.lines.push(line);
    }
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("repository path '{path}' is not usable")]
    RepoPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("repository path '{path}' is not a directory")]
    NotADirectory { path: String },

    #[error("manifest path '{path}' is not usable")]
    ManifestPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest '{path}' is outside the repository")]
    ManifestOutsideRepo { path: String },

    #[error(transparent)]
    Git(#[from] git::Error),
}
