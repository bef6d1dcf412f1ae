//! Access to git: changed-file listing, per-file diffs and the staging index.
//!
//! Everything that touches the repository goes through the [`DiffSource`]
//! trait so that patch assembly can be exercised against a fake. The index is
//! shared with the user's own work, so staging is only ever done through
//! [`DiffSource::stage_then_run`], which puts it back on every exit path.

use crate::EnvironmentError;
use error_set::error_set;
use nom::{
    IResult, Parser,
    character::complete::{char, digit1, hex_digit1},
    sequence::terminated,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

#[cfg(test)]
pub(crate) mod fake;

error_set! {
    /// Errors from git command execution
    GitError := {
        #[display("Failed to run git {command}: {message}")]
        SpawnFailed { command: String, message: String },
        #[display("git {command} failed: {stderr}")]
        ExitError { command: String, stderr: String },
        #[display("Invalid UTF-8 in git {command} output: {message}")]
        InvalidUtf8 { command: String, message: String },
    }
}

/// How a changed path relates to version control. Used for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Modified,
    Untracked,
}

impl FileStatus {
    /// Look up the status of a path
    pub fn of<S: DiffSource + ?Sized>(source: &S, path: &str) -> Result<Self, GitError> {
        Ok(if source.is_tracked(path)? {
            FileStatus::Modified
        } else {
            FileStatus::Untracked
        })
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileStatus::Modified => "modified",
            FileStatus::Untracked => "untracked",
        })
    }
}

/// A changed path offered for inclusion in a patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: String,
    pub status: FileStatus,
}

/// One index entry, as `git ls-files --stage` reports it.
///
/// A path has one entry at stage 0, or several at stages 1-3 while it is
/// conflicted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    pub path: String,
    pub mode: String,
    pub object: String,
    pub stage: u8,
}

impl IndexEntry {
    /// Parse one `<mode> <object> <stage>\t<path>` record.
    ///
    /// ```
    /// use git_patchwork::source::IndexEntry;
    ///
    /// let entry = IndexEntry::parse("100644 e69de29bb2d1d6434b8b29ae775ad8c2e48c5391 0\tsrc/my file.rs").unwrap();
    /// assert_eq!(entry.path, "src/my file.rs");
    /// assert_eq!(entry.stage, 0);
    /// ```
    pub fn parse(record: &str) -> Option<Self> {
        let fields: IResult<&str, (&str, &str, &str)> = (
            terminated(digit1, char(' ')),
            terminated(hex_digit1, char(' ')),
            terminated(digit1, char('\t')),
        )
            .parse(record);
        let (path, (mode, object, stage)) = fields.ok()?;
        if path.is_empty() {
            return None;
        }
        Some(Self {
            path: path.to_string(),
            mode: mode.to_string(),
            object: object.to_string(),
            stage: stage.parse().ok()?,
        })
    }

    /// The record `git update-index -z --index-info` reads back
    fn index_info(&self) -> String {
        format!("{} {} {}\t{}\0", self.mode, self.object, self.stage, self.path)
    }
}

/// Version-control capabilities needed to build patches.
///
/// Paths are repository-relative.
pub trait DiffSource {
    /// Tracked paths whose working tree differs from the index
    fn list_modified(&self) -> Result<Vec<String>, GitError>;
    /// Paths present on disk but unknown to git (ignored files excluded)
    fn list_untracked(&self) -> Result<Vec<String>, GitError>;
    /// Working tree vs. index diff for a tracked path
    fn diff_working_tree(&self, path: &str) -> Result<String, GitError>;
    /// Add an untracked path to the index
    fn stage(&self, path: &str) -> Result<(), GitError>;
    /// Index vs. HEAD diff for a path
    fn diff_staged(&self, path: &str) -> Result<String, GitError>;
    /// Undo [`DiffSource::stage`]: replace whatever the index holds for
    /// `path` with exactly `previous`, which may be empty.
    fn unstage(&self, path: &str, previous: &[IndexEntry]) -> Result<(), GitError>;
    fn is_tracked(&self, path: &str) -> Result<bool, GitError>;
    /// Whether the path exists in the working tree
    fn exists(&self, path: &str) -> bool;
    /// Index entries for `path`, or for the whole index when `None`
    fn index_entries(&self, path: Option<&str>) -> Result<Vec<IndexEntry>, GitError>;

    /// Stage `path`, run `f`, and put the index entries for `path` back the
    /// way they were.
    ///
    /// The index is restored whether `f` succeeds, fails or panics. A restore
    /// failure after a successful `f` is returned; after a failed `f` it is
    /// logged and the original error wins.
    fn stage_then_run<T, E, F>(&self, path: &str, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<GitError>,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        let previous = self.index_entries(Some(path))?;
        self.stage(path)?;
        let guard = StagedPath {
            source: self,
            path,
            previous,
            released: false,
        };
        let value = f(self)?;
        guard.release()?;
        Ok(value)
    }
}

/// Holds a path staged; restores its entries when dropped unless already
/// released.
struct StagedPath<'a, S: DiffSource + ?Sized> {
    source: &'a S,
    path: &'a str,
    previous: Vec<IndexEntry>,
    released: bool,
}

impl<S: DiffSource + ?Sized> StagedPath<'_, S> {
    fn release(mut self) -> Result<(), GitError> {
        self.released = true;
        self.source.unstage(self.path, &self.previous)
    }
}

impl<S: DiffSource + ?Sized> Drop for StagedPath<'_, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.source.unstage(self.path, &self.previous) {
            log::error!("Failed to restore the index entry for {}: {}", self.path, e);
        }
    }
}

/// All modified paths followed by all untracked paths, without duplicates.
pub fn changed_files<S: DiffSource + ?Sized>(source: &S) -> Result<Vec<Candidate>, GitError> {
    let mut candidates: Vec<Candidate> = Vec::new();
    let modified = source.list_modified()?.into_iter().map(|path| Candidate {
        path,
        status: FileStatus::Modified,
    });
    let untracked = source.list_untracked()?.into_iter().map(|path| Candidate {
        path,
        status: FileStatus::Untracked,
    });
    for candidate in modified.chain(untracked) {
        if !candidates.iter().any(|c| c.path == candidate.path) {
            candidates.push(candidate);
        }
    }
    Ok(candidates)
}

/// The whole index at one point in time.
///
/// Captured before an operation that stages files, so that any entry left
/// changed afterwards can be found and put back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSnapshot {
    entries: Vec<IndexEntry>,
}

/// Paths whose index entries differ from a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDrift {
    pub paths: Vec<String>,
}

impl IndexDrift {
    pub fn is_clean(&self) -> bool {
        self.paths.is_empty()
    }
}

impl IndexSnapshot {
    pub fn capture<S: DiffSource + ?Sized>(source: &S) -> Result<Self, GitError> {
        Ok(Self {
            entries: source.index_entries(None)?,
        })
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Compare against the current index
    pub fn verify<S: DiffSource + ?Sized>(&self, source: &S) -> Result<IndexDrift, GitError> {
        let now = source.index_entries(None)?;
        let before = by_path(&self.entries);
        let after = by_path(&now);
        let paths: BTreeSet<&str> = before.keys().chain(after.keys()).copied().collect();
        Ok(IndexDrift {
            paths: paths
                .into_iter()
                .filter(|p| before.get(p) != after.get(p))
                .map(str::to_string)
                .collect(),
        })
    }

    /// Put every drifted path back to its captured entries.
    ///
    /// Returns the drift left after restoring, which is clean on success.
    pub fn restore<S: DiffSource + ?Sized>(&self, source: &S) -> Result<IndexDrift, GitError> {
        let drift = self.verify(source)?;
        if drift.is_clean() {
            return Ok(drift);
        }
        for path in &drift.paths {
            log::warn!("Index entry for {path} changed; restoring it");
            let previous: Vec<IndexEntry> = self
                .entries
                .iter()
                .filter(|e| e.path == *path)
                .cloned()
                .collect();
            source.unstage(path, &previous)?;
        }
        self.verify(source)
    }
}

fn by_path(entries: &[IndexEntry]) -> BTreeMap<&str, Vec<&IndexEntry>> {
    let mut grouped: BTreeMap<&str, Vec<&IndexEntry>> = BTreeMap::new();
    for entry in entries {
        grouped.entry(entry.path.as_str()).or_default().push(entry);
    }
    grouped
}

/// [`DiffSource`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitDiffSource {
    root: PathBuf,
}

impl GitDiffSource {
    /// Open the repository containing `dir`.
    ///
    /// Fails if git cannot be run or `dir` is not inside a work tree.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, EnvironmentError> {
        let dir = dir.as_ref();
        let output = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .map_err(|e| EnvironmentError::GitUnavailable {
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(EnvironmentError::NotARepository {
                path: dir.display().to_string(),
            });
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if root.is_empty() {
            // Inside .git or a bare repository
            return Err(EnvironmentError::NotARepository {
                path: dir.display().to_string(),
            });
        }

        log::debug!("Repository root: {root}");
        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    /// Repository root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("git");
        command
            .arg("-C")
            .arg(&self.root)
            .args(["-c", "core.quotepath=false"])
            .args(args)
            // Paths are file names, never glob patterns
            .env("GIT_LITERAL_PATHSPECS", "1");
        command
    }

    /// Run git, returning its output regardless of exit status
    fn run(&self, args: &[&str]) -> Result<Output, GitError> {
        log::debug!("git {}", args.join(" "));
        self.command(args)
            .output()
            .map_err(|e| GitError::SpawnFailed {
                command: args.join(" "),
                message: e.to_string(),
            })
    }

    /// Run git and require a zero exit status
    fn run_checked(&self, args: &[&str]) -> Result<Vec<u8>, GitError> {
        checked(args, self.run(args)?)
    }

    /// Run git with `input` on stdin and require a zero exit status
    fn run_with_input(&self, args: &[&str], input: &[u8]) -> Result<Vec<u8>, GitError> {
        log::debug!("git {} (with input)", args.join(" "));
        let spawn_failed = |e: std::io::Error| GitError::SpawnFailed {
            command: args.join(" "),
            message: e.to_string(),
        };
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_failed)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input).map_err(spawn_failed)?;
        }

        let output = child.wait_with_output().map_err(spawn_failed)?;
        checked(args, output)
    }

    fn run_text(&self, args: &[&str]) -> Result<String, GitError> {
        String::from_utf8(self.run_checked(args)?).map_err(|e| GitError::InvalidUtf8 {
            command: args.join(" "),
            message: e.to_string(),
        })
    }

    /// Run a `-z` listing command and split its NUL-separated output
    fn run_names(&self, args: &[&str]) -> Result<Vec<String>, GitError> {
        Ok(self
            .run_text(args)?
            .split('\0')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn checked(args: &[&str], output: Output) -> Result<Vec<u8>, GitError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError::ExitError {
            command: args.join(" "),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(output.stdout)
}

impl DiffSource for GitDiffSource {
    fn list_modified(&self) -> Result<Vec<String>, GitError> {
        self.run_names(&["diff", "--no-ext-diff", "--name-only", "-z"])
    }

    fn list_untracked(&self) -> Result<Vec<String>, GitError> {
        self.run_names(&["ls-files", "--others", "--exclude-standard", "-z"])
    }

    fn diff_working_tree(&self, path: &str) -> Result<String, GitError> {
        self.run_text(&[
            "diff",
            "--no-ext-diff",
            "--no-color",
            "--binary",
            "--",
            path,
        ])
    }

    fn stage(&self, path: &str) -> Result<(), GitError> {
        self.run_checked(&["add", "--", path]).map(drop)
    }

    fn diff_staged(&self, path: &str) -> Result<String, GitError> {
        self.run_text(&[
            "diff",
            "--cached",
            "--no-ext-diff",
            "--no-color",
            "--binary",
            "--",
            path,
        ])
    }

    fn unstage(&self, path: &str, previous: &[IndexEntry]) -> Result<(), GitError> {
        self.run_checked(&["update-index", "--force-remove", "--", path])?;
        if previous.is_empty() {
            return Ok(());
        }
        let info: String = previous.iter().map(IndexEntry::index_info).collect();
        self.run_with_input(&["update-index", "-z", "--index-info"], info.as_bytes())
            .map(drop)
    }

    fn is_tracked(&self, path: &str) -> Result<bool, GitError> {
        Ok(!self.index_entries(Some(path))?.is_empty())
    }

    fn exists(&self, path: &str) -> bool {
        // symlink_metadata so a dangling symlink still counts as present
        self.root.join(path).symlink_metadata().is_ok()
    }

    fn index_entries(&self, path: Option<&str>) -> Result<Vec<IndexEntry>, GitError> {
        let records = match path {
            Some(path) => self.run_names(&["ls-files", "--stage", "-z", "--", path])?,
            None => self.run_names(&["ls-files", "--stage", "-z"])?,
        };
        let mut entries = Vec::with_capacity(records.len());
        for record in &records {
            let entry = IndexEntry::parse(record).ok_or_else(|| GitError::ExitError {
                command: "ls-files --stage".to_string(),
                stderr: format!("unexpected record: {record}"),
            })?;
            // A directory pathspec also lists the files below it
            if path.is_none_or(|p| entry.path == p) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}
