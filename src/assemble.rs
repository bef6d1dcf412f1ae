//! Building patches from the working tree, one file at a time.

use crate::document::{DiffSection, PatchDocument};
use crate::signal;
use crate::source::{DiffSource, GitError};
use error_set::error_set;
use std::sync::atomic::{AtomicBool, Ordering};

error_set! {
    /// Errors from generating per-file diff sections
    DiffError := {
        #[display("Failed to diff {path}: {message}")]
        GitFailed { path: String, message: String },
        #[display("No changes found in {path}")]
        EmptyDiff { path: String },
        #[display("Diff output for {path} has no 'diff --git' header")]
        MissingHeader { path: String },
        #[display("Interrupted before diffing {path}")]
        Interrupted { path: String },
    }
}

/// Generates diff sections for paths and assembles them into new patches.
pub struct PatchAssembler<'a, S: DiffSource> {
    source: &'a S,
    interrupt: &'a AtomicBool,
}

impl<'a, S: DiffSource> PatchAssembler<'a, S> {
    /// Assemble against `source`, stopping early once Ctrl-C has been seen.
    pub fn new(source: &'a S) -> Self {
        Self::with_interrupt(source, signal::flag())
    }

    /// Assemble against `source`, stopping early once `interrupt` is set.
    pub fn with_interrupt(source: &'a S, interrupt: &'a AtomicBool) -> Self {
        Self { source, interrupt }
    }

    /// Build a patch with one section per path, in the order given.
    ///
    /// Paths missing from the working tree are skipped with a warning. Any
    /// other failure aborts the whole patch. A path listed twice ends up in
    /// the patch once, at its first position.
    pub fn assemble<P: AsRef<str>>(&self, files: &[P]) -> Result<PatchDocument, DiffError> {
        let mut document = PatchDocument::new();
        for path in files {
            if let Some(section) = self.section_for(path.as_ref())? {
                document.insert(section);
            }
        }
        log::info!("Assembled {} of {} file(s)", document.len(), files.len());
        Ok(document)
    }

    /// Generate the diff section for a single path.
    ///
    /// Tracked files are diffed against the index directly. Untracked files
    /// are staged, diffed against HEAD, and their index entries put back as
    /// they were. Returns `None` for a path that no longer exists on disk.
    pub fn section_for(&self, path: &str) -> Result<Option<DiffSection>, DiffError> {
        if self.interrupt.load(Ordering::SeqCst) {
            return Err(DiffError::Interrupted {
                path: path.to_string(),
            });
        }

        if !self.source.exists(path) {
            log::warn!("Skipping {path}: not found in the working tree");
            return Ok(None);
        }

        let git_failed = |e: GitError| DiffError::GitFailed {
            path: path.to_string(),
            message: e.to_string(),
        };

        let text = if self.source.is_tracked(path).map_err(git_failed)? {
            log::debug!("Diffing tracked file {path}");
            self.source.diff_working_tree(path)
        } else {
            log::debug!("Diffing untracked file {path} through the index");
            self.source.stage_then_run(path, |s| s.diff_staged(path))
        }
        .map_err(git_failed)?;

        if text.trim().is_empty() {
            return Err(DiffError::EmptyDiff {
                path: path.to_string(),
            });
        }

        let sections = PatchDocument::parse(&text).into_sections();
        let position = sections
            .iter()
            .position(|s| s.path == path)
            .unwrap_or(0);
        let mut section =
            sections
                .into_iter()
                .nth(position)
                .ok_or_else(|| DiffError::MissingHeader {
                    path: path.to_string(),
                })?;
        // Key by the requested path so selections keep matching
        section.path = path.to_string();
        Ok(Some(section))
    }
}
