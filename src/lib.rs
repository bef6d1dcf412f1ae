//! Interactive curation of multi-file git patches.
//!
//! A patch is handled as a [`PatchDocument`]: an ordered list of per-file
//! [`DiffSection`]s. New patches are assembled from the working tree by
//! [`PatchAssembler`]; existing ones are edited through a [`SelectionSet`]
//! and rebuilt by [`PatchReconciler`], which copies untouched sections
//! verbatim. All repository access goes through [`DiffSource`].

use error_set::error_set;

pub mod assemble;
pub mod document;
pub mod fs;
pub mod prompt;
pub mod reconcile;
pub mod selection;
pub mod session;
pub mod signal;
pub mod source;
pub mod split;
pub mod workflow;

pub use assemble::{DiffError, PatchAssembler};
pub use document::{DiffSection, PatchDocument};
pub use fs::WriteError;
pub use prompt::{PromptError, Prompter, TerminalPrompter};
pub use reconcile::PatchReconciler;
pub use selection::SelectionSet;
pub use source::{DiffSource, FileStatus, GitDiffSource, GitError, IndexEntry};
pub use split::{SplitError, SplitReport};
pub use workflow::Outcome;

error_set! {
    /// Top-level error for git-patchwork operations
    PatchworkError := {
        #[display("Patch file {path} does not exist")]
        MissingPatch { path: String },
        #[display("Failed to read {path}: {message}")]
        ReadFailed { path: String, message: String },
        #[display("{path} contains no 'diff --git' sections")]
        EmptyPatch { path: String },
        #[display("Refusing to write {path}: no file produced a diff")]
        EmptyOutput { path: String },
        #[display("The staging index could not be restored: {message}")]
        IndexNotRestored { message: String },
        DiffError(DiffError),
        WriteError(WriteError),
        SplitError(SplitError),
        PromptError(PromptError),
        GitError(GitError),
    } || EnvironmentError

    /// Problems with the environment the tool is started in
    EnvironmentError := {
        #[display("git is not available: {message}")]
        GitUnavailable { message: String },
        #[display("Cannot change to {path}: {message}")]
        BadDirectory { path: String, message: String },
        #[display("{path} is not inside a git repository")]
        NotARepository { path: String },
        #[display("An interactive terminal is required")]
        NoTerminal,
        #[display("Failed to install the Ctrl-C handler: {message}")]
        SignalHandler { message: String },
    }
}
