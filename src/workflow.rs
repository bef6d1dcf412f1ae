//! The three user-facing flows: create a patch, update one, split one.

use crate::assemble::{DiffError, PatchAssembler};
use crate::document::PatchDocument;
use crate::fs::atomic_write;
use crate::prompt::{ChecklistItem, Prompter};
use crate::reconcile::PatchReconciler;
use crate::selection::SelectionSet;
use crate::session::Session;
use crate::source::{DiffSource, IndexSnapshot, changed_files};
use crate::split::{SplitReport, split};
use crate::PatchworkError;
use std::fmt;
use std::path::{Path, PathBuf};

/// File name offered when creating a patch
pub const DEFAULT_PATCH_NAME: &str = "changes.patch";

/// How a flow ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Written { path: PathBuf, sections: usize },
    /// The user dismissed a prompt or declined to overwrite
    Cancelled,
    /// There was nothing to put in a patch
    NothingSelected,
    /// The working tree has no modified or untracked files
    NoChanges,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Written { path, sections } => {
                write!(f, "Wrote {sections} file(s) to {}", path.display())
            }
            Outcome::Cancelled => f.write_str("Cancelled; nothing written"),
            Outcome::NothingSelected => f.write_str("No files selected; nothing written"),
            Outcome::NoChanges => f.write_str("No modified or untracked files; nothing written"),
        }
    }
}

/// Read and parse a patch file
pub fn read_patch(path: &Path) -> Result<PatchDocument, PatchworkError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(PatchDocument::parse(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PatchworkError::MissingPatch {
            path: path.display().to_string(),
        }),
        Err(e) => Err(PatchworkError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
    }
}

/// Atomically write a patch, refusing to write one without sections
pub fn write_patch(path: &Path, document: &PatchDocument) -> Result<(), PatchworkError> {
    if document.is_empty() {
        return Err(PatchworkError::EmptyOutput {
            path: path.display().to_string(),
        });
    }
    atomic_write(path, document.to_string().as_bytes())?;
    log::info!("Wrote {} section(s) to {}", document.len(), path.display());
    Ok(())
}

/// Run an operation that may stage files, then put back any index entry it
/// left changed.
///
/// An index that cannot be restored is an error even when the operation
/// itself succeeded.
fn with_index_check<S, T>(
    source: &S,
    operation: impl FnOnce() -> Result<T, DiffError>,
) -> Result<T, PatchworkError>
where
    S: DiffSource,
{
    let snapshot = IndexSnapshot::capture(source)?;
    let result = operation();

    let problem = match snapshot.restore(source) {
        Ok(left) if left.is_clean() => None,
        Ok(left) => Some(format!("entries still differ for {}", left.paths.join(", "))),
        Err(e) => Some(e.to_string()),
    };
    if let Some(message) = problem {
        if let Err(e) = &result {
            log::error!("{e}");
        }
        return Err(PatchworkError::IndexNotRestored { message });
    }

    Ok(result?)
}

/// Select changed files and write them to a new patch.
///
/// `output` skips the file name prompt.
pub fn create<S: DiffSource, P: Prompter>(
    source: &S,
    prompter: &mut P,
    output: Option<&Path>,
) -> Result<Outcome, PatchworkError> {
    let candidates = changed_files(source)?;
    if candidates.is_empty() {
        return Ok(Outcome::NoChanges);
    }

    let items: Vec<ChecklistItem> = candidates
        .into_iter()
        .map(|c| ChecklistItem::new(c.path, Some(c.status), false))
        .collect();
    let Some(chosen) = prompter.checklist("Select files to include", &items)? else {
        return Ok(Outcome::Cancelled);
    };
    if chosen.is_empty() {
        return Ok(Outcome::NothingSelected);
    }

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => match prompter.text("Patch file name", DEFAULT_PATCH_NAME)? {
            Some(name) if !name.is_empty() => PathBuf::from(name),
            Some(_) => return Ok(Outcome::NothingSelected),
            None => return Ok(Outcome::Cancelled),
        },
    };
    if path.exists() && !prompter.confirm(&format!("{} exists. Overwrite?", path.display()))? {
        return Ok(Outcome::Cancelled);
    }

    let document = with_index_check(source, || PatchAssembler::new(source).assemble(&chosen))?;
    write_patch(&path, &document)?;
    Ok(Outcome::Written {
        path,
        sections: document.len(),
    })
}

/// Edit the file selection of an existing patch and rewrite it.
///
/// The patch is replaced in place unless `output` is given. On any error the
/// patch on disk is left as it was.
pub fn update<S: DiffSource, P: Prompter>(
    source: &S,
    prompter: &mut P,
    patch: &Path,
    output: Option<&Path>,
) -> Result<Outcome, PatchworkError> {
    let original = read_patch(patch)?;
    if original.is_empty() {
        return Err(PatchworkError::EmptyPatch {
            path: patch.display().to_string(),
        });
    }

    let selection = SelectionSet::from_document(&original);
    let Some(selection) = Session::new(source, prompter, selection).run()? else {
        return Ok(Outcome::Cancelled);
    };
    if selection.is_empty() {
        log::info!("Every file was removed; {} left unchanged", patch.display());
        return Ok(Outcome::NothingSelected);
    }

    let document = with_index_check(source, || {
        PatchReconciler::new(PatchAssembler::new(source)).reconcile(&original, &selection)
    })?;

    let target = output.unwrap_or(patch);
    write_patch(target, &document)?;
    Ok(Outcome::Written {
        path: target.to_path_buf(),
        sections: document.len(),
    })
}

/// Directory used by [`split_file`] when none is given: `<stem>-split`
/// beside the patch.
pub fn default_split_dir(patch: &Path) -> PathBuf {
    let stem = patch
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "patch".to_string());
    patch.with_file_name(format!("{stem}-split"))
}

/// Split a patch file into one file per section
pub fn split_file(patch: &Path, out_dir: Option<&Path>) -> Result<SplitReport, PatchworkError> {
    let document = read_patch(patch)?;
    if document.is_empty() {
        return Err(PatchworkError::EmptyPatch {
            path: patch.display().to_string(),
        });
    }
    let out_dir = out_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_split_dir(patch));
    Ok(split(&document, &out_dir)?)
}
