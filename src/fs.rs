//! Atomic file replacement.
//!
//! Patches are written to a temporary file in the target's directory, synced,
//! and renamed over the target. A failure at any step leaves the target as it
//! was and removes the temporary file.

use error_set::error_set;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

error_set! {
    /// Errors from writing output files
    WriteError := {
        #[display("Failed to create temporary file next to {path}: {message}")]
        TempFile { path: String, message: String },
        #[display("Failed to write {path}: {message}")]
        Write { path: String, message: String },
        #[display("Failed to replace {path}: {message}")]
        Persist { path: String, message: String },
    }
}

/// Atomically replace `path` with `content`.
///
/// Missing parent directories are created.
///
/// ```no_run
/// use git_patchwork::fs::atomic_write;
/// use std::path::Path;
///
/// atomic_write(Path::new("changes.patch"), b"diff --git a/x b/x\n").unwrap();
/// ```
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), WriteError> {
    let display = path.display().to_string();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if !parent.exists() {
        std::fs::create_dir_all(parent).map_err(|e| WriteError::TempFile {
            path: display.clone(),
            message: e.to_string(),
        })?;
    }

    // Dropping the NamedTempFile on any error below deletes it
    let mut temp = NamedTempFile::new_in(parent).map_err(|e| WriteError::TempFile {
        path: display.clone(),
        message: e.to_string(),
    })?;

    temp.write_all(content)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| WriteError::Write {
            path: display.clone(),
            message: e.to_string(),
        })?;

    temp.persist(path).map_err(|e| WriteError::Persist {
        path: display,
        message: e.error.to_string(),
    })?;

    log::debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
