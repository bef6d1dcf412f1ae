//! Splitting a patch into one file per section.

use crate::document::PatchDocument;
use crate::fs::{WriteError, atomic_write};
use error_set::error_set;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

error_set! {
    /// Errors from splitting a patch
    SplitError := {
        #[display("Output directory {path} is not writable: {message}")]
        NotWritable { path: String, message: String },
        WriteError(WriteError),
    }
}

/// Two section paths that flattened to the same file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// The section path that lost the plain name
    pub path: String,
    /// The name both paths flatten to
    pub name: String,
    /// Where the section was written instead
    pub written_to: PathBuf,
}

/// Files produced by [`split`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitReport {
    pub written: Vec<PathBuf>,
    pub collisions: Vec<Collision>,
}

impl SplitReport {
    /// Number of files written
    pub fn count(&self) -> usize {
        self.written.len()
    }
}

/// Flatten a repository path into a file name stem.
///
/// Path separators and the final extension dot become `_`.
///
/// ```
/// use git_patchwork::split::sanitize_name;
///
/// assert_eq!(sanitize_name("src/lib.rs"), "src_lib_rs");
/// assert_eq!(sanitize_name("archive.tar.gz"), "archive.tar_gz");
/// assert_eq!(sanitize_name("Makefile"), "Makefile");
/// ```
pub fn sanitize_name(path: &str) -> String {
    let mut name: String = path
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let file_start = path.rfind(['/', '\\']).map_or(0, |i| i + 1);
    if let Some(dot) = path[file_start..].rfind('.') {
        let at = file_start + dot;
        // Single-byte replacements keep byte offsets aligned with `path`
        name.replace_range(at..at + 1, "_");
    }
    name
}

/// Write every section of `document` to `<out_dir>/<name>.patch`.
///
/// `out_dir` is created if needed and checked for writability before any
/// section is written. Paths that flatten to an already used name get a
/// numeric suffix (`name-2.patch`) and are listed in
/// [`SplitReport::collisions`]. Files are written independently: an error
/// leaves the ones already written in place.
pub fn split(document: &PatchDocument, out_dir: &Path) -> Result<SplitReport, SplitError> {
    let not_writable = |e: std::io::Error| SplitError::NotWritable {
        path: out_dir.display().to_string(),
        message: e.to_string(),
    };
    std::fs::create_dir_all(out_dir).map_err(not_writable)?;
    // Dropped (and deleted) immediately; only proves we can create files here
    tempfile::NamedTempFile::new_in(out_dir).map_err(not_writable)?;

    let mut report = SplitReport::default();
    let mut used: HashSet<String> = HashSet::new();

    for section in document.sections() {
        let name = sanitize_name(&section.path);
        let mut stem = name.clone();
        let mut suffix = 2;
        while !used.insert(stem.clone()) {
            stem = format!("{name}-{suffix}");
            suffix += 1;
        }

        let target = out_dir.join(format!("{stem}.patch"));
        if stem != name {
            log::warn!(
                "{} also flattens to {name}.patch; writing {} instead",
                section.path,
                target.display()
            );
            report.collisions.push(Collision {
                path: section.path.clone(),
                name: name.clone(),
                written_to: target.clone(),
            });
        }

        atomic_write(&target, section.to_string().as_bytes())?;
        log::info!("Wrote {}", target.display());
        report.written.push(target);
    }

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn file_names(report: &SplitReport) -> Vec<String> {
        report
            .written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn sanitize_replaces_separators_and_extension() {
        assert_eq!(sanitize_name("src/a.go"), "src_a_go");
        assert_eq!(sanitize_name("src_a.go"), "src_a_go");
        assert_eq!(sanitize_name("dir.d/file"), "dir.d_file");
        assert_eq!(sanitize_name(".gitignore"), "_gitignore");
        assert_eq!(sanitize_name("win\\path.txt"), "win_path_txt");
    }

    #[test]
    fn split_writes_one_file_per_section() {
        let dir = TempDir::new().unwrap();
        let doc = PatchDocument::parse(
            "diff --git a/src/lib.rs b/src/lib.rs\n+lib\ndiff --git a/README.md b/README.md\n+readme\n",
        );

        let report = split(&doc, dir.path()).unwrap();

        assert_eq!(report.count(), 2);
        assert_eq!(file_names(&report), ["src_lib_rs.patch", "README_md.patch"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("src_lib_rs.patch")).unwrap(),
            "diff --git a/src/lib.rs b/src/lib.rs\n+lib\n"
        );
        assert!(report.collisions.is_empty());
    }

    #[test]
    fn split_disambiguates_collisions() {
        let dir = TempDir::new().unwrap();
        let doc = PatchDocument::parse(
            "diff --git a/src/a.go b/src/a.go\n+one\ndiff --git a/src_a.go b/src_a.go\n+two\ndiff --git a/src_a_go b/src_a_go\n+three\n",
        );

        let report = split(&doc, dir.path()).unwrap();

        insta::assert_snapshot!(file_names(&report).join(" "), @"src_a_go.patch src_a_go-2.patch src_a_go-3.patch");
        assert_eq!(report.collisions.len(), 2);
        assert_eq!(report.collisions[0].path, "src_a.go");
        assert_eq!(report.collisions[0].name, "src_a_go");
        assert_eq!(
            fs::read_to_string(dir.path().join("src_a_go.patch")).unwrap(),
            "diff --git a/src/a.go b/src/a.go\n+one\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("src_a_go-2.patch")).unwrap(),
            "diff --git a/src_a.go b/src_a.go\n+two\n"
        );
    }

    #[test]
    fn split_creates_output_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("parts");
        let doc = PatchDocument::parse("diff --git a/a b/a\n+a\n");

        let report = split(&doc, &out).unwrap();

        assert_eq!(report.count(), 1);
        assert!(out.join("a.patch").exists());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn split_fails_fast_when_output_is_a_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("not-a-dir");
        fs::write(&out, "occupied").unwrap();
        let doc = PatchDocument::parse("diff --git a/a b/a\n+a\n");

        let result = split(&doc, &out);

        assert!(matches!(result, Err(SplitError::NotWritable { .. })));
        assert_eq!(fs::read_to_string(&out).unwrap(), "occupied");
    }

    #[test]
    fn split_empty_document_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let report = split(&PatchDocument::new(), dir.path()).unwrap();
        assert_eq!(report.count(), 0);
    }
}
