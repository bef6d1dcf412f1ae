//! The set of files a patch should contain.

use crate::document::PatchDocument;
use crate::source::{Candidate, DiffSource, GitError, changed_files};
use std::collections::BTreeSet;

/// Paths chosen for a patch, plus the subset whose sections must be
/// regenerated instead of copied.
///
/// `included` keeps insertion order: paths from an existing patch come first
/// in patch order, followed by paths added later in the order they were
/// added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    included: Vec<String>,
    refresh: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the files an existing patch already contains
    pub fn from_document(document: &PatchDocument) -> Self {
        let mut selection = Self::new();
        selection.add(document.paths());
        selection
    }

    pub fn included(&self) -> &[String] {
        &self.included
    }

    pub fn includes(&self, path: &str) -> bool {
        self.included.iter().any(|p| p == path)
    }

    /// Paths marked for refresh, sorted
    pub fn refresh(&self) -> impl Iterator<Item = &str> {
        self.refresh.iter().map(String::as_str)
    }

    pub fn is_refresh(&self, path: &str) -> bool {
        self.refresh.contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    pub fn len(&self) -> usize {
        self.included.len()
    }

    /// Changed paths in the working tree that are not yet included
    pub fn add_candidates<S: DiffSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<Vec<Candidate>, GitError> {
        Ok(changed_files(source)?
            .into_iter()
            .filter(|c| !self.includes(&c.path))
            .collect())
    }

    /// Include paths, appending those not already present. Returns how many
    /// were new.
    pub fn add<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let mut added = 0;
        for path in paths {
            let path = path.into();
            if !self.includes(&path) {
                log::debug!("Including {path}");
                self.included.push(path);
                added += 1;
            }
        }
        added
    }

    /// Drop paths from the selection, and from the refresh marks with them
    pub fn remove_selected<I, P>(&mut self, subset: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        for path in subset {
            let path = path.as_ref();
            self.included.retain(|p| p != path);
            self.refresh.remove(path);
            log::debug!("Removed {path}");
        }
    }

    /// Mark included paths for regeneration. Paths outside the selection are
    /// ignored.
    pub fn mark_for_refresh<I, P>(&mut self, subset: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        for path in subset {
            let path = path.as_ref();
            if self.includes(path) {
                self.refresh.insert(path.to_string());
            } else {
                log::debug!("Not marking {path} for refresh: not included");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::FileStatus;
    use crate::source::fake::FakeSource;
    use similar_asserts::assert_eq;

    fn doc() -> PatchDocument {
        PatchDocument::parse(
            "diff --git a/a.txt b/a.txt\n+a\ndiff --git a/b.txt b/b.txt\n+b\ndiff --git a/c.txt b/c.txt\n+c\n",
        )
    }

    #[test]
    fn from_document_keeps_patch_order() {
        let selection = SelectionSet::from_document(&doc());
        assert_eq!(selection.included(), ["a.txt", "b.txt", "c.txt"]);
        assert_eq!(selection.refresh().count(), 0);
    }

    #[test]
    fn add_appends_in_addition_order() {
        let mut selection = SelectionSet::from_document(&doc());
        assert_eq!(selection.add(["e.txt", "a.txt", "d.txt"]), 2);
        assert_eq!(
            selection.included(),
            ["a.txt", "b.txt", "c.txt", "e.txt", "d.txt"]
        );
    }

    #[test]
    fn remove_drops_refresh_mark() {
        let mut selection = SelectionSet::from_document(&doc());
        selection.mark_for_refresh(["b.txt"]);
        selection.remove_selected(["b.txt"]);
        assert_eq!(selection.included(), ["a.txt", "c.txt"]);
        assert!(!selection.is_refresh("b.txt"));
    }

    #[test]
    fn refresh_ignores_paths_outside_selection() {
        let mut selection = SelectionSet::from_document(&doc());
        selection.mark_for_refresh(["c.txt", "zzz.txt"]);
        assert_eq!(selection.refresh().collect::<Vec<_>>(), ["c.txt"]);
    }

    #[test]
    fn readding_after_removal_does_not_revive_refresh() {
        let mut selection = SelectionSet::from_document(&doc());
        selection.mark_for_refresh(["a.txt"]);
        selection.remove_selected(["a.txt"]);
        selection.add(["a.txt"]);
        assert!(selection.includes("a.txt"));
        assert!(!selection.is_refresh("a.txt"));
    }

    #[test]
    fn candidates_exclude_included_paths() {
        let source = FakeSource::new()
            .modified("a.txt", "a")
            .modified("m.txt", "m")
            .untracked("u.txt", "u");
        let selection = SelectionSet::from_document(&doc());

        let candidates = selection.add_candidates(&source).unwrap();

        assert_eq!(
            candidates,
            vec![
                Candidate {
                    path: "m.txt".into(),
                    status: FileStatus::Modified
                },
                Candidate {
                    path: "u.txt".into(),
                    status: FileStatus::Untracked
                },
            ]
        );
    }
}
