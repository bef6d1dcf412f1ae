//! In-memory [`DiffSource`] for tests.

use super::{DiffSource, GitError, IndexEntry};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

/// Object id of every file's committed content
const HEAD_OBJECT: &str = "1111111";
/// Object id written by [`DiffSource::stage`]
const ADDED_OBJECT: &str = "3333333";
/// Object id of changes the user staged before the session
const USER_OBJECT: &str = "5555555";

#[derive(Debug, Clone)]
struct FakeFile {
    in_head: bool,
    content: String,
}

/// A repository with no storage: files may be committed, the index maps
/// paths to object ids, diffs are synthesized from file content, and every
/// call is recorded.
#[derive(Debug, Default)]
pub(crate) struct FakeSource {
    files: RefCell<BTreeMap<String, FakeFile>>,
    index: RefCell<BTreeMap<String, String>>,
    failing: BTreeSet<String>,
    empty: BTreeSet<String>,
    calls: RefCell<Vec<String>>,
    skip_next_unstage: Cell<bool>,
    resets_to_head: bool,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with_file(self, path: &str, content: &str, in_head: bool) -> Self {
        self.files.borrow_mut().insert(
            path.to_string(),
            FakeFile {
                in_head,
                content: content.to_string(),
            },
        );
        self
    }

    /// A committed file with working-tree changes
    pub(crate) fn modified(self, path: &str, content: &str) -> Self {
        self.index
            .borrow_mut()
            .insert(path.to_string(), HEAD_OBJECT.to_string());
        self.with_file(path, content, true)
    }

    pub(crate) fn untracked(self, path: &str, content: &str) -> Self {
        self.with_file(path, content, false)
    }

    /// A committed file removed from the index with `git rm --cached`
    pub(crate) fn staged_deletion(self, path: &str, content: &str) -> Self {
        self.with_file(path, content, true)
    }

    /// A change the user staged before the session started
    pub(crate) fn pre_staged(self, path: &str) -> Self {
        self.index
            .borrow_mut()
            .insert(path.to_string(), USER_OBJECT.to_string());
        self
    }

    /// Diff requests for `path` fail
    pub(crate) fn fail_on(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    /// Diff requests for `path` succeed with no output
    pub(crate) fn empty_diff(mut self, path: &str) -> Self {
        self.empty.insert(path.to_string());
        self
    }

    /// The next unstage reports success without touching the index
    pub(crate) fn skip_next_unstage(self) -> Self {
        self.skip_next_unstage.set(true);
        self
    }

    /// Unstage resets paths to HEAD instead of their previous entries
    pub(crate) fn unstage_resets_to_head(mut self) -> Self {
        self.resets_to_head = true;
        self
    }

    /// Change a file's content, or create it as untracked
    pub(crate) fn edit(&self, path: &str, content: &str) {
        let mut files = self.files.borrow_mut();
        files
            .entry(path.to_string())
            .and_modify(|f| f.content = content.to_string())
            .or_insert_with(|| FakeFile {
                in_head: false,
                content: content.to_string(),
            });
    }

    /// Paths whose index entry differs from HEAD
    pub(crate) fn staged(&self) -> Vec<String> {
        let files = self.files.borrow();
        let index = self.index.borrow();
        let paths: BTreeSet<&String> = files.keys().chain(index.keys()).collect();
        paths
            .into_iter()
            .filter(|p| {
                let head = files
                    .get(*p)
                    .filter(|f| f.in_head)
                    .map(|_| HEAD_OBJECT);
                head != index.get(*p).map(String::as_str)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: &str, path: &str) {
        self.calls.borrow_mut().push(format!("{call} {path}"));
    }

    fn check(&self, command: &str, path: &str) -> Result<(), GitError> {
        if self.failing.contains(path) {
            return Err(GitError::ExitError {
                command: format!("{command} {path}"),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl DiffSource for FakeSource {
    fn list_modified(&self) -> Result<Vec<String>, GitError> {
        let index = self.index.borrow();
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|p| index.contains_key(*p))
            .cloned()
            .collect())
    }

    fn list_untracked(&self) -> Result<Vec<String>, GitError> {
        let index = self.index.borrow();
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|p| !index.contains_key(*p))
            .cloned()
            .collect())
    }

    fn diff_working_tree(&self, path: &str) -> Result<String, GitError> {
        self.record("diff_working_tree", path);
        self.check("diff", path)?;
        let files = self.files.borrow();
        match files.get(path) {
            Some(file) if self.index.borrow().contains_key(path) && !self.empty.contains(path) => {
                Ok(format!(
                    "diff --git a/{path} b/{path}\nindex 1111111..2222222 100644\n--- a/{path}\n+++ b/{path}\n@@ -1 +1 @@\n-old\n+{}\n",
                    file.content
                ))
            }
            _ => Ok(String::new()),
        }
    }

    fn stage(&self, path: &str) -> Result<(), GitError> {
        self.record("stage", path);
        if !self.files.borrow().contains_key(path) {
            return Err(GitError::ExitError {
                command: format!("add {path}"),
                stderr: format!("pathspec '{path}' did not match any files"),
            });
        }
        self.index
            .borrow_mut()
            .insert(path.to_string(), ADDED_OBJECT.to_string());
        Ok(())
    }

    fn diff_staged(&self, path: &str) -> Result<String, GitError> {
        self.record("diff_staged", path);
        self.check("diff --cached", path)?;
        let added = self
            .index
            .borrow()
            .get(path)
            .is_some_and(|object| object == ADDED_OBJECT);
        if !added || self.empty.contains(path) {
            return Ok(String::new());
        }
        let files = self.files.borrow();
        let content = files.get(path).map(|f| f.content.as_str()).unwrap_or("");
        Ok(format!(
            "diff --git a/{path} b/{path}\nnew file mode 100644\nindex 0000000..3333333\n--- /dev/null\n+++ b/{path}\n@@ -0,0 +1 @@\n+{content}\n"
        ))
    }

    fn unstage(&self, path: &str, previous: &[IndexEntry]) -> Result<(), GitError> {
        self.record("unstage", path);
        if self.skip_next_unstage.replace(false) {
            return Ok(());
        }
        let mut index = self.index.borrow_mut();
        index.remove(path);
        if self.resets_to_head {
            if self.files.borrow().get(path).is_some_and(|f| f.in_head) {
                index.insert(path.to_string(), HEAD_OBJECT.to_string());
            }
        } else {
            for entry in previous {
                index.insert(entry.path.clone(), entry.object.clone());
            }
        }
        Ok(())
    }

    fn is_tracked(&self, path: &str) -> Result<bool, GitError> {
        Ok(self.index.borrow().contains_key(path))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn index_entries(&self, path: Option<&str>) -> Result<Vec<IndexEntry>, GitError> {
        Ok(self
            .index
            .borrow()
            .iter()
            .filter(|(p, _)| path.is_none_or(|wanted| *p == wanted))
            .map(|(p, object)| IndexEntry {
                path: p.clone(),
                mode: "100644".to_string(),
                object: object.clone(),
                stage: 0,
            })
            .collect())
    }
}
