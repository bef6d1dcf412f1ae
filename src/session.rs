//! The menu for editing an existing patch's file selection.
//!
//! The menu is a small state machine: every user action moves it from
//! [`MenuState::Idle`] into one editing state and back, until the user saves
//! ([`MenuState::Finalizing`]) or quits.

use crate::PatchworkError;
use crate::prompt::{ChecklistItem, MenuAction, Prompter};
use crate::selection::SelectionSet;
use crate::source::{DiffSource, FileStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Idle,
    Adding,
    Removing,
    Refreshing,
    Finalizing,
}

impl MenuState {
    /// The state a menu choice leads to; `None` ends the session unsaved.
    pub fn after(action: MenuAction) -> Option<Self> {
        match action {
            MenuAction::Add => Some(MenuState::Adding),
            MenuAction::Remove => Some(MenuState::Removing),
            MenuAction::Refresh => Some(MenuState::Refreshing),
            MenuAction::Finalize => Some(MenuState::Finalizing),
            MenuAction::Cancel => None,
        }
    }
}

/// One editing session over a [`SelectionSet`].
pub struct Session<'a, S: DiffSource, P: Prompter> {
    source: &'a S,
    prompter: &'a mut P,
    selection: SelectionSet,
    state: MenuState,
}

impl<'a, S: DiffSource, P: Prompter> Session<'a, S, P> {
    pub fn new(source: &'a S, prompter: &'a mut P, selection: SelectionSet) -> Self {
        Self {
            source,
            prompter,
            selection,
            state: MenuState::Idle,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Drive the menu until the user saves or quits.
    ///
    /// Returns the final selection on save and `None` when the user quits or
    /// dismisses the menu. Dismissing a file list returns to the menu without
    /// changes.
    pub fn run(mut self) -> Result<Option<SelectionSet>, PatchworkError> {
        loop {
            self.state = match self.state {
                MenuState::Idle => {
                    let title = self.title();
                    match self.prompter.choose(&title, &MenuAction::ALL)? {
                        Some(action) => match MenuState::after(action) {
                            Some(next) => next,
                            None => return Ok(None),
                        },
                        None => return Ok(None),
                    }
                }
                MenuState::Adding => {
                    self.add()?;
                    MenuState::Idle
                }
                MenuState::Removing => {
                    self.remove()?;
                    MenuState::Idle
                }
                MenuState::Refreshing => {
                    self.refresh()?;
                    MenuState::Idle
                }
                MenuState::Finalizing => return Ok(Some(self.selection)),
            };
        }
    }

    fn title(&self) -> String {
        let refresh = self.selection.refresh().count();
        if refresh == 0 {
            format!("Patch has {} file(s)", self.selection.len())
        } else {
            format!(
                "Patch has {} file(s), {refresh} to refresh",
                self.selection.len()
            )
        }
    }

    fn add(&mut self) -> Result<(), PatchworkError> {
        let candidates = self.selection.add_candidates(self.source)?;
        if candidates.is_empty() {
            self.prompter.notice("No other changed files to add");
            return Ok(());
        }
        let items: Vec<ChecklistItem> = candidates
            .into_iter()
            .map(|c| ChecklistItem::new(c.path, Some(c.status), false))
            .collect();
        if let Some(chosen) = self.prompter.checklist("Select files to add", &items)? {
            self.selection.add(chosen);
        }
        Ok(())
    }

    fn remove(&mut self) -> Result<(), PatchworkError> {
        let items = self.included_items(|_| true)?;
        if let Some(chosen) = self.prompter.checklist("Select files to remove", &items)? {
            self.selection.remove_selected(&chosen);
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), PatchworkError> {
        let items = self.included_items(|path| !self.selection.is_refresh(path))?;
        if items.is_empty() {
            self.prompter.notice("Every file is already marked for refresh");
            return Ok(());
        }
        if let Some(chosen) = self.prompter.checklist("Select files to refresh", &items)? {
            self.selection.mark_for_refresh(&chosen);
        }
        Ok(())
    }

    /// Unchecked checklist rows for included paths passing `keep`
    fn included_items(
        &self,
        keep: impl Fn(&str) -> bool,
    ) -> Result<Vec<ChecklistItem>, PatchworkError> {
        let mut items = Vec::new();
        for path in self.selection.included().iter().filter(|p| keep(p)) {
            let status = FileStatus::of(self.source, path)?;
            items.push(ChecklistItem::new(path.as_str(), Some(status), false));
        }
        Ok(items)
    }
}
