//! User prompts.
//!
//! Workflows talk to the user only through [`Prompter`]. Every prompt can be
//! dismissed, which is reported as `None` and never as an error.

use crate::source::FileStatus;
use error_set::error_set;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fmt;

error_set! {
    /// Errors from the terminal
    PromptError := {
        #[display("Terminal error: {message}")]
        Terminal { message: String },
    }
}

/// One row of a checklist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    pub label: String,
    pub status: Option<FileStatus>,
    pub checked: bool,
}

impl ChecklistItem {
    pub fn new(label: impl Into<String>, status: Option<FileStatus>, checked: bool) -> Self {
        Self {
            label: label.into(),
            status,
            checked,
        }
    }
}

/// Actions offered by the patch editing menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Add,
    Remove,
    Refresh,
    Finalize,
    Cancel,
}

impl MenuAction {
    pub const ALL: [MenuAction; 5] = [
        MenuAction::Add,
        MenuAction::Remove,
        MenuAction::Refresh,
        MenuAction::Finalize,
        MenuAction::Cancel,
    ];
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MenuAction::Add => "Add files",
            MenuAction::Remove => "Remove files",
            MenuAction::Refresh => "Refresh files from the working tree",
            MenuAction::Finalize => "Save patch",
            MenuAction::Cancel => "Quit without saving",
        })
    }
}

/// Interactive input.
pub trait Prompter {
    /// Let the user toggle items; returns the labels left checked, in list
    /// order.
    fn checklist(
        &mut self,
        title: &str,
        items: &[ChecklistItem],
    ) -> Result<Option<Vec<String>>, PromptError>;

    /// Ask for a line of text, returning `default` for an empty answer.
    fn text(&mut self, prompt: &str, default: &str) -> Result<Option<String>, PromptError>;

    /// Yes/no question; dismissing it counts as no.
    fn confirm(&mut self, prompt: &str) -> Result<bool, PromptError>;

    /// Pick one action from a menu
    fn choose(
        &mut self,
        title: &str,
        actions: &[MenuAction],
    ) -> Result<Option<MenuAction>, PromptError>;

    /// Tell the user something that needs no answer
    fn notice(&mut self, message: &str);
}

/// [`Prompter`] on the controlling terminal.
///
/// Lists go to stderr; answers are read with line editing. Ctrl-C and Ctrl-D
/// dismiss the current prompt.
pub struct TerminalPrompter {
    editor: DefaultEditor,
}

impl TerminalPrompter {
    pub fn new() -> Result<Self, PromptError> {
        Ok(Self {
            editor: DefaultEditor::new().map_err(terminal_error)?,
        })
    }

    /// Read one line; `None` when dismissed
    fn read(&mut self, prompt: &str, initial: &str) -> Result<Option<String>, PromptError> {
        let line = if initial.is_empty() {
            self.editor.readline(prompt)
        } else {
            self.editor.readline_with_initial(prompt, (initial, ""))
        };
        match line {
            Ok(line) => Ok(Some(line.trim().to_string())),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(terminal_error(e)),
        }
    }
}

fn terminal_error(e: ReadlineError) -> PromptError {
    PromptError::Terminal {
        message: e.to_string(),
    }
}

impl Prompter for TerminalPrompter {
    fn checklist(
        &mut self,
        title: &str,
        items: &[ChecklistItem],
    ) -> Result<Option<Vec<String>>, PromptError> {
        let mut checked: Vec<bool> = items.iter().map(|i| i.checked).collect();

        loop {
            eprintln!("\n{title}");
            for (n, (item, on)) in items.iter().zip(&checked).enumerate() {
                let mark = if *on { 'x' } else { ' ' };
                match item.status {
                    Some(status) => eprintln!("  {:>3}) [{mark}] {} ({status})", n + 1, item.label),
                    None => eprintln!("  {:>3}) [{mark}] {}", n + 1, item.label),
                }
            }

            let Some(answer) =
                self.read("Toggle numbers (e.g. 1 3 5-7), a=all, n=none, Enter=done: ", "")?
            else {
                return Ok(None);
            };

            match answer.as_str() {
                "" => break,
                "a" => checked.iter_mut().for_each(|c| *c = true),
                "n" => checked.iter_mut().for_each(|c| *c = false),
                _ => match parse_toggles(&answer, items.len()) {
                    Some(toggles) => toggles.into_iter().for_each(|i| checked[i] = !checked[i]),
                    None => eprintln!("Not a valid selection: {answer}"),
                },
            }
        }

        Ok(Some(
            items
                .iter()
                .zip(&checked)
                .filter(|(_, on)| **on)
                .map(|(item, _)| item.label.clone())
                .collect(),
        ))
    }

    fn text(&mut self, prompt: &str, default: &str) -> Result<Option<String>, PromptError> {
        Ok(self
            .read(&format!("{prompt}: "), default)?
            .map(|answer| {
                if answer.is_empty() {
                    default.to_string()
                } else {
                    answer
                }
            }))
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool, PromptError> {
        Ok(self
            .read(&format!("{prompt} [y/N] "), "")?
            .is_some_and(|answer| matches!(answer.to_lowercase().as_str(), "y" | "yes")))
    }

    fn choose(
        &mut self,
        title: &str,
        actions: &[MenuAction],
    ) -> Result<Option<MenuAction>, PromptError> {
        loop {
            eprintln!("\n{title}");
            for (n, action) in actions.iter().enumerate() {
                eprintln!("  {}) {action}", n + 1);
            }
            let Some(answer) = self.read("Choice: ", "")? else {
                return Ok(None);
            };
            match answer.parse::<usize>() {
                Ok(n) if (1..=actions.len()).contains(&n) => return Ok(Some(actions[n - 1])),
                _ => eprintln!("Enter a number between 1 and {}", actions.len()),
            }
        }
    }

    fn notice(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Parse `1 3,5-7` into zero-based indices below `len`
fn parse_toggles(input: &str, len: usize) -> Option<Vec<usize>> {
    let mut indices = Vec::new();
    for part in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
    {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (start.parse::<usize>().ok()?, end.parse::<usize>().ok()?),
            None => {
                let n = part.parse::<usize>().ok()?;
                (n, n)
            }
        };
        if start == 0 || start > end || end > len {
            return None;
        }
        indices.extend(start - 1..end);
    }
    Some(indices)
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod scripted {
    //! A [`Prompter`] that replays canned answers.

    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug)]
    pub(crate) enum Answer {
        /// Labels to leave checked; `None` dismisses
        Checklist(Option<Vec<&'static str>>),
        Text(Option<&'static str>),
        Confirm(bool),
        Choose(Option<MenuAction>),
    }

    #[derive(Debug, Default)]
    pub(crate) struct ScriptedPrompter {
        answers: VecDeque<Answer>,
        /// Checklists shown, as (title, items)
        pub(crate) shown: Vec<(String, Vec<ChecklistItem>)>,
        pub(crate) notices: Vec<String>,
    }

    impl ScriptedPrompter {
        pub(crate) fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                shown: Vec::new(),
                notices: Vec::new(),
            }
        }

        pub(crate) fn is_done(&self) -> bool {
            self.answers.is_empty()
        }

        fn next(&mut self, asked: &str) -> Answer {
            match self.answers.pop_front() {
                Some(answer) => answer,
                None => panic!("unexpected prompt: {asked}"),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn checklist(
            &mut self,
            title: &str,
            items: &[ChecklistItem],
        ) -> Result<Option<Vec<String>>, PromptError> {
            self.shown.push((title.to_string(), items.to_vec()));
            match self.next(title) {
                Answer::Checklist(labels) => Ok(labels.map(|labels| {
                    items
                        .iter()
                        .filter(|i| labels.iter().any(|l| *l == i.label))
                        .map(|i| i.label.clone())
                        .collect()
                })),
                other => panic!("expected checklist answer for {title}, got {other:?}"),
            }
        }

        fn text(&mut self, prompt: &str, default: &str) -> Result<Option<String>, PromptError> {
            match self.next(prompt) {
                Answer::Text(text) => Ok(text.map(|t| {
                    if t.is_empty() {
                        default.to_string()
                    } else {
                        t.to_string()
                    }
                })),
                other => panic!("expected text answer for {prompt}, got {other:?}"),
            }
        }

        fn confirm(&mut self, prompt: &str) -> Result<bool, PromptError> {
            match self.next(prompt) {
                Answer::Confirm(yes) => Ok(yes),
                other => panic!("expected confirm answer for {prompt}, got {other:?}"),
            }
        }

        fn choose(
            &mut self,
            title: &str,
            _actions: &[MenuAction],
        ) -> Result<Option<MenuAction>, PromptError> {
            match self.next(title) {
                Answer::Choose(action) => Ok(action),
                other => panic!("expected menu answer for {title}, got {other:?}"),
            }
        }

        fn notice(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }
    }
}
