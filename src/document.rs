//! Multi-file patch documents.
//!
//! A patch is a concatenation of per-file sections, each starting with a
//! `diff --git a/<path> b/<path>` header line. [`PatchDocument::parse`] splits
//! text into [`DiffSection`]s in a single pass; nothing else in the crate
//! scans patch text for boundaries.
//!
//! Sections are kept byte-for-byte, so rendering a parsed document gives back
//! the text it was parsed from.
//!
//! ```
//! use git_patchwork::PatchDocument;
//!
//! let text = "diff --git a/a.txt b/a.txt\n+one\ndiff --git a/b.txt b/b.txt\n+two\n";
//! let doc = PatchDocument::parse(text);
//! assert_eq!(doc.paths().collect::<Vec<_>>(), ["a.txt", "b.txt"]);
//! assert_eq!(doc.to_string(), text);
//! ```

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{escaped, is_not, tag, take, take_until},
    character::complete::{anychar, char},
    combinator::{eof, map, rest, verify},
    sequence::{delimited, preceded, separated_pair, terminated},
};
use std::fmt;

/// The portion of a patch describing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSection {
    /// Repository-relative path (the `b/` side of the header)
    pub path: String,
    /// The `diff --git` line, including its line terminator
    pub header: String,
    /// Every line after the header up to the next header or end of text
    pub body: String,
}

impl DiffSection {
    /// Build a section from a header line and body, keyed by the header's path.
    ///
    /// Returns `None` if `header` is not a `diff --git` line.
    #[must_use]
    pub fn new(header: impl Into<String>, body: impl Into<String>) -> Option<Self> {
        let header = header.into();
        Some(Self {
            path: header_path(&header)?,
            header,
            body: body.into(),
        })
    }

    /// Total length in bytes of header and body
    pub fn len(&self) -> usize {
        self.header.len() + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ends_with_newline(&self) -> bool {
        if self.body.is_empty() {
            self.header.ends_with('\n')
        } else {
            self.body.ends_with('\n')
        }
    }
}

impl fmt::Display for DiffSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)?;
        f.write_str(&self.body)
    }
}

/// An ordered set of diff sections, unique by path.
///
/// Order is first-seen order for parsed text and insertion order for
/// documents built up section by section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchDocument {
    preamble: String,
    sections: Vec<DiffSection>,
}

impl PatchDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty document that renders `preamble` before its sections.
    pub fn with_preamble(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
            sections: Vec::new(),
        }
    }

    /// Split patch text into sections.
    ///
    /// A section starts at every line that parses as a `diff --git` header
    /// and runs until the next one. Text before the first header (mail
    /// headers from `git format-patch`, for instance) is kept as the
    /// preamble. Hunk content can never be mistaken for a header because
    /// every hunk line carries a `+`, `-`, ` ` or `\` prefix.
    ///
    /// A path that appears twice keeps its first position and its last body.
    pub fn parse(text: &str) -> Self {
        let mut doc = Self::new();
        let mut current: Option<DiffSection> = None;

        for line in text.split_inclusive('\n') {
            if let Some(path) = header_path(line) {
                let next = DiffSection {
                    path,
                    header: line.to_string(),
                    body: String::new(),
                };
                if let Some(done) = current.replace(next) {
                    doc.insert(done);
                }
            } else if let Some(section) = current.as_mut() {
                section.body.push_str(line);
            } else {
                doc.preamble.push_str(line);
            }
        }

        if let Some(done) = current {
            doc.insert(done);
        }

        doc
    }

    /// Text preceding the first section
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn sections(&self) -> &[DiffSection] {
        &self.sections
    }

    pub fn into_sections(self) -> Vec<DiffSection> {
        self.sections
    }

    /// Section paths in document order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.path.as_str())
    }

    pub fn get(&self, path: &str) -> Option<&DiffSection> {
        self.sections.iter().find(|s| s.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Add a section at the end, or replace the existing section for the same
    /// path where it stands.
    pub fn insert(&mut self, section: DiffSection) {
        match self.sections.iter_mut().find(|s| s.path == section.path) {
            Some(existing) => {
                log::warn!("Replacing duplicate section for {}", section.path);
                *existing = section;
            }
            None => self.sections.push(section),
        }
    }

    pub fn remove(&mut self, path: &str) -> Option<DiffSection> {
        let idx = self.sections.iter().position(|s| s.path == path)?;
        Some(self.sections.remove(idx))
    }

    /// Number of sections
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// True when the document has no sections (a preamble alone is not a patch)
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl fmt::Display for PatchDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preamble)?;
        let mut sections = self.sections.iter().peekable();
        while let Some(section) = sections.next() {
            write!(f, "{section}")?;
            // A section taken from the end of a file may lack its final newline
            if sections.peek().is_some() && !section.ends_with_newline() {
                f.write_str("\n")?;
            }
        }
        Ok(())
    }
}

/// Extract the path from a `diff --git` header line.
///
/// Returns the `b/` side, which is the path a patch creates or modifies.
///
/// ```
/// use git_patchwork::document::header_path;
///
/// assert_eq!(header_path("diff --git a/src/main.rs b/src/main.rs\n").as_deref(), Some("src/main.rs"));
/// assert_eq!(header_path("diff --git a/my file b/my file").as_deref(), Some("my file"));
/// assert_eq!(header_path("+diff --git a/x b/x"), None);
/// ```
pub fn header_path(line: &str) -> Option<String> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    git_header(line)
        .ok()
        .map(|(_, path)| path)
        .filter(|path| !path.is_empty())
}

fn git_header(input: &str) -> IResult<&str, String> {
    preceded(
        tag("diff --git "),
        alt((
            map(symmetric_names, str::to_string),
            quoted_names,
            renamed_names,
        )),
    )
    .parse(input)
}

/// `a/<path> b/<path>` with the same path on both sides.
///
/// Both halves have equal width, which makes paths containing spaces
/// unambiguous.
fn symmetric_names(input: &str) -> IResult<&str, &str> {
    // "a/" and " b/" account for five characters
    let width = input.chars().count().saturating_sub(5) / 2;
    map(
        terminated(
            verify(
                separated_pair(
                    preceded(tag("a/"), take(width)),
                    tag(" b/"),
                    take(width),
                ),
                |pair: &(&str, &str)| pair.0 == pair.1,
            ),
            eof,
        ),
        |(_, new)| new,
    )
    .parse(input)
}

/// `"a/<path>" "b/<path>"`, which git writes for names needing escapes.
fn quoted_names(input: &str) -> IResult<&str, String> {
    map(
        terminated(separated_pair(quoted, char(' '), quoted), eof),
        |(_, new)| strip_side(new, "b/"),
    )
    .parse(input)
}

/// `a/<old> b/<new>` for renames and copies.
fn renamed_names(input: &str) -> IResult<&str, String> {
    map(
        separated_pair(
            preceded(tag("a/"), take_until(" b/")),
            tag(" b/"),
            verify(rest, |new: &str| !new.is_empty()),
        ),
        |(_, new): (&str, &str)| new.to_string(),
    )
    .parse(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            escaped(is_not("\\\""), '\\', anychar),
            char('"'),
        ),
        unquote,
    )
    .parse(input)
}

fn strip_side(name: String, prefix: &str) -> String {
    if let Some(stripped) = name.strip_prefix(prefix) {
        return stripped.to_string();
    }
    name
}

/// Decode git's C-style quoting (`\t`, `\"`, `\\`, octal byte escapes).
fn unquote(raw: &str) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('n') => bytes.push(b'\n'),
            Some('r') => bytes.push(b'\r'),
            Some('t') => bytes.push(b'\t'),
            Some('v') => bytes.push(0x0b),
            Some(d @ '0'..='7') => {
                let mut value = d as u32 - '0' as u32;
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&o @ '0'..='7') => {
                            value = value * 8 + (o as u32 - '0' as u32);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                bytes.push(value as u8);
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}
