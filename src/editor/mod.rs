//! Line- and block-level edits over text files.
//!
//! The editor knows nothing about what an edit means. It offers the four edit
//! modes every transformation is built from:
//!
//! - **line filter**: drop every line matching a predicate
//! - **line replace**: swap every matching line for a fixed line
//! - **block replace**: swap a brace-balanced assignment (e.g. `DATABASES = {...}`)
//!   for a fixed block, appending the block when the assignment is absent
//! - **append**: add fixed text at the end of the file
//!
//! All modes are total: a missing marker leaves the file unchanged (or, for
//! block replace, degrades to an append). The free functions re-read the file
//! and write it back before returning. Block replace lives on [`TextDocument`]
//! only, since every caller combines it with other edits in one read/write cycle.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};

/// What a block replace did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEdit {
    Replaced,
    Appended,
}

/// A text file loaded into memory for editing.
#[derive(Debug, Clone)]
pub struct TextDocument {
    path: PathBuf,
    text: String,
}

impl TextDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    /// Whether any line (without its line ending) satisfies `pred`.
    pub fn has_line(&self, pred: impl Fn(&str) -> bool) -> bool {
        self.text.lines().any(|line| pred(line))
    }

    /// Remove every line matching `remove`. Returns the number of lines removed.
    pub fn filter_lines(&mut self, remove: impl Fn(&str) -> bool) -> usize {
        self.filter_numbered(|_, line| remove(line))
    }

    /// Like [`filter_lines`](Self::filter_lines), but the predicate also sees the
    /// zero-based line number.
    pub fn filter_numbered(&mut self, mut remove: impl FnMut(usize, &str) -> bool) -> usize {
        let mut removed = 0;
        let mut out = String::with_capacity(self.text.len());
        for (number, line) in self.text.split_inclusive('\n').enumerate() {
            if remove(number, strip_eol(line)) {
                removed += 1;
            } else {
                out.push_str(line);
            }
        }
        self.text = out;
        removed
    }

    /// Replace every line matching `matches` with `replacement`.
    ///
    /// Lines that already read as `replacement` (ignoring whitespace) keep
    /// their formatting and are not counted. Returns the number of lines
    /// that changed.
    pub fn replace_lines(&mut self, matches: impl Fn(&str) -> bool, replacement: &str) -> usize {
        let mut replaced = 0;
        let mut out = String::with_capacity(self.text.len());
        for line in self.text.split_inclusive('\n') {
            let content = strip_eol(line);
            if matches(content) && !same_tokens(content, replacement) {
                replaced += 1;
                out.push_str(replacement);
                out.push('\n');
            } else {
                out.push_str(line);
            }
        }
        self.text = out;
        replaced
    }

    /// Insert `new_line` directly after the first line matching `anchor`.
    /// Returns false (and leaves the document alone) when no line matches.
    pub fn insert_after(&mut self, anchor: impl Fn(&str) -> bool, new_line: &str) -> bool {
        let mut inserted = false;
        let mut out = String::with_capacity(self.text.len() + new_line.len() + 1);
        for line in self.text.split_inclusive('\n') {
            out.push_str(line);
            if !inserted && anchor(strip_eol(line)) {
                if !line.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(new_line);
                out.push('\n');
                inserted = true;
            }
        }
        self.text = out;
        inserted
    }

    /// Rewrite every match of `pattern` with `replacement` (`$1`-style groups
    /// allowed). Returns the number of matches.
    pub fn replace_pattern(&mut self, pattern: &Regex, replacement: &str) -> usize {
        let count = pattern.find_iter(&self.text).count();
        if count > 0 {
            self.text = pattern.replace_all(&self.text, replacement).into_owned();
        }
        count
    }

    /// Put `line` on its own line at the very top of the document.
    pub fn prepend_line(&mut self, line: &str) {
        self.text = format!("{line}\n{}", self.text);
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn has_block(&self, opener: &Regex) -> bool {
        find_block(&self.text, opener).is_some()
    }

    /// Replace the brace-balanced block introduced by `opener` with `block`,
    /// or append `block` when no such block exists.
    pub fn replace_block(&mut self, opener: &Regex, block: &str) -> BlockEdit {
        let edit = match find_block(&self.text, opener) {
            Some(range) => {
                self.text.replace_range(range, block.trim());
                BlockEdit::Replaced
            }
            None => {
                let head = self.text.trim_end().to_string();
                self.text = if head.is_empty() {
                    block.trim().to_string()
                } else {
                    format!("{head}\n\n{}", block.trim())
                };
                BlockEdit::Appended
            }
        };
        self.normalize_trailing();
        edit
    }

    /// Remove every brace-balanced block introduced by `opener`.
    /// Returns the number of blocks removed.
    pub fn remove_blocks(&mut self, opener: &Regex) -> usize {
        let mut removed = 0;
        while let Some(range) = find_block(&self.text, opener) {
            let end = if self.text[range.end..].starts_with('\n') {
                range.end + 1
            } else {
                range.end
            };
            self.text.replace_range(range.start..end, "");
            removed += 1;
        }
        if removed > 0 {
            self.normalize_trailing();
        }
        removed
    }

    fn normalize_trailing(&mut self) {
        let trimmed = self.text.trim_end().len();
        self.text.truncate(trimmed);
        self.text.push('\n');
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, &self.text).map_err(|e| Error::io(&self.path, e))
    }
}

/// Line filter: rewrite `path` without the lines matching `remove`.
pub fn filter_lines(path: impl AsRef<Path>, remove: impl Fn(&str) -> bool) -> Result<usize> {
    let mut doc = TextDocument::open(path)?;
    let removed = doc.filter_lines(remove);
    doc.save()?;
    Ok(removed)
}

/// Line replace: rewrite `path` with every matching line swapped for `replacement`.
pub fn replace_lines(
    path: impl AsRef<Path>,
    matches: impl Fn(&str) -> bool,
    replacement: &str,
) -> Result<usize> {
    let mut doc = TextDocument::open(path)?;
    let replaced = doc.replace_lines(matches, replacement);
    doc.save()?;
    Ok(replaced)
}

/// Append `text` to an existing file.
pub fn append(path: impl AsRef<Path>, text: &str) -> Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| Error::io(path, e))
}

fn same_tokens(a: &str, b: &str) -> bool {
    a.chars()
        .filter(|c| !c.is_whitespace())
        .eq(b.chars().filter(|c| !c.is_whitespace()))
}

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches('\n').trim_end_matches('\r')
}

/// Locate the block whose header matches `opener` (which must end at the
/// opening brace) and extends to the matching closing brace.
///
/// Braces inside quoted strings are ignored. An unterminated block is
/// treated as absent.
fn find_block(text: &str, opener: &Regex) -> Option<Range<usize>> {
    let header = opener.find(text)?;
    let open = text[header.start()..header.end()].rfind('{')? + header.start();

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(header.start()..open + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}
