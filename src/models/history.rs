use chrono::NaiveDateTime;

/// Timestamp layout of a history line, e.g. `2024-05-01 14:03:59`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SEPARATOR: &str = ": ";

/// One applied transformation, as recorded in the deployment history log.
///
/// On disk an entry is a single line `"<timestamp>: <description>"`. The
/// description is the only thing a later reverse run has to go on, so it is
/// never rewritten once recorded. Descriptions written by this crate end with
/// the transformation id in brackets (`Set DEBUG to False [debug-flag]`);
/// older logs without the tag are still understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub description: String,
}

impl HistoryEntry {
    /// Build an entry for `message`, tagged with the transformation `id`.
    pub fn new(at: NaiveDateTime, message: &str, id: &str) -> Self {
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            description: format!("{message} [{id}]"),
        }
    }

    /// Parse a log line. Returns `None` for lines without the `": "` separator.
    ///
    /// Only the first separator splits; descriptions may contain `": "` themselves.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let (timestamp, description) = line.split_once(SEPARATOR)?;
        Some(Self {
            timestamp: timestamp.to_string(),
            description: description.trim().to_string(),
        })
    }

    pub fn to_line(&self) -> String {
        format!("{}{}{}", self.timestamp, SEPARATOR, self.description)
    }

    /// The bracketed transformation id at the end of the description, if any.
    pub fn tag(&self) -> Option<&str> {
        let rest = self.description.strip_suffix(']')?;
        let open = rest.rfind(" [")?;
        let tag = &rest[open + 2..];
        (!tag.is_empty() && !tag.contains(char::is_whitespace)).then_some(tag)
    }

    /// The human-readable part of the description, without the id tag.
    pub fn message(&self) -> &str {
        match self.tag() {
            Some(tag) => &self.description[..self.description.len() - tag.len() - 3],
            None => &self.description,
        }
    }
}
