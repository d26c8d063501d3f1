use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Prose
// ---------------------------------------------------------------------------

/// A document text field that may carry balanced inline XML markup.
///
/// Two storage forms share one type:
/// - plain text: the literal (unescaped) character content, kept exactly;
/// - markup: canonical inner XML — child elements verbatim, text nodes
///   whitespace-compacted and entity-escaped.
///
/// The flag decides whether the serializer escapes the payload or writes it
/// through raw, so a plain-text field containing `<` never produces broken
/// output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prose {
    raw: String,
    markup: bool,
}

impl Prose {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            raw: s.into(),
            markup: false,
        }
    }

    pub fn markup(s: impl Into<String>) -> Self {
        Self {
            raw: s.into(),
            markup: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn has_markup(&self) -> bool {
        self.markup
    }

    /// The stored payload: literal text, or canonical inner XML.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Prose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Prose {
    fn from(s: &str) -> Self {
        Prose::text(s)
    }
}

impl From<String> for Prose {
    fn from(s: String) -> Self {
        Prose::text(s)
    }
}

// JSON projections only ever need the payload, not the storage flag.
impl Serialize for Prose {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// Whitespace compaction
// ---------------------------------------------------------------------------

static WS_RE: OnceLock<Regex> = OnceLock::new();

fn ws_re() -> &'static Regex {
    WS_RE.get_or_init(|| Regex::new(r"[ \t\r\n]+").unwrap())
}

/// Collapse whitespace runs (tabs and newlines included) to a single space.
/// Applied to text nodes inside markup-bearing prose; plain-text fields are
/// never compacted.
pub fn compact_ws(s: &str) -> String {
    ws_re().replace_all(s, " ").into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
