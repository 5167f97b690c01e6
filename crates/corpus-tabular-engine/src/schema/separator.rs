use serde::{Deserialize, Serialize};

/// Column separator used to split a content line into fields.
///
/// The named variants cover the separators tabular corpus formats actually
/// use; anything else is treated as a literal delimiter string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Separator {
    /// A single tab character.
    Tab,
    /// A single space character.
    Space,
    /// Any single whitespace character.
    Whitespace,
    /// A run of one or more whitespace characters.
    Whitespaces,
    /// A literal delimiter string.
    Literal(String),
}

impl Separator {
    pub const TAB: &'static str = "TAB";
    pub const SPACE: &'static str = "SPACE";
    pub const WHITESPACE: &'static str = "WHITESPACE";
    pub const WHITESPACES: &'static str = "WHITESPACES";

    /// Resolves a declared separator name, falling back to a literal.
    pub fn named(name: &str) -> Separator {
        match name {
            Self::TAB => Separator::Tab,
            Self::SPACE => Separator::Space,
            Self::WHITESPACE => Separator::Whitespace,
            Self::WHITESPACES => Separator::Whitespaces,
            other => Separator::Literal(other.to_string()),
        }
    }

    /// Splits `text` into field spans, appending `(start, end)` byte ranges
    /// to `out`. Reuses the caller's buffer so the per-line path does not
    /// allocate.
    pub fn split_spans(&self, text: &str, out: &mut Vec<(usize, usize)>) {
        if text.is_empty() {
            return;
        }
        match self {
            Separator::Tab => split_on_char(text, '\t', out),
            Separator::Space => split_on_char(text, ' ', out),
            Separator::Whitespace => {
                let mut start = 0;
                for (i, c) in text.char_indices() {
                    if c.is_whitespace() {
                        out.push((start, i));
                        start = i + c.len_utf8();
                    }
                }
                out.push((start, text.len()));
            }
            Separator::Whitespaces => {
                let mut start = None;
                for (i, c) in text.char_indices() {
                    if c.is_whitespace() {
                        if let Some(s) = start.take() {
                            out.push((s, i));
                        }
                    } else if start.is_none() {
                        start = Some(i);
                    }
                }
                if let Some(s) = start {
                    out.push((s, text.len()));
                }
            }
            Separator::Literal(sep) => {
                if sep.is_empty() {
                    out.push((0, text.len()));
                    return;
                }
                let mut start = 0;
                while let Some(found) = text[start..].find(sep.as_str()) {
                    out.push((start, start + found));
                    start = start + found + sep.len();
                }
                out.push((start, text.len()));
            }
        }
    }
}

fn split_on_char(text: &str, sep: char, out: &mut Vec<(usize, usize)>) {
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == sep {
            out.push((start, i));
            start = i + c.len_utf8();
        }
    }
    out.push((start, text.len()));
}
