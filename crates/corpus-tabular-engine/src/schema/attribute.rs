use serde::{Deserialize, Serialize};

use super::resolver::ResolverSpec;

/// Which item a recognized attribute line applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeTarget {
    /// The value is held back and applied to the next item created.
    #[default]
    NextItem,
    /// The value is applied to the most recently created item.
    PreviousItem,
}

/// Line recognition rule for delimiters and free-form attribute lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinePattern {
    /// Matches exactly one empty line.
    EmptyLine,
    /// Matches a run of one or more empty lines.
    EmptyLines,
    /// Matches lines against a regular expression. If the expression has a
    /// capture group, group 1 is the attribute payload, otherwise the whole
    /// line is.
    Regex(String),
}

impl LinePattern {
    /// Well-known sentinel for [`LinePattern::EmptyLine`].
    pub const EMPTY_LINE: &'static str = "EMPTY_LINE";
    /// Well-known sentinel for [`LinePattern::EmptyLines`].
    pub const EMPTY_LINES: &'static str = "EMPTY_LINES";

    /// Resolves a declared pattern, mapping the well-known sentinels and
    /// treating everything else as a regular expression.
    pub fn named(pattern: &str) -> LinePattern {
        match pattern {
            Self::EMPTY_LINE => LinePattern::EmptyLine,
            Self::EMPTY_LINES => LinePattern::EmptyLines,
            other => LinePattern::Regex(other.to_string()),
        }
    }
}

/// A line-recognition rule, optionally carrying a resolver for the data the
/// matched line holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub pattern: LinePattern,
    pub target: AttributeTarget,
    pub resolver: Option<ResolverSpec>,
}

impl AttributeSchema {
    pub fn new(pattern: LinePattern) -> Self {
        Self {
            pattern,
            target: AttributeTarget::default(),
            resolver: None,
        }
    }

    pub fn empty_line() -> Self {
        Self::new(LinePattern::EmptyLine)
    }

    pub fn empty_lines() -> Self {
        Self::new(LinePattern::EmptyLines)
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::new(LinePattern::Regex(pattern.into()))
    }

    pub fn with_target(mut self, target: AttributeTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverSpec) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_resolve_to_empty_line_patterns() {
        assert_eq!(LinePattern::named("EMPTY_LINE"), LinePattern::EmptyLine);
        assert_eq!(LinePattern::named("EMPTY_LINES"), LinePattern::EmptyLines);
    }

    #[test]
    fn other_patterns_are_regexes() {
        assert_eq!(
            LinePattern::named("^#\\s*(.+)$"),
            LinePattern::Regex("^#\\s*(.+)$".to_string())
        );
    }
}
