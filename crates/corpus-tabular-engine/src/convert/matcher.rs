use regex::Regex;

use crate::error::SchemaError;
use crate::schema::LinePattern;

use super::classify::LineInfo;

/// Outcome of testing a line against an attribute matcher.
///
/// `PartlyMatched` consumes the line and keeps the matcher pending, so a
/// single logical attribute can span several physical lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Failed,
    Matched,
    PartlyMatched,
}

/// A compiled line-recognition test.
#[derive(Debug)]
pub enum AttributeMatcher {
    EmptyLine,
    EmptyLines,
    Regex(Regex),
}

impl AttributeMatcher {
    pub fn compile(pattern: &LinePattern) -> Result<Self, SchemaError> {
        match pattern {
            LinePattern::EmptyLine => Ok(AttributeMatcher::EmptyLine),
            LinePattern::EmptyLines => Ok(AttributeMatcher::EmptyLines),
            LinePattern::Regex(pattern) => {
                let regex = Regex::new(pattern).map_err(|source| SchemaError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                Ok(AttributeMatcher::Regex(regex))
            }
        }
    }

    pub fn test(&self, line: &LineInfo<'_>) -> MatchOutcome {
        match self {
            AttributeMatcher::EmptyLine => {
                if line.is_blank {
                    MatchOutcome::Matched
                } else {
                    MatchOutcome::Failed
                }
            }
            AttributeMatcher::EmptyLines => {
                if line.is_blank {
                    MatchOutcome::PartlyMatched
                } else {
                    MatchOutcome::Failed
                }
            }
            AttributeMatcher::Regex(regex) => {
                if regex.is_match(line.content) {
                    MatchOutcome::Matched
                } else {
                    MatchOutcome::Failed
                }
            }
        }
    }

    /// Payload carried by a matched line: capture group 1 if the pattern has
    /// one, otherwise the whole line.
    pub fn payload<'a>(&self, line: &LineInfo<'a>) -> &'a str {
        match self {
            AttributeMatcher::EmptyLine | AttributeMatcher::EmptyLines => "",
            AttributeMatcher::Regex(regex) => regex
                .captures(line.content)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
                .unwrap_or(line.content),
        }
    }
}
