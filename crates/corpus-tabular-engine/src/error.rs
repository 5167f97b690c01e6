use std::path::PathBuf;

/// Definition errors: the schema itself is unusable.
///
/// Raised while validating a schema or while compiling it into a runtime
/// handler tree, always before the first line of input is read.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown layer `{0}` referenced by schema")]
    UnknownLayer(String),
    #[error("annotation `{key}` is not declared on layer `{layer}`")]
    UnknownAnnotation { layer: String, key: String },
    #[error("unknown resolver `{0}`")]
    UnknownResolver(String),
    #[error("invalid line pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("block targeting `{0}` declares neither columns nor nested blocks")]
    EmptyBlock(String),
    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),
    #[error("column `{0}` needs an annotation key, a resolver, or the ignore flag")]
    UnboundColumn(String),
    #[error("column `{column}` declares more than one {kind} substitute")]
    DuplicateSubstitute { column: String, kind: String },
    #[error("layer `{layer}` has no {collaborator} wired for resolver `{resolver}`")]
    MissingCollaborator {
        layer: String,
        collaborator: String,
        resolver: String,
    },
    #[error("invalid resolver option `{key}`: {message}")]
    Option { key: String, message: String },
}

/// Errors raised while converting one file.
///
/// Content errors abort the current file and carry the physical line number
/// plus the offending text; nothing converted so far is published.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("line {line}: {reason} (`{text}`)")]
    Content {
        line: usize,
        text: String,
        reason: String,
    },
    #[error("failed to read corpus file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("buffer position {position} exceeds maximum index {max}")]
    Capacity { position: usize, max: usize },
}

impl ConvertError {
    pub fn content(line: usize, text: impl Into<String>, reason: impl Into<String>) -> Self {
        ConvertError::Content {
            line,
            text: text.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_error_carries_position_and_text() {
        let err = ConvertError::content(17, "a\tb", "expected 3 fields, found 2");
        assert_eq!(
            err.to_string(),
            "line 17: expected 3 fields, found 2 (`a\tb`)"
        );
    }

    #[test]
    fn schema_error_converts_into_convert_error() {
        let err: ConvertError = SchemaError::UnknownLayer("tokens".into()).into();
        assert!(matches!(err, ConvertError::Schema(_)));
    }
}
