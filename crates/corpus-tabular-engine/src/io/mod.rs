use relative_path::RelativePath;
use std::fs;
use std::path::{Path, PathBuf};

use crate::convert::{ConvertOptions, ConvertReport, TableConverter};
use crate::error::ConvertError;
use crate::model::ConversionTarget;
use crate::schema::TableSchema;

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("Corpus file not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid corpus directory: {0}")]
    InvalidCorpusDir(String),
}

/// Read a corpus file and return its content
pub fn read_corpus_file(
    relative_path: &RelativePath,
    corpus_root: &Path,
) -> Result<String, IoError> {
    let absolute_path = relative_path.to_path(corpus_root);
    if !absolute_path.exists() {
        return Err(IoError::NotFound(absolute_path));
    }
    fs::read_to_string(&absolute_path).map_err(IoError::Io)
}

/// Scan for corpus files with the given extension in the corpus directory
pub fn scan_corpus_files(corpus_root: &Path, extension: &str) -> Result<Vec<PathBuf>, IoError> {
    if !corpus_root.exists() {
        return Err(IoError::InvalidCorpusDir(
            "corpus directory not found".to_string(),
        ));
    }

    let mut files = Vec::new();
    scan_directory_recursive(corpus_root, extension, &mut files)?;
    files.sort();
    tracing::debug!(count = files.len(), "corpus files scanned");
    Ok(files)
}

fn scan_directory_recursive(
    dir: &Path,
    extension: &str,
    files: &mut Vec<PathBuf>,
) -> Result<(), IoError> {
    let entries = fs::read_dir(dir).map_err(IoError::Io)?;

    for entry in entries {
        let entry = entry.map_err(IoError::Io)?;
        let path = entry.path();

        if path.is_dir() {
            scan_directory_recursive(&path, extension, files)?;
        } else if let Some(ext) = path.extension()
            && ext == extension
        {
            files.push(path);
        }
    }

    Ok(())
}

pub fn validate_corpus_dir(path: &Path) -> Result<(), IoError> {
    if !path.exists() || !path.is_dir() {
        return Err(IoError::InvalidCorpusDir(
            "Directory does not exist".to_string(),
        ));
    }

    Ok(())
}

/// Reads one corpus file and converts it in a single run.
pub fn convert_corpus_file(
    schema: &TableSchema,
    target: ConversionTarget,
    options: ConvertOptions,
    relative_path: &RelativePath,
    corpus_root: &Path,
) -> Result<ConvertReport, ConvertError> {
    let absolute_path = relative_path.to_path(corpus_root);
    let text = match read_corpus_file(relative_path, corpus_root) {
        Ok(text) => text,
        Err(IoError::Io(source)) => {
            return Err(ConvertError::Io {
                path: absolute_path,
                source,
            });
        }
        Err(other) => {
            return Err(ConvertError::Io {
                path: absolute_path,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, other.to_string()),
            });
        }
    };
    tracing::debug!(path = %absolute_path.display(), "converting corpus file");
    let converter = TableConverter::new(schema, target, options)?;
    converter.convert_str(&text)
}
