use std::path::PathBuf;

use thiserror::Error;

/// Reasons an `index.theme` file is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty file")]
    EmptyFile,
    #[error("line {line}: malformed group header")]
    MalformedHeader { line: usize },
    #[error("line {line}: duplicate group {group:?}")]
    DuplicateGroup { line: usize, group: String },
    #[error("line {line}: first group must be 'Icon Theme'")]
    FirstGroupNotIconTheme { line: usize },
    #[error("line {line}: unexpected content before first header")]
    ContentBeforeHeader { line: usize },
    #[error("line {line}: malformed key-value pair")]
    MalformedEntry { line: usize },
    #[error("line {line}: invalid Type {value:?} - expected 'Fixed', 'Scalable' or 'Threshold'")]
    InvalidType { line: usize, value: String },
    #[error("line {line}: invalid value for {key} - expected a number")]
    InvalidNumber { line: usize, key: String },
    #[error("group {group:?} is missing required key '{key}'")]
    MissingKey { group: String, key: &'static str },
    #[error("group {group:?}: size and threshold exceed the integer range")]
    SizeOutOfRange { group: String },
    #[error("malformed theme name {0:?}")]
    MalformedName(String),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}
