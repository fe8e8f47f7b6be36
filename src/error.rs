//! Error types for the conversion pipeline.

use thiserror::Error;

/// Fatal conversion failures. Each one aborts the run after the working
/// directory has been released.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The input is not a readable ZIP container.
    #[error("invalid ZIP archive: {0}")]
    InvalidArchive(String),

    /// No `.html` file at the effective root of the archive.
    #[error("no HTML file found in the root of the archive (or within a single nested folder)")]
    NoHtmlFile,

    /// More than one `.html` file at the effective root.
    #[error("multiple HTML files ({count}) found in the root of the archive; exactly one is required")]
    MultipleHtmlFiles { count: usize },

    /// The markup could not be turned into a traversable tree.
    #[error("could not parse the HTML document: {0}")]
    HtmlParseError(String),

    /// A single asset failed to import. Collected per run rather than raised
    /// by the pipeline, but representable for callers that escalate it.
    #[error("asset '{path}' could not be imported: {message}")]
    AssetStore { path: String, message: String },

    /// The caller failed to persist the converted story.
    #[error("failed to create the story post: {0}")]
    PostCreationFailed(String),

    /// Working-directory or file IO.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for ConversionError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => ConversionError::InvalidArchive(io.to_string()),
            other => ConversionError::InvalidArchive(other.to_string()),
        }
    }
}

/// Failure reported by a media store for one file.
#[derive(Error, Debug)]
pub enum MediaStoreError {
    #[error("file type '{0}' is not allowed")]
    DisallowedType(String),

    #[error("could not store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Rejected(String),
}

/// Problems reading the JSON configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}
