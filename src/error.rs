//! Error types for epubq operations.

use thiserror::Error;

/// Errors that can occur while loading, repairing or checking a package.
///
/// Quality findings are not errors; see [`crate::validate::Finding`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The descriptor or navigation map is missing, or the package root
    /// cannot be determined.
    #[error("cannot load package: {0}")]
    Load(String),

    /// A document exists but is not well-formed enough to be used.
    #[error("cannot parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("new file name is already taken by other file: {0}")]
    RenameCollision(String),

    #[error("no manifest item with href {0}")]
    MissingResource(String),

    /// Metadata a repair pass depends on is absent.
    #[error("{0}")]
    Validation(String),
}

impl Error {
    pub(crate) fn parse(path: impl Into<String>, reason: impl ToString) -> Self {
        Error::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
