//! Error types for the xlsxstream library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for xlsxstream operations
pub type Result<T> = std::result::Result<T, XlsxStreamError>;

/// Main error type for all decoding operations
#[derive(Error, Debug)]
pub enum XlsxStreamError {
    /// The workbook file does not exist
    #[error("Workbook not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The archive is unreadable, or a required part is missing or malformed
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// A cell or row element could not be decoded
    #[error("Malformed cell in row {row}: {reason}")]
    MalformedCell { row: u32, reason: String },

    /// A number-format pattern could not be interpreted
    ///
    /// The row decoder recovers from this locally and leaves the value
    /// unformatted, so it only reaches callers of the formatter directly.
    #[error("Invalid number format pattern: {0}")]
    InvalidFormatPattern(String),

    /// Requested sheet is not part of the workbook
    #[error("Sheet '{sheet}' not found. Available sheets: {available}")]
    SheetNotFound { sheet: String, available: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl XlsxStreamError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        XlsxStreamError::CorruptArchive(msg.into())
    }

    pub(crate) fn malformed(row: u32, reason: impl Into<String>) -> Self {
        XlsxStreamError::MalformedCell {
            row,
            reason: reason.into(),
        }
    }
}

impl From<quick_xml::Error> for XlsxStreamError {
    fn from(err: quick_xml::Error) -> Self {
        XlsxStreamError::CorruptArchive(format!("XML error: {}", err))
    }
}

impl From<quick_xml::events::attributes::AttrError> for XlsxStreamError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        XlsxStreamError::CorruptArchive(format!("XML attribute error: {}", err))
    }
}
