//! # xlsxstream
//!
//! Streaming row decoder for XLSX worksheets.
//!
//! ## Features
//!
//! - **Streaming Read**: rows are decoded one at a time straight from the
//!   compressed archive; the workbook is never loaded into memory
//! - **Typed Values**: every cell comes out raw and formatted, with
//!   numeric-looking text coerced to numbers
//! - **Number Formats**: built-in and custom format codes, including dates,
//!   fractions, scientific notation and conditional sections
//! - **Headers**: promote any row to column labels
//! - **Merged Cells**: optionally copy anchor values into every covered cell
//! - **Multiple Sheets**: stream several sheets from one file handle, in any
//!   interleaving
//! - **Progress**: each record reports how much of the worksheet was read
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xlsxstream::{open_sheet_stream, HeaderMode, SheetOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = SheetOptions::new()
//!     .with_header(HeaderMode::FirstRow)
//!     .with_ignore_empty(true);
//!
//! for record in open_sheet_stream("data.xlsx", "Sheet1", options)? {
//!     let record = record?;
//!     println!("{:?}", record.formatted.by_column);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Several sheets
//!
//! ```rust,no_run
//! use xlsxstream::{open_sheet_streams, SheetOptions, SheetRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let requests = vec![
//!     SheetRequest::new(0, SheetOptions::default()),
//!     SheetRequest::new("Totals", SheetOptions::new().with_fill_merged_cells(true)),
//! ];
//!
//! for sheet in open_sheet_streams("data.xlsx", requests)? {
//!     let sheet = sheet?;
//!     let name = sheet.name().to_string();
//!     let rows = sheet.count();
//!     println!("{}: {} rows", name, rows);
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod archive;
pub mod decoder;
pub mod error;
pub mod format;
pub mod io;
pub mod merge;
pub mod options;
pub mod session;
pub mod tables;
pub mod types;
pub mod xml;

pub use error::{Result, XlsxStreamError};
pub use format::{FormatCode, NumberFormatter};
pub use options::{HeaderMode, NumberFormatOption, SheetOptions, SheetRequest, SheetSelector};
pub use session::{SheetStream, SheetStreams, Workbook};
pub use types::{CellValue, RowRecord, RowView, SheetVisibility, WorksheetInfo};

use encoding_rs::Encoding;
use std::path::Path;

/// Open one worksheet as a stream of records
///
/// The sheet is selected by 0-based index or by name. The file is closed
/// once the stream has been read to the end.
pub fn open_sheet_stream<P: AsRef<Path>>(
    path: P,
    sheet: impl Into<SheetSelector>,
    options: SheetOptions,
) -> Result<SheetStream> {
    session::open_single(path, sheet.into(), options)
}

/// Open several worksheets of one file
///
/// Streams are produced in request order, each opened when the iterator
/// reaches it. Workbook-level parts are decoded with the first request's
/// text encoding.
pub fn open_sheet_streams<P: AsRef<Path>>(
    path: P,
    requests: Vec<SheetRequest>,
) -> Result<SheetStreams> {
    SheetStreams::open(path, requests)
}

/// Names and visibility of the worksheets in a file
///
/// # Examples
///
/// ```no_run
/// let sheets = xlsxstream::list_worksheets("data.xlsx")?;
/// for sheet in sheets.iter().filter(|s| !s.hidden()) {
///     println!("{}", sheet.name);
/// }
/// # Ok::<(), xlsxstream::XlsxStreamError>(())
/// ```
pub fn list_worksheets<P: AsRef<Path>>(path: P) -> Result<Vec<WorksheetInfo>> {
    list_worksheets_with_encoding(path, None)
}

/// Like [`list_worksheets`] for workbooks whose parts use another encoding
pub fn list_worksheets_with_encoding<P: AsRef<Path>>(
    path: P,
    encoding: Option<&'static Encoding>,
) -> Result<Vec<WorksheetInfo>> {
    let archive = archive::Archive::open(path)?;
    let sheets = tables::read_worksheets(&archive, encoding);
    archive.close();
    sheets
}
