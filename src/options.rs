//! Options controlling how a sheet is decoded

use encoding_rs::Encoding;
use std::collections::HashMap;

/// Which row, if any, provides column labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderMode {
    /// No header; keys are column letters
    #[default]
    Off,
    /// The first row decoded is the header
    FirstRow,
    /// The row with this 1-based row number is the header
    RowNumber(u32),
}

/// How number-format ids map to format codes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NumberFormatOption {
    /// Codes declared in the workbook, standard codes for built-in ids
    #[default]
    Standard,
    /// Like `Standard`, with a spreadsheet application's variants for the
    /// built-in ids where they differ (four-digit years and similar)
    BuiltInTable,
    /// Caller-supplied codes keyed by format id; ids not in the map use
    /// the workbook's codes
    Custom(HashMap<u32, String>),
}

/// Per-sheet decoding options
///
/// # Examples
///
/// ```
/// use xlsxstream::{HeaderMode, SheetOptions};
///
/// let options = SheetOptions::new()
///     .with_header(HeaderMode::FirstRow)
///     .with_ignore_empty(true)
///     .with_fill_merged_cells(true);
/// assert!(options.ignore_empty);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SheetOptions {
    pub header: HeaderMode,
    /// Skip rows with no cells
    pub ignore_empty: bool,
    /// Copy merge anchor values into every covered cell
    pub fill_merged_cells: bool,
    pub number_format: NumberFormatOption,
    /// Encoding of the archive's XML parts; `None` means UTF-8
    pub text_encoding: Option<&'static Encoding>,
}

impl SheetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header row
    pub fn with_header(mut self, header: HeaderMode) -> Self {
        self.header = header;
        self
    }

    /// Skip rows without cells
    pub fn with_ignore_empty(mut self, ignore: bool) -> Self {
        self.ignore_empty = ignore;
        self
    }

    /// Propagate merged-cell values
    pub fn with_fill_merged_cells(mut self, fill: bool) -> Self {
        self.fill_merged_cells = fill;
        self
    }

    /// Set the number-format mode
    pub fn with_number_format(mut self, number_format: NumberFormatOption) -> Self {
        self.number_format = number_format;
        self
    }

    /// Decode the archive's XML parts from this encoding
    pub fn with_text_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.text_encoding = Some(encoding);
        self
    }
}

/// Identifies a worksheet by 0-based position or by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl From<usize> for SheetSelector {
    fn from(index: usize) -> Self {
        SheetSelector::Index(index)
    }
}

impl From<&str> for SheetSelector {
    fn from(name: &str) -> Self {
        SheetSelector::Name(name.to_string())
    }
}

impl From<String> for SheetSelector {
    fn from(name: String) -> Self {
        SheetSelector::Name(name)
    }
}

impl std::fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetSelector::Index(i) => write!(f, "#{}", i),
            SheetSelector::Name(name) => write!(f, "{}", name),
        }
    }
}

/// One sheet of a multi-sheet session
#[derive(Debug, Clone)]
pub struct SheetRequest {
    pub selector: SheetSelector,
    pub options: SheetOptions,
}

impl SheetRequest {
    pub fn new(selector: impl Into<SheetSelector>, options: SheetOptions) -> Self {
        SheetRequest {
            selector: selector.into(),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SheetOptions::default();
        assert_eq!(options.header, HeaderMode::Off);
        assert!(!options.ignore_empty);
        assert!(!options.fill_merged_cells);
        assert_eq!(options.number_format, NumberFormatOption::Standard);
        assert!(options.text_encoding.is_none());
    }

    #[test]
    fn test_builder() {
        let options = SheetOptions::new()
            .with_header(HeaderMode::RowNumber(3))
            .with_number_format(NumberFormatOption::BuiltInTable)
            .with_text_encoding(encoding_rs::WINDOWS_1252);
        assert_eq!(options.header, HeaderMode::RowNumber(3));
        assert_eq!(options.number_format, NumberFormatOption::BuiltInTable);
        assert_eq!(options.text_encoding, Some(encoding_rs::WINDOWS_1252));
    }

    #[test]
    fn test_selectors() {
        assert_eq!(SheetSelector::from(2), SheetSelector::Index(2));
        assert_eq!(SheetSelector::from("Data"), SheetSelector::Name("Data".to_string()));
        assert_eq!(SheetSelector::Index(0).to_string(), "#0");
        let request = SheetRequest::new("Data", SheetOptions::default());
        assert_eq!(request.selector.to_string(), "Data");
    }
}
