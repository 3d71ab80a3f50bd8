//! Type definitions for decoded worksheet data

use indexmap::IndexMap;
use std::fmt;

/// Represents a single decoded cell value
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CellValue {
    /// No cell at this position, or a merged cell whose anchor was never seen
    #[default]
    Empty,
    /// Numeric value (also dates, booleans and numeric-looking text)
    Number(f64),
    /// Text value
    String(String),
    /// The cell was present but decoding produced nothing
    /// (no value child, or a shared-string index out of range)
    Unresolved,
}

impl CellValue {
    /// Build a value from cell text, coercing numeric-looking text to a number
    pub fn coerce(text: &str) -> Self {
        match parse_number(text) {
            Some(n) => CellValue::Number(n),
            None => CellValue::String(text.to_string()),
        }
    }

    /// Re-apply the numeric coercion to an already decoded value
    pub fn recoerce(self) -> Self {
        match self {
            CellValue::String(s) => match parse_number(&s) {
                Some(n) => CellValue::Number(n),
                None => CellValue::String(s),
            },
            other => other,
        }
    }

    /// Convert cell value to string
    pub fn as_string(&self) -> String {
        match self {
            CellValue::Empty | CellValue::Unresolved => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Number(n) => number_to_string(*n),
        }
    }

    /// Check if cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Try to convert to float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// Try to convert to integer
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Number(f)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Number(i as f64)
    }
}

/// Parse text the way a spreadsheet cell value is read as a number
///
/// Accepts optional surrounding whitespace, a sign, decimal digits with an
/// optional fraction and exponent, and `0x`/`0o`/`0b` prefixed integers.
/// Empty text and spelled-out infinities or NaN are not numbers.
pub fn parse_number(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }

    let radix = match t.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&t[2..], radix).ok().map(|n| n as f64);
    }

    let body = t.strip_prefix(['+', '-']).unwrap_or(t);
    if body == "Infinity" {
        return Some(if t.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    // reject what f64::from_str accepts beyond plain decimal notation
    let plain = body
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !plain || !body.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    t.parse::<f64>().ok()
}

/// Render a number the way it reads in a sheet: integers without a fraction
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        let mut buf = itoa::Buffer::new();
        return buf.format(n as i64).to_string();
    }
    n.to_string()
}

/// Cell type tag from the `t` attribute of a cell element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellType {
    /// `n` or no tag
    Number,
    /// `s`: value is an index into the shared strings table
    SharedString,
    /// `inlineStr`: text lives in the cell itself
    InlineString,
    /// `b`
    Boolean,
    /// Anything else (`str`, `e`, `d`, ...)
    Other(String),
}

impl CellType {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            None | Some("n") => CellType::Number,
            Some("s") => CellType::SharedString,
            Some("inlineStr") => CellType::InlineString,
            Some("b") => CellType::Boolean,
            Some(other) => CellType::Other(other.to_string()),
        }
    }

    /// Whether values of this type keep their text untouched
    pub fn is_string(&self) -> bool {
        matches!(self, CellType::SharedString | CellType::InlineString)
    }
}

/// One view of a decoded row: positional values plus a keyed map
///
/// `values[i]` holds column `i + 1`; positions without a cell are
/// [`CellValue::Empty`]. `by_column` is keyed by column letters, or by header
/// label once a header row has been captured.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RowView {
    pub values: Vec<CellValue>,
    pub by_column: IndexMap<String, CellValue>,
}

impl RowView {
    /// Get value at a 0-based position
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.values.get(index)
    }

    /// Get value by key (column letters or header label)
    pub fn get_by_key(&self, key: &str) -> Option<&CellValue> {
        self.by_column.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert row to vector of strings
    pub fn to_strings(&self) -> Vec<String> {
        self.values.iter().map(|c| c.as_string()).collect()
    }
}

/// One emitted row of a worksheet
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RowRecord {
    /// 1-based row number in the sheet
    pub row_number: u32,
    /// Values before number formatting
    pub raw: RowView,
    /// Values after number formatting
    pub formatted: RowView,
    /// Header labels, empty until a header row has been captured
    pub header: Vec<String>,
    /// Uncompressed worksheet bytes read so far
    pub bytes_consumed: u64,
    /// Uncompressed size of the worksheet part
    pub total_size: u64,
}

impl RowRecord {
    /// Whether the row carried no cells at all
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Visibility state of a sheet in the workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

impl SheetVisibility {
    pub fn from_state(state: Option<&str>) -> Self {
        match state {
            Some("hidden") => SheetVisibility::Hidden,
            Some("veryHidden") => SheetVisibility::VeryHidden,
            _ => SheetVisibility::Visible,
        }
    }
}

/// Name and visibility of one worksheet
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WorksheetInfo {
    pub name: String,
    pub visibility: SheetVisibility,
}

impl WorksheetInfo {
    pub fn hidden(&self) -> bool {
        self.visibility != SheetVisibility::Visible
    }
}
