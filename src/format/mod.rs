//! Number formatting
//!
//! A cell's display text comes from a [`FormatCode`]: either a built-in id
//! or a pattern declared in the styles part. Both are rendered through the
//! [`NumberFormatter`] trait, so callers never branch on where a code came
//! from.
//!
//! Supported pattern features:
//! - up to four sections with conditions and colors
//! - digit placeholders `0 # ?`, grouping and scaling commas, percent
//! - scientific (`0.00E+00`) and engineering (`##0.0E+0`) notation
//! - fractions with bounded (`# ??/??`) or fixed (`# ?/8`) denominators
//! - dates and times including elapsed `[h]` and fractional seconds
//! - literals, escapes, `_x` spacing, `*x` fill and `[$€-407]` currencies
//! - text sections with `@`

pub mod builtin;
mod date;
mod number;
mod pattern;

use crate::error::Result;
use crate::options::NumberFormatOption;
use crate::types::CellValue;

pub use number::format_general;
pub use pattern::FormatPattern;

/// Format code attached to a style
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatCode {
    /// Built-in format referenced by id only
    BuiltIn(u32),
    /// Custom pattern declared in the styles part
    Pattern(String),
}

/// Something that turns a cell value into display text
pub trait NumberFormatter {
    fn format(&self, value: &CellValue) -> Result<String>;
}

fn format_with(pattern: &FormatPattern, value: &CellValue) -> String {
    match value {
        CellValue::Number(n) => pattern.format_number(*n),
        CellValue::String(s) => pattern.format_text(s),
        CellValue::Empty | CellValue::Unresolved => String::new(),
    }
}

/// Formatter for a built-in id, using the standard code table
///
/// Ids without a standard code render like `General`.
#[derive(Debug, Clone)]
pub struct BuiltInFormatter {
    id: u32,
    pattern: FormatPattern,
}

impl BuiltInFormatter {
    pub fn new(id: u32) -> Self {
        let pattern = builtin::standard_code(id)
            .and_then(|code| FormatPattern::parse(code).ok())
            .unwrap_or_else(FormatPattern::general);
        BuiltInFormatter { id, pattern }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl NumberFormatter for BuiltInFormatter {
    fn format(&self, value: &CellValue) -> Result<String> {
        Ok(format_with(&self.pattern, value))
    }
}

/// Formatter for an explicit pattern
#[derive(Debug, Clone)]
pub struct PatternFormatter {
    pattern: FormatPattern,
}

impl PatternFormatter {
    /// Parse the code up front; invalid codes fail here
    ///
    /// # Examples
    ///
    /// ```
    /// use xlsxstream::format::{NumberFormatter, PatternFormatter};
    /// use xlsxstream::CellValue;
    ///
    /// let f = PatternFormatter::new("#,##0.00").unwrap();
    /// assert_eq!(f.format(&CellValue::Number(1234.5)).unwrap(), "1,234.50");
    /// ```
    pub fn new(code: &str) -> Result<Self> {
        Ok(PatternFormatter {
            pattern: FormatPattern::parse(code)?,
        })
    }
}

impl NumberFormatter for PatternFormatter {
    fn format(&self, value: &CellValue) -> Result<String> {
        Ok(format_with(&self.pattern, value))
    }
}

/// Choose the formatter for a style
///
/// Precedence: a caller override keyed by the style's format id, then the
/// spreadsheet-application table for built-in ids when requested, then the
/// style's own code.
pub fn formatter_for(
    num_fmt_id: u32,
    code: &FormatCode,
    option: &NumberFormatOption,
) -> Result<Box<dyn NumberFormatter>> {
    match option {
        NumberFormatOption::Custom(overrides) => {
            if let Some(custom) = overrides.get(&num_fmt_id) {
                return Ok(Box::new(PatternFormatter::new(custom)?));
            }
        }
        NumberFormatOption::BuiltInTable => {
            if let FormatCode::BuiltIn(id) = code {
                if let Some(app_code) = builtin::spreadsheet_app_code(*id) {
                    return Ok(Box::new(PatternFormatter::new(app_code)?));
                }
            }
        }
        NumberFormatOption::Standard => {}
    }

    match code {
        FormatCode::BuiltIn(id) => Ok(Box::new(BuiltInFormatter::new(*id))),
        FormatCode::Pattern(p) => Ok(Box::new(PatternFormatter::new(p)?)),
    }
}
