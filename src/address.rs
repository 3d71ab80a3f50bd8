//! Cell address codec
//!
//! Converts between bijective base-26 column letters (`A`, `Z`, `AA`, ...) and
//! 1-based column numbers, and parses `A1` style addresses and `A1:C3` ranges.

use crate::error::{Result, XlsxStreamError};
use std::fmt;

/// Highest row number a worksheet can hold
pub const MAX_ROWS: u32 = 1_048_576;

/// Highest column number a worksheet can hold (`XFD`)
pub const MAX_COLUMNS: u32 = 16_384;

/// Position of a cell in a worksheet, both components 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CellAddress {
    pub row: u32,
    pub column: u32,
}

impl CellAddress {
    pub fn new(row: u32, column: u32) -> Self {
        CellAddress { row, column }
    }

    /// Column letters of this address (`3` -> `"C"`)
    pub fn column_letters(&self) -> String {
        number_to_letters(self.column)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", number_to_letters(self.column), self.row)
    }
}

/// Rectangular block of cells, inclusive on both corners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    /// Iterate every address in the range, row by row
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.column..=self.end.column).map(move |column| CellAddress { row, column })
        })
    }
}

/// Convert column letters to a 1-based column number
///
/// Letters are case-insensitive; `A` -> 1, `Z` -> 26, `AA` -> 27.
/// An empty string gives 0.
///
/// # Examples
///
/// ```
/// use xlsxstream::address::letters_to_number;
///
/// assert_eq!(letters_to_number("A"), 1);
/// assert_eq!(letters_to_number("ab"), 28);
/// assert_eq!(letters_to_number("XFD"), 16384);
/// ```
pub fn letters_to_number(letters: &str) -> u32 {
    letters
        .bytes()
        .filter(u8::is_ascii_alphabetic)
        .fold(0u32, |acc, b| {
            acc.saturating_mul(26)
                .saturating_add((b.to_ascii_uppercase() - b'A' + 1) as u32)
        })
}

/// Convert a 1-based column number to column letters (`28` -> `"AB"`)
///
/// Returns an empty string for 0.
pub fn number_to_letters(mut number: u32) -> String {
    let mut letters = Vec::with_capacity(3);
    while number > 0 {
        let rem = (number - 1) % 26;
        letters.push(b'A' + rem as u8);
        number = (number - 1) / 26;
    }
    letters.reverse();
    // only ASCII letters are pushed
    String::from_utf8_lossy(&letters).into_owned()
}

/// Split an address into its column letters and row digits
///
/// Returns `None` unless the text is one or more ASCII letters followed by
/// zero or more ASCII digits. A `$` absolute marker is accepted before
/// either part.
pub fn split_address(address: &str) -> Option<(&str, &str)> {
    let trimmed = address.trim_start_matches('$');
    let letters_end = trimmed
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    if letters_end == 0 {
        return None;
    }
    let (letters, rest) = trimmed.split_at(letters_end);
    let digits = rest.strip_prefix('$').unwrap_or(rest);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((letters, digits))
}

/// Parse an `A1` style address into a [`CellAddress`]
///
/// # Examples
///
/// ```
/// use xlsxstream::address::{parse_address, CellAddress};
///
/// assert_eq!(parse_address("B12").unwrap(), CellAddress::new(12, 2));
/// ```
pub fn parse_address(address: &str) -> Result<CellAddress> {
    let invalid = || XlsxStreamError::corrupt(format!("Invalid cell address '{}'", address));

    let (letters, digits) = split_address(address).ok_or_else(invalid)?;
    let row: u32 = digits.parse().map_err(|_| invalid())?;
    if row == 0 || letters.len() > 3 {
        return Err(invalid());
    }

    Ok(CellAddress {
        row,
        column: letters_to_number(letters),
    })
}

/// Parse an `A1:C3` range; a single address is a one-cell range
///
/// Corners are normalized so that `start` is the top-left cell.
pub fn parse_range(range: &str) -> Result<CellRange> {
    let (a, b) = match range.split_once(':') {
        Some((a, b)) => (parse_address(a)?, parse_address(b)?),
        None => {
            let a = parse_address(range)?;
            (a, a)
        }
    };

    Ok(CellRange {
        start: CellAddress::new(a.row.min(b.row), a.column.min(b.column)),
        end: CellAddress::new(a.row.max(b.row), a.column.max(b.column)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_letters_to_number() {
        assert_eq!(letters_to_number("A"), 1);
        assert_eq!(letters_to_number("Z"), 26);
        assert_eq!(letters_to_number("AA"), 27);
        assert_eq!(letters_to_number("az"), 52);
        assert_eq!(letters_to_number("XFD"), MAX_COLUMNS);
        assert_eq!(letters_to_number(""), 0);
    }

    #[test]
    fn test_number_to_letters() {
        assert_eq!(number_to_letters(1), "A");
        assert_eq!(number_to_letters(26), "Z");
        assert_eq!(number_to_letters(27), "AA");
        assert_eq!(number_to_letters(702), "ZZ");
        assert_eq!(number_to_letters(703), "AAA");
        assert_eq!(number_to_letters(0), "");
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("A1").unwrap(), CellAddress::new(1, 1));
        assert_eq!(parse_address("$C$7").unwrap(), CellAddress::new(7, 3));
        assert!(parse_address("12").is_err());
        assert!(parse_address("A0").is_err());
        assert!(parse_address("A").is_err());
        assert!(parse_address("A1B").is_err());
    }

    #[test]
    fn test_split_address_without_row() {
        assert_eq!(split_address("AB"), Some(("AB", "")));
        assert_eq!(split_address("7"), None);
    }

    #[test]
    fn test_parse_range() {
        let range = parse_range("A1:C3").unwrap();
        assert_eq!(range.start, CellAddress::new(1, 1));
        assert_eq!(range.end, CellAddress::new(3, 3));
        assert_eq!(range.cells().count(), 9);

        let reversed = parse_range("C3:A1").unwrap();
        assert_eq!(reversed, range);

        let single = parse_range("B2").unwrap();
        assert_eq!(single.start, single.end);
    }

    #[test]
    fn test_display() {
        assert_eq!(CellAddress::new(10, 28).to_string(), "AB10");
    }

    proptest! {
        #[test]
        fn column_round_trip(n in 1u32..=MAX_COLUMNS * 4) {
            prop_assert_eq!(letters_to_number(&number_to_letters(n)), n);
        }

        #[test]
        fn lowercase_letters_decode_like_uppercase(n in 1u32..=MAX_COLUMNS) {
            let letters = number_to_letters(n);
            prop_assert_eq!(letters_to_number(&letters.to_ascii_lowercase()), n);
        }
    }
}
