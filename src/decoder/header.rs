//! Header row promotion
//!
//! One row can be captured as column labels. Once captured the labels never
//! change; they key the `by_column` maps and fill the `header` field of every
//! record that follows.

use crate::address::number_to_letters;
use crate::options::HeaderMode;
use crate::types::CellValue;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct HeaderPromoter {
    mode: HeaderMode,
    labels: Option<Vec<String>>,
}

impl HeaderPromoter {
    pub fn new(mode: HeaderMode) -> Self {
        HeaderPromoter { mode, labels: None }
    }

    /// Whether a header is configured but not captured yet
    pub fn is_pending(&self) -> bool {
        self.mode != HeaderMode::Off && self.labels.is_none()
    }

    /// Whether the row with this number should become the header
    pub fn triggers(&self, row_number: u32) -> bool {
        if !self.is_pending() {
            return false;
        }
        match self.mode {
            HeaderMode::Off => false,
            HeaderMode::FirstRow => true,
            HeaderMode::RowNumber(n) => n == row_number,
        }
    }

    /// Capture labels from a row's raw values
    ///
    /// A row without values leaves the header pending. Positions without a
    /// value get an empty label. A label that occurs
    /// more than once is prefixed with its column, `"[B] Name"`, at every
    /// occurrence. This includes the first one, so `["Id", "Id"]` becomes
    /// `["[A] Id", "[B] Id"]` rather than keeping a bare `"Id"`.
    pub fn capture(&mut self, values: &[CellValue]) {
        if values.is_empty() {
            return;
        }
        let texts: Vec<String> = values.iter().map(CellValue::as_string).collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for text in texts.iter().filter(|t| !t.is_empty()) {
            *counts.entry(text.as_str()).or_default() += 1;
        }

        let labels = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                if counts.get(text.as_str()).copied().unwrap_or(0) > 1 {
                    format!("[{}] {}", number_to_letters(i as u32 + 1), text)
                } else {
                    text.clone()
                }
            })
            .collect();
        self.labels = Some(labels);
    }

    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Key for a column in the `by_column` maps
    ///
    /// Without a header this is the column letters. With one it is the label,
    /// or `[letters]` when the column has no label.
    pub fn key_for(&self, column: u32) -> String {
        let letters = number_to_letters(column);
        match &self.labels {
            None => letters,
            Some(labels) => match labels.get(column as usize - 1) {
                Some(label) if !label.is_empty() => label.clone(),
                _ => format!("[{}]", letters),
            },
        }
    }

    /// Header field of a record whose row is `width` columns wide
    pub fn filled(&self, width: usize) -> Vec<String> {
        let Some(labels) = &self.labels else {
            return Vec::new();
        };
        (0..width.max(labels.len()))
            .map(|i| match labels.get(i) {
                Some(label) if !label.is_empty() => label.clone(),
                _ => format!("[{}]", number_to_letters(i as u32 + 1)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&str]) -> Vec<CellValue> {
        items
            .iter()
            .map(|s| if s.is_empty() { CellValue::Empty } else { CellValue::coerce(s) })
            .collect()
    }

    #[test]
    fn test_triggers() {
        assert!(!HeaderPromoter::new(HeaderMode::Off).triggers(1));
        assert!(HeaderPromoter::new(HeaderMode::FirstRow).triggers(4));

        let by_number = HeaderPromoter::new(HeaderMode::RowNumber(3));
        assert!(!by_number.triggers(2));
        assert!(by_number.triggers(3));

        let mut captured = HeaderPromoter::new(HeaderMode::FirstRow);
        captured.capture(&values(&["a"]));
        assert!(!captured.is_pending());
        assert!(!captured.triggers(2));
    }

    #[test]
    fn test_duplicate_labels() {
        let mut header = HeaderPromoter::new(HeaderMode::FirstRow);
        header.capture(&values(&["Name", "Age", "Name", "", ""]));
        assert_eq!(
            header.labels().unwrap(),
            &["[A] Name", "Age", "[C] Name", "", ""]
        );
    }

    #[test]
    fn test_empty_row_leaves_header_pending() {
        let mut header = HeaderPromoter::new(HeaderMode::FirstRow);
        header.capture(&[]);
        assert!(header.is_pending());
        assert!(header.triggers(2));
    }

    #[test]
    fn test_numeric_labels() {
        let mut header = HeaderPromoter::new(HeaderMode::FirstRow);
        header.capture(&values(&["2020", "2021.5"]));
        assert_eq!(header.labels().unwrap(), &["2020", "2021.5"]);
    }

    #[test]
    fn test_keys_and_fill() {
        let mut header = HeaderPromoter::new(HeaderMode::FirstRow);
        assert_eq!(header.key_for(2), "B");
        assert!(header.filled(3).is_empty());

        header.capture(&values(&["Name", "", "City"]));
        assert_eq!(header.key_for(1), "Name");
        assert_eq!(header.key_for(2), "[B]");
        assert_eq!(header.key_for(5), "[E]");
        assert_eq!(header.filled(5), vec!["Name", "[B]", "City", "[D]", "[E]"]);
        assert_eq!(header.filled(0), vec!["Name", "[B]", "City"]);
    }
}
