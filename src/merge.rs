//! Merged-cell map
//!
//! Built by one pass over a worksheet part before rows are decoded. Every
//! cell of a merge range except its top-left anchor points at the anchor.

use crate::address::{parse_range, CellAddress, CellRange, MAX_COLUMNS, MAX_ROWS};
use crate::error::Result;
use crate::xml::elements::MergeRangeElement;
use crate::xml::typed_elements;
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;

/// Covered cells grouped by row, plus the set of anchors
#[derive(Debug, Clone, Default)]
pub struct MergeMap {
    covered: BTreeMap<u32, BTreeMap<u32, CellAddress>>,
    anchors: HashSet<CellAddress>,
}

impl MergeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a worksheet part for `mergeCell` declarations
    ///
    /// # Examples
    ///
    /// ```
    /// use xlsxstream::merge::MergeMap;
    /// use xlsxstream::address::CellAddress;
    ///
    /// let xml = r#"<worksheet><mergeCells><mergeCell ref="A1:B2"/></mergeCells></worksheet>"#;
    /// let map = MergeMap::build(xml.as_bytes()).unwrap();
    /// assert_eq!(map.anchor_of(2, 2), Some(CellAddress::new(1, 1)));
    /// ```
    pub fn build<R: BufRead>(source: R) -> Result<Self> {
        let mut map = MergeMap::new();
        for element in typed_elements::<MergeRangeElement, _>(source) {
            let element = element?;
            let range = parse_range(&element.reference)?;
            map.add_range(&range);
        }
        debug!(
            "Merge map: {} anchors, {} rows with covered cells",
            map.anchors.len(),
            map.covered.len()
        );
        Ok(map)
    }

    /// Record one range; entries of earlier overlapping ranges are overwritten
    pub fn add_range(&mut self, range: &CellRange) {
        if range.end.row > MAX_ROWS || range.end.column > MAX_COLUMNS {
            warn!(
                "Ignoring merge range {}:{} beyond sheet limits",
                range.start, range.end
            );
            return;
        }

        let anchor = range.start;
        let mut any = false;
        for cell in range.cells().filter(|c| *c != anchor) {
            self.covered
                .entry(cell.row)
                .or_default()
                .insert(cell.column, anchor);
            any = true;
        }
        if any {
            self.anchors.insert(anchor);
        }
    }

    pub fn is_anchor(&self, address: &CellAddress) -> bool {
        self.anchors.contains(address)
    }

    /// Anchor owning a covered cell
    pub fn anchor_of(&self, row: u32, column: u32) -> Option<CellAddress> {
        self.covered.get(&row)?.get(&column).copied()
    }

    /// Covered cells of one row, column to anchor
    pub fn row(&self, row: u32) -> Option<&BTreeMap<u32, CellAddress>> {
        self.covered.get(&row)
    }

    /// First row at or after `from` holding a covered cell
    pub fn next_covered_row(&self, from: u32) -> Option<u32> {
        self.covered.range(from..).next().map(|(row, _)| *row)
    }

    /// Highest row holding a covered cell
    pub fn last_row(&self) -> Option<u32> {
        self.covered.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}
