//! Streaming row decoder
//!
//! Turns worksheet `<row>` elements into [`RowRecord`]s one at a time. The
//! decoder owns no I/O: it pulls typed row elements from any iterator and
//! resolves them against the workbook's lookup tables.
//!
//! Per row element it
//! 1. synthesizes the rows missing between the previous row and this one,
//! 2. decodes each cell into a raw and a formatted value,
//! 3. copies merge anchor values into covered cells,
//! 4. captures the header row if one is pending,
//! 5. emits the record unless empty rows are suppressed.
//!
//! After the last element, rows that exist only because a merge range reaches
//! past the end of the data are synthesized in ascending order.
//!
//! Missing rows are produced lazily from a cursor, one per pull, so a sheet
//! whose first row is numbered 1048576 holds at most one record at a time.

pub mod header;

use crate::address::{letters_to_number, number_to_letters, split_address, CellAddress, MAX_COLUMNS};
use crate::error::{Result, XlsxStreamError};
use crate::format::{formatter_for, NumberFormatter};
use crate::merge::MergeMap;
use crate::options::{NumberFormatOption, SheetOptions};
use crate::tables::LookupTables;
use crate::types::{CellType, CellValue, RowRecord, RowView};
use crate::xml::elements::{CellElement, RowElement};
use header::HeaderPromoter;
use indexmap::IndexMap;
use log::{debug, warn};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// Decoder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Decoding rows, no header pending
    Streaming,
    /// A header row is configured and not captured yet
    HeaderPending,
    /// Input exhausted, trailing merge rows still to emit
    Flushing,
    Done,
}

/// Byte progress of the worksheet part being decoded
#[derive(Debug, Clone, Default)]
pub struct Progress {
    consumed: Rc<Cell<u64>>,
    total: u64,
}

impl Progress {
    pub fn new(consumed: Rc<Cell<u64>>, total: u64) -> Self {
        Progress { consumed, total }
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.get()
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Working buffer for one row: column to (raw, formatted), in insertion order
#[derive(Debug, Default)]
struct RowBuffer {
    cells: IndexMap<u32, (CellValue, CellValue)>,
}

impl RowBuffer {
    fn set(&mut self, column: u32, raw: CellValue, formatted: CellValue) {
        self.cells.insert(column, (raw, formatted));
    }

    fn width(&self) -> usize {
        self.cells.keys().copied().max().unwrap_or(0) as usize
    }

    /// Positional raw values, holes are `Empty`
    fn raw_values(&self) -> Vec<CellValue> {
        let mut values = vec![CellValue::Empty; self.width()];
        for (column, (raw, _)) in &self.cells {
            values[*column as usize - 1] = raw.clone();
        }
        values
    }

    fn into_views(self, header: &HeaderPromoter) -> (RowView, RowView) {
        let width = self.width();
        let mut raw = RowView {
            values: vec![CellValue::Empty; width],
            by_column: IndexMap::with_capacity(self.cells.len()),
        };
        let mut formatted = RowView {
            values: vec![CellValue::Empty; width],
            by_column: IndexMap::with_capacity(self.cells.len()),
        };
        for (column, (r, f)) in self.cells {
            let index = column as usize - 1;
            let mut key = header.key_for(column);
            if raw.by_column.contains_key(&key) {
                // a literal label such as "[C]" already took this column's fallback key
                key = format!("[{}] {}", number_to_letters(column), key);
            }
            raw.values[index] = r.clone();
            formatted.values[index] = f.clone();
            raw.by_column.insert(key.clone(), r);
            formatted.by_column.insert(key, f);
        }
        (raw, formatted)
    }
}

/// Rows still to synthesize, `next..=end`
#[derive(Debug, Clone, Copy)]
struct GapCursor {
    next: u32,
    end: u32,
}

impl GapCursor {
    fn new(start: u32, end: u32) -> Option<Self> {
        (start <= end).then_some(GapCursor { next: start, end })
    }
}

/// Pull-based decoder over a stream of row elements
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use xlsxstream::decoder::RowDecoder;
/// use xlsxstream::tables::LookupTables;
/// use xlsxstream::xml::{elements::RowElement, typed_elements};
/// use xlsxstream::{CellValue, SheetOptions};
///
/// let xml = r#"<sheetData>
///     <row r="1"><c r="A1"><v>1</v></c></row>
///     <row r="3"><c r="B3" t="inlineStr"><is><t>x</t></is></c></row>
/// </sheetData>"#;
/// let rows = typed_elements::<RowElement, _>(xml.as_bytes());
/// let decoder = RowDecoder::new(rows, Rc::new(LookupTables::default()), SheetOptions::default());
///
/// let records: Vec<_> = decoder.collect::<Result<_, _>>().unwrap();
/// assert_eq!(records.len(), 3);
/// assert!(records[1].is_empty());
/// assert_eq!(records[2].raw.get_by_key("B"), Some(&CellValue::from("x")));
/// ```
pub struct RowDecoder<I> {
    rows: I,
    tables: Rc<LookupTables>,
    merges: Option<MergeMap>,
    anchor_values: HashMap<CellAddress, (CellValue, CellValue)>,
    header: HeaderPromoter,
    ignore_empty: bool,
    number_format: NumberFormatOption,
    formatters: HashMap<u32, Option<Box<dyn NumberFormatter>>>,
    progress: Progress,
    state: DecoderState,
    last_row: u32,
    gap: Option<GapCursor>,
    held: Option<(u32, RowElement)>,
    pending: Option<RowRecord>,
    failure: Option<XlsxStreamError>,
}

impl<I> RowDecoder<I>
where
    I: Iterator<Item = Result<RowElement>>,
{
    pub fn new(rows: I, tables: Rc<LookupTables>, options: SheetOptions) -> Self {
        let header = HeaderPromoter::new(options.header);
        let state = if header.is_pending() {
            DecoderState::HeaderPending
        } else {
            DecoderState::Streaming
        };
        RowDecoder {
            rows,
            tables,
            merges: None,
            anchor_values: HashMap::new(),
            header,
            ignore_empty: options.ignore_empty,
            number_format: options.number_format,
            formatters: HashMap::new(),
            progress: Progress::default(),
            state,
            last_row: 0,
            gap: None,
            held: None,
            pending: None,
            failure: None,
        }
    }

    /// Propagate values of merged ranges from this map
    pub fn with_merges(mut self, merges: MergeMap) -> Self {
        self.merges = Some(merges);
        self
    }

    /// Report progress from this counter on every record
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Header labels once captured
    pub fn header(&self) -> Option<&[String]> {
        self.header.labels()
    }

    /// Accept the next row element, deferring it behind any missing rows
    fn begin_row(&mut self, row: RowElement) {
        let row_number = row.number.unwrap_or(self.last_row.saturating_add(1));
        if row_number <= self.last_row {
            warn!(
                "Row {} does not follow row {}; decoding it in document order",
                row_number, self.last_row
            );
        }
        self.gap = GapCursor::new(self.last_row.saturating_add(1), row_number.saturating_sub(1));
        self.last_row = self.last_row.max(row_number);
        self.held = Some((row_number, row));
    }

    fn decode_row(&mut self, row_number: u32, row: RowElement) -> Result<()> {
        let mut buffer = RowBuffer::default();
        for (position, cell) in row.cells.into_iter().enumerate() {
            if !cell.has_content {
                continue;
            }
            let column = cell_column(row_number, position, cell.reference.as_deref())?;
            let raw = self.raw_value(row_number, &cell)?;
            let formatted = self.format_value(cell.style_index, &cell.cell_type, &raw);

            let address = CellAddress::new(row_number, column);
            if self.merges.as_ref().is_some_and(|m| m.is_anchor(&address)) {
                self.anchor_values
                    .insert(address, (raw.clone(), formatted.clone()));
            }
            buffer.set(column, raw, formatted);
        }
        self.fill_merged(row_number, &mut buffer);

        if self.header.triggers(row_number) {
            self.header.capture(&buffer.raw_values());
            if !self.header.is_pending() {
                self.state = DecoderState::Streaming;
                debug!("Captured header from row {}: {:?}", row_number, self.header.labels());
            }
            return Ok(());
        }

        self.pending = self.emit(row_number, buffer);
        Ok(())
    }

    /// Advance the gap cursor by one row
    ///
    /// With empty rows suppressed the cursor jumps straight to the next row
    /// holding merged cells.
    fn next_gap_row(&mut self) -> Option<RowRecord> {
        let GapCursor { next, end } = self.gap?;
        let row_number = if self.ignore_empty {
            match self.merges.as_ref().and_then(|m| m.next_covered_row(next)) {
                Some(covered) if covered <= end => covered,
                _ => {
                    self.gap = None;
                    return None;
                }
            }
        } else {
            next
        };
        self.gap = if row_number < end {
            Some(GapCursor { next: row_number + 1, end })
        } else {
            None
        };

        let mut buffer = RowBuffer::default();
        self.fill_merged(row_number, &mut buffer);
        self.emit(row_number, buffer)
    }

    fn fill_merged(&self, row_number: u32, buffer: &mut RowBuffer) {
        let Some(covered) = self.merges.as_ref().and_then(|m| m.row(row_number)) else {
            return;
        };
        for (column, anchor) in covered {
            let (raw, formatted) = self
                .anchor_values
                .get(anchor)
                .cloned()
                .unwrap_or_default();
            buffer.set(*column, raw, formatted);
        }
    }

    fn emit(&self, row_number: u32, buffer: RowBuffer) -> Option<RowRecord> {
        if self.ignore_empty && buffer.cells.is_empty() {
            return None;
        }
        let header = self.header.filled(buffer.width());
        let (raw, formatted) = buffer.into_views(&self.header);
        Some(RowRecord {
            row_number,
            raw,
            formatted,
            header,
            bytes_consumed: self.progress.consumed(),
            total_size: self.progress.total(),
        })
    }

    /// Queue the rows up to the last one a merge range reaches
    fn flush(&mut self) {
        let Some(last) = self.merges.as_ref().and_then(MergeMap::last_row) else {
            return;
        };
        self.gap = GapCursor::new(self.last_row.saturating_add(1), last);
        self.last_row = self.last_row.max(last);
    }

    fn raw_value(&self, row_number: u32, cell: &CellElement) -> Result<CellValue> {
        let value = match &cell.cell_type {
            CellType::InlineString => match &cell.inline_text {
                Some(text) => CellValue::String(text.clone()),
                None => {
                    return Err(XlsxStreamError::malformed(
                        row_number,
                        "inline string without text",
                    ))
                }
            },
            CellType::SharedString => match &cell.value {
                Some(index) => self.shared_string(row_number, index),
                None => CellValue::Unresolved,
            },
            _ => match &cell.value {
                Some(text) => CellValue::coerce(text),
                None => CellValue::Unresolved,
            },
        };
        Ok(value)
    }

    fn shared_string(&self, row_number: u32, index: &str) -> CellValue {
        let found = index
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| self.tables.shared_strings.get(i));
        match found {
            Some(text) => CellValue::String(text.to_string()),
            None => {
                warn!(
                    "Shared string index '{}' in row {} is out of range ({} strings)",
                    index,
                    row_number,
                    self.tables.shared_strings.len()
                );
                CellValue::Unresolved
            }
        }
    }

    /// Display value of a cell; style 0 and unresolved styles leave it as is
    fn format_value(&mut self, style_index: u32, cell_type: &CellType, raw: &CellValue) -> CellValue {
        if style_index == 0 || matches!(raw, CellValue::Empty | CellValue::Unresolved) {
            return raw.clone();
        }

        let tables = &self.tables;
        let option = &self.number_format;
        let formatter = self
            .formatters
            .entry(style_index)
            .or_insert_with(|| resolve_formatter(tables, option, style_index));

        let Some(formatter) = formatter else {
            return raw.clone();
        };
        match formatter.format(raw) {
            Ok(text) if cell_type.is_string() => CellValue::String(text),
            Ok(text) => CellValue::coerce(&text),
            Err(e) => {
                warn!("Leaving value unformatted: {}", e);
                raw.clone()
            }
        }
    }
}

fn resolve_formatter(
    tables: &LookupTables,
    option: &NumberFormatOption,
    style_index: u32,
) -> Option<Box<dyn NumberFormatter>> {
    let style = tables.number_formats.get(style_index)?;
    match formatter_for(style.num_fmt_id, &style.code, option) {
        Ok(formatter) => Some(formatter),
        Err(e) => {
            warn!("Style {} has an unusable number format: {}", style_index, e);
            None
        }
    }
}

/// Column of a cell: from its address letters, else its 1-based position
fn cell_column(row_number: u32, position: usize, reference: Option<&str>) -> Result<u32> {
    let Some(reference) = reference else {
        return Ok(position as u32 + 1);
    };
    let column = split_address(reference)
        .map(|(letters, _)| letters_to_number(letters))
        .filter(|c| (1..=MAX_COLUMNS).contains(c))
        .ok_or_else(|| {
            XlsxStreamError::malformed(row_number, format!("invalid cell reference '{}'", reference))
        })?;
    Ok(column)
}

impl<I> Iterator for RowDecoder<I>
where
    I: Iterator<Item = Result<RowElement>>,
{
    type Item = Result<RowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.take() {
                return Some(Ok(record));
            }
            if self.gap.is_some() {
                if let Some(record) = self.next_gap_row() {
                    return Some(Ok(record));
                }
                continue;
            }
            if let Some((row_number, row)) = self.held.take() {
                if let Err(e) = self.decode_row(row_number, row) {
                    self.failure = Some(e);
                }
                continue;
            }
            if let Some(err) = self.failure.take() {
                self.state = DecoderState::Done;
                return Some(Err(err));
            }

            match self.state {
                DecoderState::Done => return None,
                DecoderState::Flushing => {
                    self.flush();
                    self.state = DecoderState::Done;
                }
                DecoderState::Streaming | DecoderState::HeaderPending => match self.rows.next() {
                    None => self.state = DecoderState::Flushing,
                    Some(Err(e)) => {
                        self.failure = Some(with_row(e, self.last_row.saturating_add(1)))
                    }
                    Some(Ok(row)) => self.begin_row(row),
                },
            }
        }
    }
}

/// Attach a row number to a malformed-row error that has none
fn with_row(err: XlsxStreamError, row_number: u32) -> XlsxStreamError {
    match err {
        XlsxStreamError::MalformedCell { row: 0, reason } => XlsxStreamError::MalformedCell {
            row: row_number,
            reason,
        },
        other => other,
    }
}
