//! Workbook sessions and sheet streams
//!
//! A [`Workbook`] owns the archive handle and the lookup tables. Every
//! [`SheetStream`] opened from it reads its worksheet part through the same
//! file handle, so several sheets can be consumed in any interleaving.

use crate::archive::Archive;
use crate::decoder::{DecoderState, Progress, RowDecoder};
use crate::error::{Result, XlsxStreamError};
use crate::io::{utf8_reader, CountingReader};
use crate::merge::MergeMap;
use crate::options::{SheetOptions, SheetRequest, SheetSelector};
use crate::tables::LookupTables;
use crate::types::{RowRecord, WorksheetInfo};
use crate::xml::elements::RowElement;
use crate::xml::{typed_elements, TypedStream};
use encoding_rs::Encoding;
use log::debug;
use std::cell::Cell;
use std::collections::VecDeque;
use std::io::{BufReader, Read};
use std::path::Path;
use std::rc::Rc;

type RowSource = TypedStream<RowElement, BufReader<Box<dyn Read>>>;

/// Closes the archive once every sheet of a session has finished
#[derive(Debug)]
struct CloseTracker {
    archive: Archive,
    remaining: Cell<usize>,
}

impl CloseTracker {
    fn new(archive: Archive, sheets: usize) -> Rc<Self> {
        let tracker = Rc::new(CloseTracker {
            archive,
            remaining: Cell::new(sheets),
        });
        if sheets == 0 {
            tracker.archive.close();
        }
        tracker
    }

    fn sheet_finished(&self) {
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        if remaining == 0 {
            self.archive.close();
        }
    }
}

/// An opened workbook with its lookup tables loaded
///
/// # Examples
///
/// ```no_run
/// use xlsxstream::{SheetOptions, Workbook};
///
/// let workbook = Workbook::open("report.xlsx")?;
/// for info in workbook.worksheets() {
///     println!("{} (hidden: {})", info.name, info.hidden());
/// }
///
/// for record in workbook.sheet(0, SheetOptions::default())? {
///     let record = record?;
///     println!("{}: {:?}", record.row_number, record.formatted.to_strings());
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct Workbook {
    archive: Archive,
    tables: Rc<LookupTables>,
    encoding: Option<&'static Encoding>,
}

impl Workbook {
    /// Open a workbook whose parts are UTF-8
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_encoding(path, None)
    }

    /// Open a workbook whose parts use the given text encoding
    pub fn open_with_encoding<P: AsRef<Path>>(
        path: P,
        encoding: Option<&'static Encoding>,
    ) -> Result<Self> {
        let archive = Archive::open(path)?;
        let tables = LookupTables::load(&archive, encoding)?;
        Ok(Workbook {
            archive,
            tables: Rc::new(tables),
            encoding,
        })
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<String> {
        self.tables.sheets.names()
    }

    pub fn worksheets(&self) -> Vec<WorksheetInfo> {
        self.tables.sheets.worksheets()
    }

    /// Open one sheet for streaming
    ///
    /// The archive stays open after the stream finishes; it closes when the
    /// workbook and all its streams are dropped, or on [`Workbook::close`].
    pub fn sheet(&self, selector: impl Into<SheetSelector>, options: SheetOptions) -> Result<SheetStream> {
        self.open_sheet(&selector.into(), options, None)
    }

    /// Release the file handle; open sheet streams fail on their next read
    pub fn close(&self) {
        self.archive.close();
    }

    fn open_sheet(
        &self,
        selector: &SheetSelector,
        options: SheetOptions,
        tracker: Option<Rc<CloseTracker>>,
    ) -> Result<SheetStream> {
        let entry = self.tables.sheets.resolve(selector)?;
        let part = entry.part.clone().ok_or_else(|| {
            XlsxStreamError::corrupt(format!("Sheet '{}' has no worksheet relationship", entry.name))
        })?;
        let total = self
            .archive
            .entry_size(&part)
            .ok_or_else(|| XlsxStreamError::corrupt(format!("Missing archive member '{}'", part)))?;
        let encoding = options.text_encoding.or(self.encoding);
        debug!("Opening sheet '{}' from {} ({} bytes)", entry.name, part, total);

        let merges = if options.fill_merged_cells {
            Some(MergeMap::build(BufReader::new(self.member_reader(&part, encoding, None)?))?)
        } else {
            None
        };

        let consumed = Rc::new(Cell::new(0));
        let reader = self.member_reader(&part, encoding, Some(Rc::clone(&consumed)))?;
        let rows: RowSource = typed_elements(BufReader::new(reader));

        let mut decoder = RowDecoder::new(rows, Rc::clone(&self.tables), options)
            .with_progress(Progress::new(consumed, total));
        if let Some(merges) = merges {
            decoder = decoder.with_merges(merges);
        }

        Ok(SheetStream {
            name: entry.name.clone(),
            decoder,
            tracker,
            finished: false,
        })
    }

    /// UTF-8 reader over a member, optionally counting uncompressed bytes
    fn member_reader(
        &self,
        part: &str,
        encoding: Option<&'static Encoding>,
        counter: Option<Rc<Cell<u64>>>,
    ) -> Result<Box<dyn Read>> {
        let member = self
            .archive
            .open_member(part)?
            .ok_or_else(|| XlsxStreamError::corrupt(format!("Missing archive member '{}'", part)))?;
        Ok(match counter {
            Some(count) => utf8_reader(CountingReader::new(member, count), encoding),
            None => utf8_reader(member, encoding),
        })
    }
}

/// Records of one worksheet, decoded lazily
pub struct SheetStream {
    name: String,
    decoder: RowDecoder<RowSource>,
    tracker: Option<Rc<CloseTracker>>,
    finished: bool,
}

impl SheetStream {
    /// Name of the sheet being decoded
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> DecoderState {
        self.decoder.state()
    }

    /// Header labels once the header row has been read
    pub fn header(&self) -> Option<&[String]> {
        self.decoder.header()
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        debug!("Finished sheet '{}'", self.name);
        if let Some(tracker) = &self.tracker {
            tracker.sheet_finished();
        }
    }
}

impl Iterator for SheetStream {
    type Item = Result<RowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.decoder.next();
        match &item {
            None | Some(Err(_)) => self.finish(),
            Some(Ok(_)) => {}
        }
        item
    }
}

impl std::fmt::Debug for SheetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetStream")
            .field("name", &self.name)
            .field("state", &self.decoder.state())
            .finish()
    }
}

/// Sheet streams of a multi-sheet session, opened lazily in request order
///
/// The shared archive closes once every requested sheet has been read to
/// the end or has failed.
#[derive(Debug)]
pub struct SheetStreams {
    workbook: Workbook,
    requests: VecDeque<SheetRequest>,
    tracker: Rc<CloseTracker>,
}

impl SheetStreams {
    pub(crate) fn open<P: AsRef<Path>>(path: P, requests: Vec<SheetRequest>) -> Result<Self> {
        let encoding = requests.first().and_then(|r| r.options.text_encoding);
        let workbook = Workbook::open_with_encoding(path, encoding)?;
        let tracker = CloseTracker::new(workbook.archive.clone(), requests.len());
        Ok(SheetStreams {
            workbook,
            requests: requests.into(),
            tracker,
        })
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// Requests not opened yet
    pub fn remaining(&self) -> usize {
        self.requests.len()
    }
}

impl Iterator for SheetStreams {
    type Item = Result<SheetStream>;

    fn next(&mut self) -> Option<Self::Item> {
        let request = self.requests.pop_front()?;
        let opened = self.workbook.open_sheet(
            &request.selector,
            request.options,
            Some(Rc::clone(&self.tracker)),
        );
        if opened.is_err() {
            self.tracker.sheet_finished();
        }
        Some(opened)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.requests.len(), Some(self.requests.len()))
    }
}

/// Open a single sheet; the archive closes when the stream finishes
pub(crate) fn open_single<P: AsRef<Path>>(
    path: P,
    selector: SheetSelector,
    options: SheetOptions,
) -> Result<SheetStream> {
    let workbook = Workbook::open_with_encoding(path, options.text_encoding)?;
    let tracker = CloseTracker::new(workbook.archive.clone(), 1);
    let opened = workbook.open_sheet(&selector, options, Some(Rc::clone(&tracker)));
    if opened.is_err() {
        tracker.sheet_finished();
    }
    opened
}
