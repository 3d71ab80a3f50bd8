//! Workbook-level lookup tables
//!
//! Everything the row decoder resolves against is loaded here once per
//! workbook, in a fixed order: relationships, sheet directory, styles and
//! shared strings. The tables are read-only afterwards.

use crate::archive::Archive;
use crate::error::{Result, XlsxStreamError};
use crate::format::FormatCode;
use crate::io::utf8_reader;
use crate::options::SheetSelector;
use crate::types::{SheetVisibility, WorksheetInfo};
use crate::xml::elements::{
    RelationshipElement, SharedStringItem, SheetElement, StyleSection,
};
use crate::xml::{typed_elements, FromElement};
use encoding_rs::Encoding;
use log::debug;
use std::collections::HashMap;
use std::io::BufReader;

pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub const STYLES_PART: &str = "xl/styles.xml";
pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Directory the workbook part lives in; relative targets resolve against it
const WORKBOOK_DIR: &str = "xl";

/// Read every typed element of a part, `None` when the part is missing
fn read_part<T: FromElement>(
    archive: &Archive,
    part: &str,
    encoding: Option<&'static Encoding>,
) -> Result<Option<Vec<T>>> {
    let Some(member) = archive.open_member(part)? else {
        return Ok(None);
    };
    let reader = BufReader::new(utf8_reader(member, encoding));
    typed_elements(reader).collect::<Result<Vec<T>>>().map(Some)
}

fn require_part<T: FromElement>(
    archive: &Archive,
    part: &str,
    encoding: Option<&'static Encoding>,
) -> Result<Vec<T>> {
    read_part(archive, part, encoding)?
        .ok_or_else(|| XlsxStreamError::corrupt(format!("Missing archive member '{}'", part)))
}

/// Turn a relationship target into an archive member name
///
/// Absolute targets drop their leading slash; relative targets resolve
/// against `base_dir`, with `.` and `..` segments normalized.
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if base_dir.is_empty() => target.to_string(),
        None => format!("{}/{}", base_dir, target),
    };
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Sheet names and visibility read from the workbook part alone
pub fn read_worksheets(archive: &Archive, encoding: Option<&'static Encoding>) -> Result<Vec<WorksheetInfo>> {
    let sheets: Vec<SheetElement> = require_part(archive, WORKBOOK_PART, encoding)?;
    Ok(sheets
        .into_iter()
        .map(|s| WorksheetInfo {
            visibility: SheetVisibility::from_state(s.state.as_deref()),
            name: s.name,
        })
        .collect())
}

/// Relationship id to archive member name
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    targets: HashMap<String, String>,
}

impl Relationships {
    pub fn from_elements(elements: Vec<RelationshipElement>) -> Self {
        let targets = elements
            .into_iter()
            .filter(|r| !r.external)
            .map(|r| (r.id, resolve_target(WORKBOOK_DIR, &r.target)))
            .collect();
        Relationships { targets }
    }

    /// Member name for a relationship id
    pub fn target(&self, id: &str) -> Option<&str> {
        self.targets.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// One sheet of the workbook with its resolved worksheet part
#[derive(Debug, Clone, PartialEq)]
pub struct SheetEntry {
    pub name: String,
    pub visibility: SheetVisibility,
    /// Archive member holding the sheet, `None` when the relationship is missing
    pub part: Option<String>,
}

/// Sheets in workbook order
#[derive(Debug, Clone, Default)]
pub struct SheetDirectory {
    sheets: Vec<SheetEntry>,
}

impl SheetDirectory {
    pub fn from_elements(elements: Vec<SheetElement>, relationships: &Relationships) -> Self {
        let sheets = elements
            .into_iter()
            .map(|sheet| {
                let part = sheet
                    .relationship_id
                    .as_deref()
                    .and_then(|id| relationships.target(id))
                    .map(str::to_string);
                SheetEntry {
                    visibility: SheetVisibility::from_state(sheet.state.as_deref()),
                    name: sheet.name,
                    part,
                }
            })
            .collect();
        SheetDirectory { sheets }
    }

    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    pub fn names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn worksheets(&self) -> Vec<WorksheetInfo> {
        self.sheets
            .iter()
            .map(|s| WorksheetInfo {
                name: s.name.clone(),
                visibility: s.visibility,
            })
            .collect()
    }

    /// Find the sheet a selector refers to
    pub fn resolve(&self, selector: &SheetSelector) -> Result<&SheetEntry> {
        let found = match selector {
            SheetSelector::Index(i) => self.sheets.get(*i),
            SheetSelector::Name(name) => self.sheets.iter().find(|s| &s.name == name),
        };
        found.ok_or_else(|| XlsxStreamError::SheetNotFound {
            sheet: selector.to_string(),
            available: self.names().join(", "),
        })
    }
}

/// Number format of one cell style
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    pub num_fmt_id: u32,
    pub code: FormatCode,
}

/// Style index to number format
///
/// Styles without a `numFmtId` resolve to `None`, meaning no formatting.
#[derive(Debug, Clone, Default)]
pub struct NumberFormatTable {
    styles: Vec<Option<ResolvedStyle>>,
}

impl NumberFormatTable {
    pub fn from_sections(sections: Vec<StyleSection>) -> Self {
        let mut custom: HashMap<u32, String> = HashMap::new();
        let mut xfs = Vec::new();
        for section in sections {
            match section {
                StyleSection::NumFmts(formats) => {
                    custom.extend(formats.into_iter().map(|f| (f.id, f.code)));
                }
                // only the first cellXfs block counts
                StyleSection::CellXfs(list) if xfs.is_empty() => xfs = list,
                StyleSection::CellXfs(_) => {}
            }
        }

        let styles = xfs
            .into_iter()
            .map(|xf| {
                xf.num_fmt_id.map(|id| ResolvedStyle {
                    num_fmt_id: id,
                    code: match custom.get(&id) {
                        Some(code) => FormatCode::Pattern(code.clone()),
                        None => FormatCode::BuiltIn(id),
                    },
                })
            })
            .collect();
        NumberFormatTable { styles }
    }

    pub fn get(&self, style_index: u32) -> Option<&ResolvedStyle> {
        self.styles.get(style_index as usize)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Shared strings in declaration order
#[derive(Debug, Clone, Default)]
pub struct SharedStringTable {
    strings: Vec<String>,
}

impl SharedStringTable {
    pub fn from_items(items: Vec<SharedStringItem>) -> Self {
        SharedStringTable {
            strings: items.into_iter().map(|i| i.text).collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// All tables of one workbook
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub relationships: Relationships,
    pub sheets: SheetDirectory,
    pub number_formats: NumberFormatTable,
    pub shared_strings: SharedStringTable,
}

impl LookupTables {
    /// Load every table from the archive
    ///
    /// Missing workbook or relationships parts are a [`XlsxStreamError::CorruptArchive`];
    /// missing styles or shared strings leave those tables empty.
    pub fn load(archive: &Archive, encoding: Option<&'static Encoding>) -> Result<Self> {
        let relationships = Relationships::from_elements(require_part(archive, WORKBOOK_RELS_PART, encoding)?);
        let sheets = SheetDirectory::from_elements(require_part(archive, WORKBOOK_PART, encoding)?, &relationships);
        let number_formats = read_part(archive, STYLES_PART, encoding)?
            .map(NumberFormatTable::from_sections)
            .unwrap_or_default();
        let shared_strings = read_part(archive, SHARED_STRINGS_PART, encoding)?
            .map(SharedStringTable::from_items)
            .unwrap_or_default();

        debug!(
            "Loaded lookup tables for {}: {} relationships, {} sheets, {} styles, {} shared strings",
            archive.path().display(),
            relationships.len(),
            sheets.sheets().len(),
            number_formats.len(),
            shared_strings.len()
        );

        Ok(LookupTables {
            relationships,
            sheets,
            number_formats,
            shared_strings,
        })
    }
}
