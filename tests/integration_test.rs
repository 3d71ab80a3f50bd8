//! Integration tests for xlsxstream

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;
use xlsxstream::{
    list_worksheets, open_sheet_stream, open_sheet_streams, CellValue, HeaderMode, NumberFormatOption,
    RowRecord, SheetOptions, SheetRequest, SheetVisibility, Workbook, XlsxStreamError,
};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

struct Sheet {
    name: &'static str,
    state: Option<&'static str>,
    body: Vec<u8>,
}

/// Minimal workbook writer for fixtures
#[derive(Default)]
struct Fixture {
    sheets: Vec<Sheet>,
    shared_strings: Vec<&'static str>,
    styles: Option<&'static str>,
    absolute_targets: bool,
}

impl Fixture {
    fn sheet(mut self, name: &'static str, xml: &str) -> Self {
        self.sheets.push(Sheet {
            name,
            state: None,
            body: xml.as_bytes().to_vec(),
        });
        self
    }

    fn hidden_sheet(mut self, name: &'static str, state: &'static str, xml: &str) -> Self {
        self.sheets.push(Sheet {
            name,
            state: Some(state),
            body: xml.as_bytes().to_vec(),
        });
        self
    }

    fn raw_sheet(mut self, name: &'static str, body: Vec<u8>) -> Self {
        self.sheets.push(Sheet {
            name,
            state: None,
            body,
        });
        self
    }

    fn shared_strings(mut self, strings: &[&'static str]) -> Self {
        self.shared_strings = strings.to_vec();
        self
    }

    fn styles(mut self, xml: &'static str) -> Self {
        self.styles = Some(xml);
        self
    }

    fn absolute_targets(mut self) -> Self {
        self.absolute_targets = true;
        self
    }

    fn write(self, dir: &TempDir, file_name: &str) -> std::path::PathBuf {
        let path = dir.path().join(file_name);
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut workbook = String::from(
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
        );
        let mut rels = String::from(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (i, sheet) in self.sheets.iter().enumerate() {
            let state = sheet
                .state
                .map(|s| format!(r#" state="{}""#, s))
                .unwrap_or_default();
            workbook.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}"{} r:id="rId{}"/>"#,
                sheet.name,
                i + 1,
                state,
                i + 1
            ));
            let target = if self.absolute_targets {
                format!("/xl/worksheets/sheet{}.xml", i + 1)
            } else {
                format!("worksheets/sheet{}.xml", i + 1)
            };
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="{}"/>"#,
                i + 1,
                target
            ));
        }
        workbook.push_str("</sheets></workbook>");
        rels.push_str("</Relationships>");

        zip.start_file("xl/workbook.xml", options).unwrap();
        zip.write_all(workbook.as_bytes()).unwrap();
        zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();

        for (i, sheet) in self.sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
                .unwrap();
            zip.write_all(&sheet.body).unwrap();
        }

        if !self.shared_strings.is_empty() {
            let mut sst = String::from(r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#);
            for s in &self.shared_strings {
                sst.push_str(&format!("<si><t>{}</t></si>", s));
            }
            sst.push_str("</sst>");
            zip.start_file("xl/sharedStrings.xml", options).unwrap();
            zip.write_all(sst.as_bytes()).unwrap();
        }

        if let Some(styles) = self.styles {
            zip.start_file("xl/styles.xml", options).unwrap();
            zip.write_all(styles.as_bytes()).unwrap();
        }

        zip.finish().unwrap();
        path
    }
}

fn worksheet(sheet_data: &str) -> String {
    format!(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
        sheet_data
    )
}

fn collect(path: &std::path::Path, options: SheetOptions) -> Vec<RowRecord> {
    open_sheet_stream(path, 0, options)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn row_numbers(records: &[RowRecord]) -> Vec<u32> {
    records.iter().map(|r| r.row_number).collect()
}

const DATE_STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <numFmts count="1"><numFmt numFmtId="164" formatCode="0.00%"/></numFmts>
    <cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/><xf numFmtId="164"/></cellXfs>
</styleSheet>"#;

#[test]
fn test_gap_rows_and_ignore_empty() {
    let dir = TempDir::new().unwrap();
    let path = Fixture::default()
        .sheet(
            "Sheet1",
            &worksheet(
                r#"<row r="1"><c r="A1" t="inlineStr"><is><t>x</t></is></c><c r="B1"><v>5</v></c></row>
                   <row r="3"><c r="A3"><v>7</v></c></row>"#,
            ),
        )
        .write(&dir, "gaps.xlsx");

    let records = collect(&path, SheetOptions::default());
    assert_eq!(row_numbers(&records), vec![1, 2, 3]);
    assert_eq!(records[0].raw.values, vec![CellValue::from("x"), CellValue::Number(5.0)]);
    assert!(records[1].raw.values.is_empty());
    assert_eq!(records[2].raw.get_by_key("A"), Some(&CellValue::Number(7.0)));

    let records = collect(&path, SheetOptions::new().with_ignore_empty(true));
    assert_eq!(row_numbers(&records), vec![1, 3]);
    assert!(records.iter().all(|r| !r.raw.values.is_empty()));
}

#[test]
fn test_header_with_shared_strings() {
    let dir = TempDir::new().unwrap();
    let path = Fixture::default()
        .shared_strings(&["Name", "Age", "Bob", "007"])
        .sheet(
            "People",
            &worksheet(
                r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
                   <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>30</v></c></row>
                   <row r="3"><c r="A3" t="s"><v>3</v></c></row>"#,
            ),
        )
        .write(&dir, "header.xlsx");

    let records = collect(&path, SheetOptions::new().with_header(HeaderMode::FirstRow));
    assert_eq!(records.len(), 2);

    let bob = &records[0];
    assert_eq!(bob.row_number, 2);
    assert_eq!(bob.header, vec!["Name", "Age"]);
    assert_eq!(bob.raw.get_by_key("Name"), Some(&CellValue::from("Bob")));
    assert_eq!(bob.raw.get_by_key("Age"), Some(&CellValue::Number(30.0)));

    // shared strings are never coerced to numbers
    assert_eq!(records[1].raw.get_by_key("Name"), Some(&CellValue::from("007")));
    assert_eq!(records[1].header, vec!["Name", "Age"]);
}

#[test]
fn test_date_formats() {
    let dir = TempDir::new().unwrap();
    let path = Fixture::default()
        .styles(DATE_STYLES)
        .sheet(
            "Dates",
            &worksheet(r#"<row r="1"><c r="A1" s="1"><v>44000</v></c><c r="B1" s="2"><v>0.125</v></c></row>"#),
        )
        .write(&dir, "dates.xlsx");

    let records = collect(&path, SheetOptions::default());
    assert_eq!(records[0].raw.values[0], CellValue::Number(44000.0));
    assert_eq!(records[0].formatted.values[0], CellValue::from("6/18/20"));
    assert_eq!(records[0].formatted.values[1], CellValue::from("12.50%"));

    let records = collect(
        &path,
        SheetOptions::new().with_number_format(NumberFormatOption::BuiltInTable),
    );
    assert_eq!(records[0].formatted.values[0], CellValue::from("6/18/2020"));
    assert_eq!(records[0].raw.values[0], CellValue::Number(44000.0));

    let overrides = HashMap::from([(14, "yyyy-mm-dd".to_string())]);
    let records = collect(
        &path,
        SheetOptions::new().with_number_format(NumberFormatOption::Custom(overrides)),
    );
    assert_eq!(records[0].formatted.values[0], CellValue::from("2020-06-18"));
    assert_eq!(records[0].formatted.values[1], CellValue::from("12.50%"));
}

#[test]
fn test_merged_cells() {
    let dir = TempDir::new().unwrap();
    let xml = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
        <sheetData>
            <row r="1"><c r="A1" t="inlineStr"><is><t>Q1</t></is></c><c r="C1" t="inlineStr"><is><t>Q2</t></is></c></row>
            <row r="2"><c r="A2" s="1"><v>44000</v></c><c r="B2"><v>1</v></c><c r="C2"><v>2</v></c></row>
            <row r="3"><c r="B3"><v>3</v></c></row>
        </sheetData>
        <mergeCells count="2"><mergeCell ref="A1:B1"/><mergeCell ref="A2:A4"/></mergeCells>
    </worksheet>"#;
    let path = Fixture::default()
        .styles(DATE_STYLES)
        .sheet("Merged", xml)
        .write(&dir, "merged.xlsx");

    let records = collect(&path, SheetOptions::new().with_fill_merged_cells(true));
    assert_eq!(row_numbers(&records), vec![1, 2, 3, 4]);
    assert_eq!(records[0].raw.values[1], CellValue::from("Q1"));
    for record in &records[1..] {
        assert_eq!(record.raw.values[0], CellValue::Number(44000.0));
        assert_eq!(record.formatted.values[0], CellValue::from("6/18/20"));
    }

    // the header row itself carries merged labels
    let records = collect(
        &path,
        SheetOptions::new()
            .with_fill_merged_cells(true)
            .with_header(HeaderMode::FirstRow),
    );
    assert_eq!(records[0].header, vec!["[A] Q1", "[B] Q1", "Q2"]);
    assert_eq!(records[0].raw.get_by_key("[B] Q1"), Some(&CellValue::Number(1.0)));

    // without the option covered cells stay holes
    let records = collect(&path, SheetOptions::default());
    assert_eq!(row_numbers(&records), vec![1, 2, 3]);
    assert_eq!(records[2].raw.values[0], CellValue::Empty);
}

#[test]
fn test_header_anchor_spanning_data_rows() {
    let dir = TempDir::new().unwrap();
    let xml = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
        <sheetData>
            <row r="1"><c r="A1" t="inlineStr"><is><t>Region</t></is></c><c r="B1" t="inlineStr"><is><t>Sales</t></is></c></row>
            <row r="2"><c r="B2"><v>10</v></c></row>
            <row r="4"><c r="B4"><v>30</v></c></row>
        </sheetData>
        <mergeCells count="1"><mergeCell ref="A1:A3"/></mergeCells>
    </worksheet>"#;
    let path = Fixture::default()
        .sheet("Regions", xml)
        .write(&dir, "header_anchor.xlsx");

    let records = collect(
        &path,
        SheetOptions::new()
            .with_header(HeaderMode::FirstRow)
            .with_fill_merged_cells(true)
            .with_ignore_empty(true),
    );
    assert_eq!(row_numbers(&records), vec![2, 3, 4]);
    for record in &records[..2] {
        assert_eq!(record.raw.get_by_key("Region"), Some(&CellValue::from("Region")));
        assert_eq!(record.formatted.get_by_key("Region"), Some(&CellValue::from("Region")));
    }
    // row 3 exists only through the merge range
    assert_eq!(records[1].raw.get_by_key("Sales"), None);
    assert_eq!(records[2].raw.get_by_key("Region"), None);
    assert_eq!(records[2].raw.get_by_key("Sales"), Some(&CellValue::Number(30.0)));
}

#[test]
fn test_multiple_sheets_interleaved() {
    let dir = TempDir::new().unwrap();
    let first: String = (1..=50)
        .map(|i| format!(r#"<row r="{i}"><c r="A{i}"><v>{i}</v></c></row>"#))
        .collect();
    let second: String = (1..=30)
        .map(|i| format!(r#"<row r="{i}"><c r="B{i}" t="inlineStr"><is><t>s{i}</t></is></c></row>"#))
        .collect();
    let path = Fixture::default()
        .sheet("First", &worksheet(&first))
        .sheet("Second", &worksheet(&second))
        .write(&dir, "multi.xlsx");

    let mut streams = open_sheet_streams(
        &path,
        vec![
            SheetRequest::new("Second", SheetOptions::default()),
            SheetRequest::new(0, SheetOptions::default()),
        ],
    )
    .unwrap();

    let mut second = streams.next().unwrap().unwrap();
    let mut first = streams.next().unwrap().unwrap();
    assert!(streams.next().is_none());
    assert_eq!(second.name(), "Second");
    assert_eq!(first.name(), "First");

    let (mut a, mut b) = (Vec::new(), Vec::new());
    loop {
        let x = first.next();
        let y = second.next();
        if let Some(r) = &x {
            a.push(r.as_ref().unwrap().raw.values[0].clone());
        }
        if let Some(r) = &y {
            b.push(r.as_ref().unwrap().raw.get_by_key("B").cloned().unwrap());
        }
        if x.is_none() && y.is_none() {
            break;
        }
    }

    assert_eq!(a.len(), 50);
    assert_eq!(b.len(), 30);
    assert_eq!(a[49], CellValue::Number(50.0));
    assert_eq!(b[0], CellValue::from("s1"));
    assert!(streams.workbook().archive().is_closed());
}

#[test]
fn test_unopened_request_keeps_archive_open() {
    let dir = TempDir::new().unwrap();
    let path = Fixture::default()
        .sheet("A", &worksheet(r#"<row r="1"><c r="A1"><v>1</v></c></row>"#))
        .sheet("B", &worksheet(r#"<row r="1"><c r="A1"><v>2</v></c></row>"#))
        .write(&dir, "partial.xlsx");

    let mut streams = open_sheet_streams(
        &path,
        vec![
            SheetRequest::new(0, SheetOptions::default()),
            SheetRequest::new(1, SheetOptions::default()),
        ],
    )
    .unwrap();
    let first = streams.next().unwrap().unwrap();
    assert_eq!(first.count(), 1);
    assert!(!streams.workbook().archive().is_closed());

    let second = streams.next().unwrap().unwrap();
    assert_eq!(second.count(), 1);
    assert!(streams.workbook().archive().is_closed());
}

#[test]
fn test_list_worksheets() {
    let dir = TempDir::new().unwrap();
    let empty = worksheet("");
    let path = Fixture::default()
        .sheet("Visible", &empty)
        .hidden_sheet("Hidden", "hidden", &empty)
        .hidden_sheet("Secret", "veryHidden", &empty)
        .write(&dir, "list.xlsx");

    let sheets = list_worksheets(&path).unwrap();
    let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Visible", "Hidden", "Secret"]);
    assert!(!sheets[0].hidden());
    assert!(sheets[1].hidden());
    assert_eq!(sheets[2].visibility, SheetVisibility::VeryHidden);
    assert!(sheets[2].hidden());
}

#[test]
fn test_open_errors() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("missing.xlsx");
    assert!(matches!(
        open_sheet_stream(&missing, 0, SheetOptions::default()),
        Err(XlsxStreamError::NotFound(_))
    ));

    let garbage = dir.path().join("garbage.xlsx");
    std::fs::write(&garbage, b"definitely not a zip archive").unwrap();
    assert!(matches!(
        open_sheet_stream(&garbage, 0, SheetOptions::default()),
        Err(XlsxStreamError::CorruptArchive(_))
    ));

    let no_workbook = dir.path().join("no_workbook.xlsx");
    {
        let mut zip = ZipWriter::new(File::create(&no_workbook).unwrap());
        zip.start_file("docProps/app.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<Properties/>").unwrap();
        zip.finish().unwrap();
    }
    assert!(matches!(
        list_worksheets(&no_workbook),
        Err(XlsxStreamError::CorruptArchive(_))
    ));

    let path = Fixture::default()
        .sheet("Only", &worksheet(""))
        .write(&dir, "one.xlsx");
    match open_sheet_stream(&path, "Other", SheetOptions::default()) {
        Err(XlsxStreamError::SheetNotFound { sheet, available }) => {
            assert_eq!(sheet, "Other");
            assert_eq!(available, "Only");
        }
        other => panic!("expected SheetNotFound, got {:?}", other.map(|s| s.name().to_string())),
    }
}

#[test]
fn test_malformed_cell_surfaces_once() {
    let dir = TempDir::new().unwrap();
    let path = Fixture::default()
        .sheet(
            "Bad",
            &worksheet(
                r#"<row r="1"><c r="A1"><v>1</v></c></row>
                   <row r="2"><c r="A2" t="inlineStr"><v>oops</v></c></row>
                   <row r="3"><c r="A3"><v>3</v></c></row>"#,
            ),
        )
        .write(&dir, "bad.xlsx");

    let results: Vec<_> = open_sheet_stream(&path, 0, SheetOptions::default())
        .unwrap()
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(XlsxStreamError::MalformedCell { row: 2, .. })
    ));
}

#[test]
fn test_text_encoding() {
    let dir = TempDir::new().unwrap();
    let mut body = worksheet(r#"<row r="1"><c r="A1" t="inlineStr"><is><t>caf#</t></is></c></row>"#).into_bytes();
    let marker = body.iter().position(|b| *b == b'#').unwrap();
    body[marker] = 0xE9;
    let path = Fixture::default()
        .raw_sheet("Latin", body)
        .write(&dir, "latin.xlsx");

    let records = collect(
        &path,
        SheetOptions::new().with_text_encoding(encoding_rs::WINDOWS_1252),
    );
    assert_eq!(records[0].raw.values[0], CellValue::from("café"));
}

#[test]
fn test_progress_and_absolute_targets() {
    let dir = TempDir::new().unwrap();
    let rows: String = (1..=200)
        .map(|i| format!(r#"<row r="{i}"><c r="A{i}"><v>{i}</v></c><c r="B{i}"><v>{}</v></c></row>"#, i * 2))
        .collect();
    let xml = worksheet(&rows);
    let path = Fixture::default()
        .absolute_targets()
        .sheet("Data", &xml)
        .write(&dir, "progress.xlsx");

    let workbook = Workbook::open(&path).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["Data"]);
    let records: Vec<RowRecord> = workbook
        .sheet("Data", SheetOptions::default())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(records.len(), 200);
    let total = xml.len() as u64;
    assert!(records.iter().all(|r| r.total_size == total));
    assert!(records.windows(2).all(|w| w[0].bytes_consumed <= w[1].bytes_consumed));
    let last = records.last().unwrap();
    assert!(last.bytes_consumed > 0 && last.bytes_consumed <= total);
    // streams opened by hand leave the workbook open
    assert!(!workbook.archive().is_closed());
}
