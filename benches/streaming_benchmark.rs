use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::io::Write;
use tempfile::NamedTempFile;
use xlsxstream::{open_sheet_stream, HeaderMode, NumberFormatOption, SheetOptions};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="#,##0.00"/></numFmts><cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="14"/><xf numFmtId="164"/></cellXfs></styleSheet>"#;

/// Workbook with `rows` rows of ID / Name / Date / Amount and a merged block every 10 rows
fn build_workbook(rows: usize) -> NamedTempFile {
    let temp = NamedTempFile::new().unwrap();
    let mut zip = ZipWriter::new(temp.reopen().unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(br#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets></workbook>"#)
        .unwrap();
    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    zip.write_all(br#"<Relationships><Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#)
        .unwrap();
    zip.start_file("xl/styles.xml", options).unwrap();
    zip.write_all(STYLES.as_bytes()).unwrap();

    zip.start_file("xl/sharedStrings.xml", options).unwrap();
    zip.write_all(b"<sst><si><t>ID</t></si><si><t>Name</t></si><si><t>Date</t></si><si><t>Amount</t></si>")
        .unwrap();
    for i in 0..rows {
        write!(zip, "<si><t>Name_{}</t></si>", i).unwrap();
    }
    zip.write_all(b"</sst>").unwrap();

    zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
    zip.write_all(br#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c><c r="D1" t="s"><v>3</v></c></row>"#)
        .unwrap();
    for i in 0..rows {
        let r = i + 2;
        write!(
            zip,
            r#"<row r="{r}"><c r="A{r}"><v>{i}</v></c><c r="B{r}" t="s"><v>{}</v></c><c r="C{r}" s="1"><v>{}</v></c><c r="D{r}" s="2"><v>{}</v></c></row>"#,
            i + 4,
            44000 + i % 365,
            i as f64 * 12.5
        )
        .unwrap();
    }
    zip.write_all(b"</sheetData><mergeCells>").unwrap();
    for block in (2..rows + 2).step_by(10) {
        write!(zip, r#"<mergeCell ref="C{}:C{}"/>"#, block, block + 4).unwrap();
    }
    zip.write_all(b"</mergeCells></worksheet>").unwrap();

    zip.finish().unwrap();
    temp
}

fn benchmark_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream");
    group.sample_size(10);

    for size in [1000, 10000, 50000].iter() {
        let temp = build_workbook(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                for record in open_sheet_stream(temp.path(), 0, SheetOptions::default()).unwrap() {
                    black_box(record.unwrap());
                }
            });
        });
    }

    group.finish();
}

fn benchmark_options(c: &mut Criterion) {
    let mut group = c.benchmark_group("options_10000_rows");
    group.sample_size(10);
    let temp = build_workbook(10000);

    let variants = [
        ("header", SheetOptions::new().with_header(HeaderMode::FirstRow)),
        ("merged", SheetOptions::new().with_fill_merged_cells(true)),
        (
            "builtin_table",
            SheetOptions::new().with_number_format(NumberFormatOption::BuiltInTable),
        ),
    ];

    for (name, options) in variants {
        group.bench_function(name, |b| {
            b.iter(|| {
                for record in open_sheet_stream(temp.path(), 0, options.clone()).unwrap() {
                    black_box(record.unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_stream, benchmark_options);
criterion_main!(benches);
