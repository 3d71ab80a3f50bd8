//! Print every row of a worksheet
//!
//! Usage: cargo run --example dump_sheet -- <file.xlsx> [sheet name or index]

use std::time::Instant;
use xlsxstream::{list_worksheets, open_sheet_stream, HeaderMode, SheetOptions, SheetSelector};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        println!("Usage: dump_sheet <file.xlsx> [sheet name or index]");
        return Ok(());
    };
    let selector = match args.next() {
        Some(arg) => match arg.parse::<usize>() {
            Ok(index) => SheetSelector::Index(index),
            Err(_) => SheetSelector::Name(arg),
        },
        None => SheetSelector::Index(0),
    };

    println!("=== {} ===", path);
    for sheet in list_worksheets(&path)? {
        println!(
            "  {}{}",
            sheet.name,
            if sheet.hidden() { " (hidden)" } else { "" }
        );
    }
    println!();

    let options = SheetOptions::new()
        .with_header(HeaderMode::FirstRow)
        .with_fill_merged_cells(true);

    let start = Instant::now();
    let mut rows = 0usize;
    let mut stream = open_sheet_stream(&path, selector, options)?;
    for record in stream.by_ref() {
        let record = record?;
        rows += 1;
        let percent = if record.total_size > 0 {
            record.bytes_consumed as f64 * 100.0 / record.total_size as f64
        } else {
            100.0
        };
        println!(
            "[{:>5.1}%] row {}: {:?}",
            percent, record.row_number, record.formatted.by_column
        );
    }

    if let Some(header) = stream.header() {
        println!("\nHeader: {:?}", header);
    }
    println!(
        "Read {} rows from '{}' in {:.3}s",
        rows,
        stream.name(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
