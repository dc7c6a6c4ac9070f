//! Large dataset split across sheets, written with a small row window
//!
//! Excel has a limit of 1,048,576 rows per sheet, so rows are split into
//! sheets of 1,000,000. Only `WINDOW` rows per sheet are ever in memory; the
//! rest are spilled to compressed temp files until the workbook is saved.
//!
//! Set `MEMORY_LIMIT_MB` to pick a larger window.

use std::time::Instant;
use sxstream::types::CellValue;
use sxstream::{CellStyle, StreamingOptions, StreamingWorkbook};

const ROWS_PER_SHEET: u32 = 1_000_000;
const TOTAL_ROWS: u32 = 2_500_000;
const DEPARTMENTS: [&str; 5] = ["Engineering", "Sales", "Marketing", "Support", "Finance"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Large Dataset Streaming Test ===\n");

    let options = StreamingOptions::from_env().with_compressed_spill(true);
    println!("Window: {:?}", options.window_size);
    println!("Total rows: {}", TOTAL_ROWS);
    println!("Sheets: {}\n", TOTAL_ROWS.div_ceil(ROWS_PER_SHEET));

    let start = Instant::now();
    let mut workbook = StreamingWorkbook::with_options(options);

    let mut written = 0u32;
    let mut sheet_number = 1;
    while written < TOTAL_ROWS {
        let sheet = workbook.create_sheet(&format!("Data{}", sheet_number))?;
        sheet.track_columns_for_auto_sizing([1, 2]);

        let header = ["ID", "Name", "Department", "Salary", "Active"];
        let mut row = sheet.create_row(0)?;
        for (col, title) in header.iter().enumerate() {
            row.set_styled_cell(col as u32, *title, CellStyle::HeaderBold)?;
        }

        let rows = (TOTAL_ROWS - written).min(ROWS_PER_SHEET);
        for i in 1..=rows {
            let id = written + i;
            let mut row = sheet.create_row(i)?;
            row.set_cell(0, CellValue::Int(id as i64))?;
            row.set_cell(1, format!("Employee {}", id))?;
            row.set_cell(2, DEPARTMENTS[id as usize % DEPARTMENTS.len()])?;
            row.set_styled_cell(
                3,
                CellValue::Float(40_000.0 + (id % 1000) as f64 * 75.5),
                CellStyle::NumberCurrency,
            )?;
            row.set_cell(4, id % 3 != 0)?;

            if i % 250_000 == 0 {
                println!("  {}: {} rows ({:.1?})", sheet.name(), i, start.elapsed());
            }
        }

        sheet.auto_size_column(1)?;
        sheet.auto_size_column(2)?;
        written += rows;
        sheet_number += 1;
    }

    println!("\nSaving...");
    workbook.save("large_dataset.xlsx")?;
    workbook.dispose()?;

    let elapsed = start.elapsed();
    println!("Done in {:.2?}", elapsed);
    println!(
        "Throughput: {:.0} rows/sec",
        TOTAL_ROWS as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
