use std::fs;
use std::hint::black_box;
use sxstream::{StreamingOptions, StreamingWorkbook, WindowSize};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _profiler = dhat::Profiler::new_heap();

    let path = "memory_bench_test.xlsx";
    if std::path::Path::new(path).exists() {
        fs::remove_file(path)?;
    }

    let options = StreamingOptions::default().with_window_size(WindowSize::rows(100)?);
    let mut workbook = StreamingWorkbook::with_options(options);
    let sheet = workbook.create_sheet("Sheet1")?;

    // 100,000 rows; heap peak should not depend on the row count
    for i in 0..100_000u32 {
        sheet.write_row(
            i,
            black_box([
                "Column 1 Data",
                "Column 2 Data",
                "12345",
                "2023-01-01",
                "Some longer text content to simulate real world data usage",
            ]),
        )?;
    }

    workbook.save(path)?;
    workbook.dispose()?;

    if std::path::Path::new(path).exists() {
        fs::remove_file(path)?;
    }

    println!("Benchmark complete");
    Ok(())
}
