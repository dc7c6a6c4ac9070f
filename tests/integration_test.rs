//! Integration tests for the streaming workbook

use sxstream::types::CellValue;
use sxstream::{
    CellStyle, ExcelError, MemoryArchive, StreamingOptions, StreamingWorkbook, WindowSize,
};
use tempfile::{tempdir, TempDir};

const SHEET1: &str = "xl/worksheets/sheet1.xml";

fn workbook(window: usize) -> (TempDir, StreamingWorkbook) {
    let dir = tempdir().unwrap();
    let options = StreamingOptions::default()
        .with_window_size(WindowSize::rows(window).unwrap())
        .with_temp_dir(dir.path());
    (dir, StreamingWorkbook::with_options(options))
}

fn write_to_memory(wb: &mut StreamingWorkbook) -> MemoryArchive {
    let mut archive = MemoryArchive::new();
    wb.write(&mut archive).unwrap();
    archive
}

/// Row numbers (1-based, as in the XML) in document order
fn row_numbers(xml: &str) -> Vec<u32> {
    xml.match_indices("<row r=\"")
        .map(|(pos, prefix)| {
            let rest = &xml[pos + prefix.len()..];
            let end = rest.find('"').unwrap();
            rest[..end].parse().unwrap()
        })
        .collect()
}

#[test]
fn test_spilled_and_resident_rows_merge_in_order() {
    let (_dir, mut wb) = workbook(3);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    for i in 0..5u32 {
        sheet.write_row(i, [format!("marker-{}", i)]).unwrap();
    }
    assert_eq!(sheet.resident_row_count(), 3);
    assert_eq!(sheet.flush_boundary(), 2);

    let archive = write_to_memory(&mut wb);
    let xml = archive.entry_str(SHEET1).unwrap();

    assert_eq!(row_numbers(xml), vec![1, 2, 3, 4, 5]);
    let mut last = 0;
    for i in 0..5 {
        let pos = xml.find(&format!(">marker-{}<", i)).unwrap();
        assert!(pos > last);
        last = pos;
    }
}

#[test]
fn test_auto_size_sees_flushed_rows() {
    let (_dir, mut wb) = workbook(1);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    sheet.track_column_for_auto_sizing(0);

    let long = "a considerably longer piece of text";
    sheet.write_row(0, [long]).unwrap();
    sheet.write_row(1, ["short"]).unwrap();
    assert_eq!(sheet.flush_boundary(), 1);

    let width = sheet.auto_size_column(0).unwrap();
    assert!(width >= long.len() as f64);
}

#[test]
fn test_tracking_after_flush_does_not_recover_history() {
    let (_dir, mut wb) = workbook(1);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    sheet.write_row(0, ["a considerably longer piece of text"]).unwrap();
    sheet.write_row(1, ["short"]).unwrap();

    sheet.track_column_for_auto_sizing(0);
    let width = sheet.auto_size_column(0).unwrap();
    assert!(width < 10.0);
}

#[test]
fn test_create_below_boundary_after_eviction_fails() {
    let (_dir, mut wb) = workbook(3);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    for i in 1..=4 {
        sheet.create_row(i).unwrap();
    }

    assert!(matches!(
        sheet.create_row(1),
        Err(ExcelError::RowAlreadyFlushed { row: 1, boundary: 2 })
    ));
}

#[test]
fn test_create_after_manual_flush_fails() {
    let (_dir, mut wb) = workbook(100);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    sheet.create_row(0).unwrap();
    sheet.flush_buffered_data().unwrap();

    assert!(sheet.all_rows_flushed());
    assert!(matches!(
        sheet.create_row(0),
        Err(ExcelError::RowAlreadyFlushed { row: 0, .. })
    ));
}

#[test]
fn test_untracked_column_cannot_be_sized() {
    let (_dir, mut wb) = workbook(2);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    for i in 0..10 {
        sheet.write_row(i, ["data", "more data"]).unwrap();
    }
    sheet.track_column_for_auto_sizing(0);

    assert!(matches!(
        sheet.auto_size_column(1),
        Err(ExcelError::ColumnNotTracked { col: 1 })
    ));
    assert!(sheet.auto_size_column(0).is_ok());
}

#[test]
fn test_widest_value_in_middle_of_stream() {
    let (_dir, mut wb) = workbook(5);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    sheet.track_all_columns_for_auto_sizing();

    for i in 0..200u32 {
        let mut row = sheet.create_row(i).unwrap();
        let value = if i == 57 {
            "the widest value in the whole column".to_string()
        } else {
            format!("v{}", i)
        };
        row.set_cell(2, value).unwrap();
    }

    let width = sheet.auto_size_column(2).unwrap();
    assert!(width >= 36.0);

    // recorded as an explicit width in the output
    let archive = write_to_memory(&mut wb);
    let xml = archive.entry_str(SHEET1).unwrap();
    assert!(xml.contains("<col min=\"3\" max=\"3\""));
}

#[test]
fn test_flush_rows_keeps_newest() {
    let (_dir, mut wb) = workbook(100);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    for i in 0..10 {
        sheet.create_row(i).unwrap();
    }
    sheet.flush_rows(4).unwrap();

    assert_eq!(sheet.resident_row_count(), 4);
    assert_eq!(sheet.first_row_num(), Some(6));
    assert_eq!(sheet.last_flushed_row_num(), Some(5));
}

#[test]
fn test_sparse_rows_stay_absent() {
    let (_dir, mut wb) = workbook(2);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    for i in [0, 10, 11, 500, 501] {
        sheet.write_row(i, [i as i64]).unwrap();
    }

    let archive = write_to_memory(&mut wb);
    assert_eq!(
        row_numbers(archive.entry_str(SHEET1).unwrap()),
        vec![1, 11, 12, 501, 502]
    );
}

#[test]
fn test_encrypted_spill_hides_plaintext() {
    let dir = tempdir().unwrap();
    let options = StreamingOptions::default()
        .with_window_size(WindowSize::rows(2).unwrap())
        .with_temp_dir(dir.path())
        .with_encrypted_spill(true);
    let mut wb = StreamingWorkbook::with_options(options);

    let sheet = wb.create_sheet("Secrets").unwrap();
    for i in 0..20u32 {
        sheet.write_row(i, [format!("secret-value-{:03}", i)]).unwrap();
    }
    let spill = sheet.spill_path().unwrap().to_path_buf();

    let archive = write_to_memory(&mut wb);
    let xml = archive.entry_str(SHEET1).unwrap();
    for i in 0..20 {
        assert!(xml.contains(&format!(">secret-value-{:03}<", i)));
    }

    let raw = std::fs::read(&spill).unwrap();
    assert!(!raw.is_empty());
    assert!(!raw.windows(b"secret-value".len()).any(|w| w == b"secret-value"));
    assert!(!raw.windows(b"<row".len()).any(|w| w == b"<row"));
}

#[test]
fn test_compressed_spill_output_matches_plain() {
    let build = |compress: bool| {
        let dir = tempdir().unwrap();
        let options = StreamingOptions::default()
            .with_window_size(WindowSize::rows(3).unwrap())
            .with_temp_dir(dir.path())
            .with_compressed_spill(compress);
        let mut wb = StreamingWorkbook::with_options(options);
        let sheet = wb.create_sheet("Data").unwrap();
        for i in 0..50u32 {
            let mut row = sheet.create_row(i).unwrap();
            row.set_styled_cell(0, CellValue::Int(i as i64), CellStyle::NumberInteger)
                .unwrap();
            row.set_cell(1, "repeated text repeated text").unwrap();
        }
        let archive = write_to_memory(&mut wb);
        archive.entry_str(SHEET1).unwrap().to_string()
    };

    assert_eq!(build(true), build(false));
}

#[test]
fn test_unbounded_window_never_spills() {
    let dir = tempdir().unwrap();
    let options = StreamingOptions::default()
        .with_window_size(WindowSize::Unbounded)
        .with_temp_dir(dir.path());
    let mut wb = StreamingWorkbook::with_options(options);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    for i in 0..1_000 {
        sheet.create_row(i).unwrap();
    }

    assert_eq!(sheet.resident_row_count(), 1_000);
    assert_eq!(sheet.flush_boundary(), 0);
    assert!(sheet.spill_path().is_none());
}

#[test]
fn test_write_twice_and_keep_appending() {
    let (_dir, mut wb) = workbook(4);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    for i in 0..10 {
        sheet.write_row(i, [i as i64]).unwrap();
    }

    let first = write_to_memory(&mut wb);
    let second = write_to_memory(&mut wb);
    assert_eq!(first.entry(SHEET1), second.entry(SHEET1));

    wb.sheet_mut("Sheet1").unwrap().write_row(10, [10i64]).unwrap();
    let third = write_to_memory(&mut wb);
    assert_eq!(row_numbers(third.entry_str(SHEET1).unwrap()).len(), 11);
}

#[test]
fn test_sheets_written_in_creation_order() {
    let (_dir, mut wb) = workbook(2);
    for name in ["Zeta", "Alpha", "Mid"] {
        let sheet = wb.create_sheet(name).unwrap();
        for i in 0..5 {
            sheet.write_row(i, [format!("{}-{}", name, i)]).unwrap();
        }
    }

    let archive = write_to_memory(&mut wb);
    let workbook_xml = archive.entry_str("xl/workbook.xml").unwrap();
    let zeta = workbook_xml.find("name=\"Zeta\"").unwrap();
    let alpha = workbook_xml.find("name=\"Alpha\"").unwrap();
    assert!(zeta < alpha);

    assert!(archive
        .entry_str("xl/worksheets/sheet2.xml")
        .unwrap()
        .contains(">Alpha-0<"));
    assert!(archive
        .entry_str("[Content_Types].xml")
        .unwrap()
        .contains("/xl/worksheets/sheet3.xml"));
}

#[test]
fn test_dispose_twice_leaves_no_files() {
    let (dir, mut wb) = workbook(1);
    for name in ["A", "B"] {
        let sheet = wb.create_sheet(name).unwrap();
        for i in 0..5 {
            sheet.create_row(i).unwrap();
        }
    }

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    wb.dispose().unwrap();
    wb.dispose().unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    // a disposed workbook cannot be written any more
    let mut archive = MemoryArchive::new();
    assert!(wb.write(&mut archive).unwrap_err().is_spill_error());
}

#[test]
fn test_drop_removes_spill_files() {
    let dir = tempdir().unwrap();
    {
        let options = StreamingOptions::default()
            .with_window_size(WindowSize::rows(1).unwrap())
            .with_temp_dir(dir.path());
        let mut wb = StreamingWorkbook::with_options(options);
        let sheet = wb.create_sheet("Sheet1").unwrap();
        for i in 0..3 {
            sheet.create_row(i).unwrap();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_save_xlsx_file() {
    let (dir, mut wb) = workbook(10);
    let sheet = wb.create_sheet("Report").unwrap();
    sheet
        .create_row(0)
        .unwrap()
        .set_styled_cell(0, "Name", CellStyle::HeaderBold)
        .unwrap()
        .set_styled_cell(1, "Total", CellStyle::HeaderBold)
        .unwrap();
    for i in 1..100u32 {
        let mut row = sheet.create_row(i).unwrap();
        row.set_cell(0, format!("Item {}", i)).unwrap();
        row.set_cell(1, CellValue::Float(i as f64 * 0.5)).unwrap();
    }
    sheet
        .create_row(100)
        .unwrap()
        .set_cell(1, CellValue::Formula("=SUM(B2:B100)".to_string()))
        .unwrap();

    let path = dir.path().join("report.xlsx");
    wb.save(&path).unwrap();
    wb.dispose().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.len() > 100);
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn test_remove_then_recreate_resident_row() {
    let (_dir, mut wb) = workbook(5);
    let sheet = wb.create_sheet("Sheet1").unwrap();
    sheet.write_row(3, ["old"]).unwrap();
    sheet.remove_row(3).unwrap();
    sheet.write_row(3, ["new"]).unwrap();

    let archive = write_to_memory(&mut wb);
    let xml = archive.entry_str(SHEET1).unwrap();
    assert!(xml.contains(">new<"));
    assert!(!xml.contains(">old<"));
}

mod window_laws {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 48,
            .. ProptestConfig::default()
        })]

        #[test]
        fn resident_count_and_boundary(
            window in 1usize..16,
            indices in prop::collection::btree_set(0u32..5_000, 0..64),
        ) {
            let (_dir, mut wb) = workbook(window);
            let sheet = wb.create_sheet("Sheet1").unwrap();
            let indices: Vec<u32> = indices.into_iter().collect();
            for &i in &indices {
                sheet.create_row(i).unwrap();
            }

            let n = indices.len();
            prop_assert_eq!(sheet.resident_row_count(), n.min(window));
            let expected_boundary = if n > window { indices[n - window - 1] + 1 } else { 0 };
            prop_assert_eq!(sheet.flush_boundary(), expected_boundary);
        }

        #[test]
        fn consecutive_rows_give_boundary_n_minus_window(
            window in 1usize..16,
            n in 0u32..80,
        ) {
            let (_dir, mut wb) = workbook(window);
            let sheet = wb.create_sheet("Sheet1").unwrap();
            for i in 0..n {
                sheet.create_row(i).unwrap();
            }
            prop_assert_eq!(sheet.resident_row_count(), (n as usize).min(window));
            prop_assert_eq!(sheet.flush_boundary() as usize, (n as usize).saturating_sub(window));
        }

        #[test]
        fn rows_below_boundary_always_rejected(
            window in 1usize..8,
            n in 1u32..60,
            below in 0u32..60,
        ) {
            let (_dir, mut wb) = workbook(window);
            let sheet = wb.create_sheet("Sheet1").unwrap();
            for i in 0..n {
                sheet.create_row(i).unwrap();
            }
            let boundary = sheet.flush_boundary();
            prop_assume!(below < boundary);
            let rejected = matches!(
                sheet.create_row(below),
                Err(ExcelError::RowAlreadyFlushed { .. })
            );
            prop_assert!(rejected);
        }

        #[test]
        fn output_rows_match_created_rows(
            window in 1usize..6,
            indices in prop::collection::btree_set(0u32..300, 1..40),
        ) {
            let (_dir, mut wb) = workbook(window);
            let sheet = wb.create_sheet("Sheet1").unwrap();
            for &i in &indices {
                sheet.write_row(i, [i as i64]).unwrap();
            }
            let archive = write_to_memory(&mut wb);
            let written: BTreeSet<u32> = row_numbers(archive.entry_str(SHEET1).unwrap())
                .into_iter()
                .map(|r| r - 1)
                .collect();
            prop_assert_eq!(written, indices);
        }
    }
}
