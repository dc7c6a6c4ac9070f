//! Row serialization into SpreadsheetML fragments
//!
//! Every fragment is self-contained: strings are written inline instead of
//! through a shared-strings table, so a spilled row never refers to state
//! that lives only in memory.

use crate::error::Result;
use crate::types::{CellValue, Row};
use std::collections::BTreeMap;

/// Sheet-level metadata written before the first row
#[derive(Debug, Clone, Copy)]
pub struct SheetHeader<'a> {
    pub name: &'a str,
    /// Explicit column widths in characters, keyed by 0-based column
    pub column_widths: &'a BTreeMap<u32, f64>,
}

/// Turns rows into bytes for the spill store and the final archive
pub trait RowEncoder {
    fn sheet_header(&self, header: &SheetHeader<'_>, out: &mut Vec<u8>) -> Result<()>;

    /// Append one complete row fragment to `out`
    fn encode_row(&self, row: &Row, out: &mut Vec<u8>) -> Result<()>;

    fn sheet_footer(&self, out: &mut Vec<u8>) -> Result<()>;
}

/// Default encoder producing worksheet XML
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlRowEncoder;

impl XmlRowEncoder {
    pub fn new() -> Self {
        XmlRowEncoder
    }
}

impl RowEncoder for XmlRowEncoder {
    fn sheet_header(&self, header: &SheetHeader<'_>, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        );

        if !header.column_widths.is_empty() {
            let mut num_buffer = itoa::Buffer::new();
            out.extend_from_slice(b"<cols>");
            for (&col, &width) in header.column_widths {
                let col_num = num_buffer.format(col + 1);
                out.extend_from_slice(b"<col min=\"");
                out.extend_from_slice(col_num.as_bytes());
                out.extend_from_slice(b"\" max=\"");
                out.extend_from_slice(col_num.as_bytes());
                out.extend_from_slice(b"\" width=\"");
                out.extend_from_slice(format_width(width).as_bytes());
                out.extend_from_slice(b"\" customWidth=\"1\"/>");
            }
            out.extend_from_slice(b"</cols>");
        }

        out.extend_from_slice(b"<sheetData>");
        Ok(())
    }

    fn encode_row(&self, row: &Row, out: &mut Vec<u8>) -> Result<()> {
        let mut num_buffer = itoa::Buffer::new();
        let row_num = row.index() + 1;

        out.extend_from_slice(b"<row r=\"");
        out.extend_from_slice(num_buffer.format(row_num).as_bytes());
        out.push(b'"');
        if let Some(height) = row.height() {
            out.extend_from_slice(b" ht=\"");
            out.extend_from_slice(height.to_string().as_bytes());
            out.extend_from_slice(b"\" customHeight=\"1\"");
        }
        if row.is_hidden() {
            out.extend_from_slice(b" hidden=\"1\"");
        }

        if row.is_empty() {
            out.extend_from_slice(b"/>");
            return Ok(());
        }
        out.push(b'>');

        for cell in row.cells() {
            out.extend_from_slice(b"<c r=\"");
            push_column_letter(out, cell.col + 1);
            out.extend_from_slice(num_buffer.format(row_num).as_bytes());
            out.push(b'"');

            let style_id = cell.style.index();
            if style_id > 0 {
                out.extend_from_slice(b" s=\"");
                out.extend_from_slice(num_buffer.format(style_id).as_bytes());
                out.push(b'"');
            }

            match &cell.value {
                CellValue::Empty => {
                    out.extend_from_slice(b"/>");
                }
                CellValue::Int(i) => {
                    out.extend_from_slice(b" t=\"n\"><v>");
                    out.extend_from_slice(num_buffer.format(*i).as_bytes());
                    out.extend_from_slice(b"</v></c>");
                }
                CellValue::Float(f) | CellValue::DateTime(f) if !f.is_finite() => {
                    out.extend_from_slice(b" t=\"e\"><v>#NUM!</v></c>");
                }
                CellValue::Float(f) | CellValue::DateTime(f) => {
                    out.extend_from_slice(b" t=\"n\"><v>");
                    out.extend_from_slice(f.to_string().as_bytes());
                    out.extend_from_slice(b"</v></c>");
                }
                CellValue::Bool(b) => {
                    out.extend_from_slice(b" t=\"b\"><v>");
                    out.extend_from_slice(if *b { b"1" } else { b"0" });
                    out.extend_from_slice(b"</v></c>");
                }
                CellValue::String(s) => {
                    out.extend_from_slice(b" t=\"inlineStr\"><is><t");
                    if needs_preserve(s) {
                        out.extend_from_slice(b" xml:space=\"preserve\"");
                    }
                    out.push(b'>');
                    write_escaped(out, s);
                    out.extend_from_slice(b"</t></is></c>");
                }
                CellValue::Formula(f) => {
                    out.extend_from_slice(b"><f>");
                    write_escaped(out, f.trim_start_matches('='));
                    out.extend_from_slice(b"</f></c>");
                }
                CellValue::Error(e) => {
                    out.extend_from_slice(b" t=\"e\"><v>");
                    write_escaped(out, e);
                    out.extend_from_slice(b"</v></c>");
                }
            }
        }

        out.extend_from_slice(b"</row>");
        Ok(())
    }

    fn sheet_footer(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(b"</sheetData></worksheet>");
        Ok(())
    }
}

fn format_width(width: f64) -> String {
    let rounded = (width * 100.0).round() / 100.0;
    rounded.to_string()
}

fn needs_preserve(s: &str) -> bool {
    s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace)
}

/// Append column letters for a 1-based column number
pub(crate) fn push_column_letter(buffer: &mut Vec<u8>, mut n: u32) {
    if n == 0 {
        return;
    }
    let mut tmp = [0u8; 10];
    let mut len = 0;
    while n > 0 {
        let rem = (n - 1) % 26;
        tmp[len] = b'A' + rem as u8;
        len += 1;
        n = (n - 1) / 26;
    }
    buffer.extend(tmp[..len].iter().rev());
}

pub(crate) fn write_escaped(buffer: &mut Vec<u8>, s: &str) {
    for c in s.chars() {
        match c {
            '&' => buffer.extend_from_slice(b"&amp;"),
            '<' => buffer.extend_from_slice(b"&lt;"),
            '>' => buffer.extend_from_slice(b"&gt;"),
            '"' => buffer.extend_from_slice(b"&quot;"),
            '\'' => buffer.extend_from_slice(b"&apos;"),
            // XML 1.0 forbids most control characters
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            _ => {
                let mut buf = [0; 4];
                buffer.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}
