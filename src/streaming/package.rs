//! Fixed package parts of an XLSX archive
//!
//! Everything except the worksheets themselves: content types, relationships,
//! the workbook part, styles and document properties.

use super::encoder::write_escaped;
use chrono::{DateTime, SecondsFormat, Utc};

pub const CONTENT_TYPES: &str = "[Content_Types].xml";
pub const ROOT_RELS: &str = "_rels/.rels";
pub const WORKBOOK: &str = "xl/workbook.xml";
pub const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
pub const STYLES: &str = "xl/styles.xml";
pub const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
pub const APP_PROPS: &str = "docProps/app.xml";
pub const CORE_PROPS: &str = "docProps/core.xml";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Archive entry name of the 1-based `number`th worksheet
pub fn worksheet_entry(number: usize) -> String {
    format!("xl/worksheets/sheet{}.xml", number)
}

pub fn content_types(sheet_count: usize) -> Vec<u8> {
    let mut xml = String::from(XML_DECL);
    xml.push_str(
        r#"
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#,
    );
    for number in 1..=sheet_count {
        xml.push_str(&format!(
            "\n<Override PartName=\"/{}\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>",
            worksheet_entry(number)
        ));
    }
    xml.push_str("\n</Types>");
    xml.into_bytes()
}

pub fn root_rels() -> Vec<u8> {
    let mut xml = String::from(XML_DECL);
    xml.push_str(
        r#"
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#,
    );
    xml.into_bytes()
}

/// Workbook part listing sheets in order; `rIdN` points at worksheet N
pub fn workbook<'a, I>(sheet_names: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = Vec::with_capacity(512);
    out.extend_from_slice(XML_DECL.as_bytes());
    out.extend_from_slice(
        br#"
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>"#,
    );
    let mut num_buffer = itoa::Buffer::new();
    for (i, name) in sheet_names.into_iter().enumerate() {
        let id = num_buffer.format(i + 1).to_owned();
        out.extend_from_slice(b"\n<sheet name=\"");
        write_escaped(&mut out, name);
        out.extend_from_slice(b"\" sheetId=\"");
        out.extend_from_slice(id.as_bytes());
        out.extend_from_slice(b"\" r:id=\"rId");
        out.extend_from_slice(id.as_bytes());
        out.extend_from_slice(b"\"/>");
    }
    out.extend_from_slice(b"\n</sheets>\n</workbook>");
    out
}

pub fn workbook_rels(sheet_count: usize) -> Vec<u8> {
    let mut xml = String::from(XML_DECL);
    xml.push_str("\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">");
    for number in 1..=sheet_count {
        xml.push_str(&format!(
            "\n<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{}.xml\"/>",
            number, number
        ));
    }
    xml.push_str(&format!(
        "\n<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\
         \n<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings\" Target=\"sharedStrings.xml\"/>\
         \n</Relationships>",
        sheet_count + 1,
        sheet_count + 2
    ));
    xml.into_bytes()
}

/// Style sheet whose `cellXfs` order matches [`crate::types::CellStyle::index`]
pub fn styles() -> Vec<u8> {
    let mut xml = String::from(XML_DECL);
    xml.push_str(
        r#"
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="3">
<font><sz val="11"/><name val="Calibri"/></font>
<font><b/><sz val="11"/><name val="Calibri"/></font>
<font><i/><sz val="11"/><name val="Calibri"/></font>
</fonts>
<fills count="5">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/></patternFill></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FF00FF00"/></patternFill></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FFFF0000"/></patternFill></fill>
</fills>
<borders count="2">
<border><left/><right/><top/><bottom/><diagonal/></border>
<border><left style="thin"/><right style="thin"/><top style="thin"/><bottom style="thin"/><diagonal/></border>
</borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="14">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/>
<xf numFmtId="3" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="4" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="5" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="9" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/>
<xf numFmtId="0" fontId="2" fillId="0" borderId="0" xfId="0" applyFont="1"/>
<xf numFmtId="0" fontId="0" fillId="2" borderId="0" xfId="0" applyFill="1"/>
<xf numFmtId="0" fontId="0" fillId="3" borderId="0" xfId="0" applyFill="1"/>
<xf numFmtId="0" fontId="0" fillId="4" borderId="0" xfId="0" applyFill="1"/>
<xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1"/>
</cellXfs>
</styleSheet>"#,
    );
    xml.into_bytes()
}

/// Rows carry their strings inline, so the table is always empty
pub fn shared_strings() -> Vec<u8> {
    let mut xml = String::from(XML_DECL);
    xml.push_str(
        "\n<sst xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" count=\"0\" uniqueCount=\"0\"/>",
    );
    xml.into_bytes()
}

pub fn app_props() -> Vec<u8> {
    let mut xml = String::from(XML_DECL);
    xml.push_str(&format!(
        r#"
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>sxstream</Application>
<AppVersion>{}</AppVersion>
</Properties>"#,
        env!("CARGO_PKG_VERSION")
    ));
    xml.into_bytes()
}

pub fn core_props(created: DateTime<Utc>) -> Vec<u8> {
    let stamp = created.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut xml = String::from(XML_DECL);
    xml.push_str(&format!(
        r#"
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<dc:creator>sxstream</dc:creator>
<dcterms:created xsi:type="dcterms:W3CDTF">{stamp}</dcterms:created>
<dcterms:modified xsi:type="dcterms:W3CDTF">{stamp}</dcterms:modified>
</cp:coreProperties>"#
    ));
    xml.into_bytes()
}
