// ==========================================
// 多格式表格合并系统 - XLS 导出（BIFF8）
// ==========================================
// 容器: OLE 复合文档（cfb），单个 Workbook 流
// 内容: 全局子流（字体/格式/XF/工作表目录/共享字符串表）+ 单个工作表子流
// 文本: 全部进入 SST，单元格写 LABELSST 引用；超长 SST 用 CONTINUE 续接
// 限制: 65536 行 × 256 列；文本单元格最多 32767 字符；不支持图片
// ==========================================

use crate::domain::table::{CellValue, Table};
use crate::error::{MergeError, MergeResult};
use crate::exporter::writer_trait::{padded_row, write_error, TableWriter};
use crate::exporter::xlsx_writer::SHEET_NAME;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const MAX_ROWS: usize = 65_536;
pub const MAX_COLUMNS: usize = 256;
pub const MAX_TEXT_CHARS: usize = 32_767;
/// 单条记录数据区上限（不含 4 字节记录头）
const MAX_RECORD_DATA: usize = 8_224;

// 记录类型
const BOF: u16 = 0x0809;
const EOF: u16 = 0x000A;
const CODEPAGE: u16 = 0x0042;
const WINDOW1: u16 = 0x003D;
const FONT: u16 = 0x0031;
const FORMAT: u16 = 0x041E;
const XF: u16 = 0x00E0;
const STYLE: u16 = 0x0293;
const BOUNDSHEET: u16 = 0x0085;
const DIMENSIONS: u16 = 0x0200;
const WINDOW2: u16 = 0x023E;
const NUMBER: u16 = 0x0203;
const LABELSST: u16 = 0x00FD;
const BOOLERR: u16 = 0x0205;
const SST: u16 = 0x00FC;
const CONTINUE: u16 = 0x003C;

const BOF_GLOBALS: u16 = 0x0005;
const BOF_WORKSHEET: u16 = 0x0010;

/// 第 15 个 XF 为默认单元格格式，第 16 个为日期格式
const XF_DEFAULT: u16 = 15;
const XF_DATETIME: u16 = 16;
const DATETIME_FORMAT_ID: u16 = 164;
const DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

pub struct XlsWriter;

impl TableWriter for XlsWriter {
    fn write(&self, table: &Table, path: &Path) -> MergeResult<()> {
        if table.rows.len() + 1 > MAX_ROWS || table.header.len() > MAX_COLUMNS {
            return Err(MergeError::UnsupportedFormat(format!(
                "xls 最多 {} 行 {} 列，当前 {} 行 {} 列",
                MAX_ROWS,
                MAX_COLUMNS,
                table.rows.len() + 1,
                table.header.len()
            )));
        }
        if !table.images.is_empty() {
            tracing::warn!(images = table.images.len(), "xls 格式不支持图片，已全部丢弃");
        }

        let stream = build_workbook(table);

        let file = File::create(path).map_err(|e| write_error(path, e))?;
        let mut compound = cfb::CompoundFile::create_with_version(cfb::Version::V3, file)
            .map_err(|e| write_error(path, e))?;
        let mut workbook = compound
            .create_stream("/Workbook")
            .map_err(|e| write_error(path, e))?;
        workbook.write_all(&stream).map_err(|e| write_error(path, e))?;
        workbook.flush().map_err(|e| write_error(path, e))?;
        drop(workbook);
        compound.flush().map_err(|e| write_error(path, e))?;

        tracing::debug!(path = %path.display(), rows = table.rows.len(), bytes = stream.len(), "XLS 写出完成");
        Ok(())
    }
}

// ==========================================
// SharedStrings - 共享字符串表
// ==========================================

/// 按首次出现顺序去重；total 为引用次数
#[derive(Debug, Default)]
struct SharedStrings {
    strings: Vec<String>,
    index: HashMap<String, u32>,
    total: u32,
}

impl SharedStrings {
    fn intern(&mut self, text: &str) -> u32 {
        self.total += 1;
        if let Some(&idx) = self.index.get(text) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(text.to_string());
        self.index.insert(text.to_string(), idx);
        idx
    }

    /// SST 记录体，按 MAX_RECORD_DATA 切分；第一段写 SST，其余写 CONTINUE
    ///
    /// 字符串头（长度 + 标志）不跨段；字符跨段时新段以标志字节开头
    fn record_bodies(&self) -> Vec<Vec<u8>> {
        let mut bodies = Vec::new();
        let mut current = Vec::with_capacity(MAX_RECORD_DATA);
        current.extend_from_slice(&self.total.to_le_bytes());
        current.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());

        for text in &self.strings {
            let (flag, payload, count) = encode_chars(text);
            if current.len() + 3 > MAX_RECORD_DATA {
                bodies.push(std::mem::take(&mut current));
            }
            current.extend_from_slice(&(count as u16).to_le_bytes());
            current.push(flag);

            let unit = if flag == 0x00 { 1 } else { 2 };
            let mut rest: &[u8] = &payload;
            loop {
                let room = (MAX_RECORD_DATA - current.len()) / unit * unit;
                if rest.len() <= room {
                    current.extend_from_slice(rest);
                    break;
                }
                current.extend_from_slice(&rest[..room]);
                rest = &rest[room..];
                bodies.push(std::mem::take(&mut current));
                current.push(flag);
            }
        }
        bodies.push(current);
        bodies
    }
}

/// 生成完整的 Workbook 流
pub fn build_workbook(table: &Table) -> Vec<u8> {
    let mut strings = SharedStrings::default();
    let sheet = build_sheet(table, &mut strings);

    let mut sst = Vec::new();
    for (idx, body) in strings.record_bodies().iter().enumerate() {
        push_record(&mut sst, if idx == 0 { SST } else { CONTINUE }, body);
    }

    let mut globals = Vec::new();
    push_record(&mut globals, BOF, &bof_body(BOF_GLOBALS));
    push_record(&mut globals, CODEPAGE, &1200u16.to_le_bytes());
    push_record(&mut globals, WINDOW1, &window1_body());
    // 索引 4 保留不用，写 5 个字体保证 0..=5 可寻址
    for _ in 0..5 {
        push_record(&mut globals, FONT, &font_body("Arial"));
    }
    push_record(&mut globals, FORMAT, &format_body(DATETIME_FORMAT_ID, DATETIME_NUM_FORMAT));
    for _ in 0..XF_DEFAULT {
        push_record(&mut globals, XF, &xf_body(0, true));
    }
    push_record(&mut globals, XF, &xf_body(0, false));
    push_record(&mut globals, XF, &xf_body(DATETIME_FORMAT_ID, false));
    push_record(&mut globals, STYLE, &[0x00, 0x80, 0x00, 0xFF]);

    // BOUNDSHEET 记录需要工作表子流的绝对偏移
    let name = short_string(SHEET_NAME);
    let boundsheet_len = 4 + 4 + 2 + name.len();
    let eof_len = 4;
    let sheet_offset = (globals.len() + boundsheet_len + sst.len() + eof_len) as u32;

    let mut boundsheet = Vec::with_capacity(boundsheet_len - 4);
    boundsheet.extend_from_slice(&sheet_offset.to_le_bytes());
    boundsheet.extend_from_slice(&[0x00, 0x00]);
    boundsheet.extend_from_slice(&name);
    push_record(&mut globals, BOUNDSHEET, &boundsheet);
    globals.extend_from_slice(&sst);
    push_record(&mut globals, EOF, &[]);

    globals.extend_from_slice(&sheet);
    globals
}

fn build_sheet(table: &Table, strings: &mut SharedStrings) -> Vec<u8> {
    let width = table.header.len();
    let height = table.rows.len() + 1;

    let mut sheet = Vec::new();
    push_record(&mut sheet, BOF, &bof_body(BOF_WORKSHEET));

    let mut dimensions = Vec::with_capacity(14);
    dimensions.extend_from_slice(&0u32.to_le_bytes());
    dimensions.extend_from_slice(&(height as u32).to_le_bytes());
    dimensions.extend_from_slice(&0u16.to_le_bytes());
    dimensions.extend_from_slice(&(width as u16).to_le_bytes());
    dimensions.extend_from_slice(&0u16.to_le_bytes());
    push_record(&mut sheet, DIMENSIONS, &dimensions);
    push_record(&mut sheet, WINDOW2, &window2_body());

    for (col, name) in table.header.iter().enumerate() {
        push_text(&mut sheet, strings, 0, col as u16, name);
    }
    for (idx, row) in table.rows.iter().enumerate() {
        let sheet_row = (idx + 1) as u16;
        for (col, cell) in padded_row(row, width).enumerate() {
            push_cell(&mut sheet, strings, sheet_row, col as u16, cell);
        }
    }

    push_record(&mut sheet, EOF, &[]);
    sheet
}

fn push_cell(out: &mut Vec<u8>, strings: &mut SharedStrings, row: u16, col: u16, cell: &CellValue) {
    match cell {
        CellValue::Null => {}
        CellValue::Bool(b) => {
            let mut body = cell_header(row, col, XF_DEFAULT);
            body.extend_from_slice(&[u8::from(*b), 0x00]);
            push_record(out, BOOLERR, &body);
        }
        CellValue::Int(i) => push_number(out, row, col, XF_DEFAULT, *i as f64),
        CellValue::Float(f) if f.is_finite() => push_number(out, row, col, XF_DEFAULT, *f),
        CellValue::DateTime(dt) => match excel_serial(dt) {
            Some(serial) => push_number(out, row, col, XF_DATETIME, serial),
            None => push_text(out, strings, row, col, &cell.to_string()),
        },
        other => push_text(out, strings, row, col, &other.to_string()),
    }
}

fn push_number(out: &mut Vec<u8>, row: u16, col: u16, xf: u16, value: f64) {
    let mut body = cell_header(row, col, xf);
    body.extend_from_slice(&value.to_le_bytes());
    push_record(out, NUMBER, &body);
}

fn push_text(out: &mut Vec<u8>, strings: &mut SharedStrings, row: u16, col: u16, text: &str) {
    let chars = text.chars().count();
    let idx = if chars > MAX_TEXT_CHARS {
        tracing::warn!(row, col, chars, "xls 文本超过 32767 字符，已截断");
        let truncated: String = text.chars().take(MAX_TEXT_CHARS).collect();
        strings.intern(&truncated)
    } else {
        strings.intern(text)
    };
    let mut body = cell_header(row, col, XF_DEFAULT);
    body.extend_from_slice(&idx.to_le_bytes());
    push_record(out, LABELSST, &body);
}

fn cell_header(row: u16, col: u16, xf: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(16);
    body.extend_from_slice(&row.to_le_bytes());
    body.extend_from_slice(&col.to_le_bytes());
    body.extend_from_slice(&xf.to_le_bytes());
    body
}

/// 1900 日期系统序列号；1900-03-01 之前的日期不写为数值
pub fn excel_serial(dt: &NaiveDateTime) -> Option<f64> {
    let cutoff = NaiveDate::from_ymd_opt(1900, 3, 1)?.and_hms_opt(0, 0, 0)?;
    if *dt < cutoff {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (*dt - epoch).num_seconds();
    Some(seconds as f64 / 86_400.0)
}

fn push_record(out: &mut Vec<u8>, kind: u16, body: &[u8]) {
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
}

fn bof_body(substream: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(16);
    body.extend_from_slice(&0x0600u16.to_le_bytes());
    body.extend_from_slice(&substream.to_le_bytes());
    body.extend_from_slice(&0x0DBBu16.to_le_bytes());
    body.extend_from_slice(&0x07CCu16.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&6u32.to_le_bytes());
    body
}

fn window1_body() -> Vec<u8> {
    let fields: [u16; 9] = [0, 0, 0x25BC, 0x1572, 0x0038, 0, 0, 1, 0x0258];
    fields.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn window2_body() -> Vec<u8> {
    let mut body = Vec::with_capacity(18);
    body.extend_from_slice(&0x06B6u16.to_le_bytes());
    body.extend_from_slice(&[0u8; 4]);
    body.extend_from_slice(&0x0040u16.to_le_bytes());
    body.extend_from_slice(&[0u8; 10]);
    body
}

fn font_body(name: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&200u16.to_le_bytes()); // 10pt
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&0x7FFFu16.to_le_bytes());
    body.extend_from_slice(&400u16.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&[0, 0, 0, 0]);
    body.extend_from_slice(&short_string(name));
    body
}

fn format_body(id: u16, pattern: &str) -> Vec<u8> {
    let mut body = id.to_le_bytes().to_vec();
    body.extend_from_slice(&unicode_string(pattern));
    body
}

fn xf_body(format_id: u16, style: bool) -> Vec<u8> {
    let mut body = Vec::with_capacity(20);
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&format_id.to_le_bytes());
    let protection: u16 = if style { 0xFFF5 } else { 0x0001 };
    body.extend_from_slice(&protection.to_le_bytes());
    body.push(0x20);
    body.push(0x00);
    body.push(0x00);
    body.push(if style { 0x00 } else { 0xF8 });
    body.extend_from_slice(&[0u8; 8]);
    body.extend_from_slice(&0x20C0u16.to_le_bytes());
    body
}

/// XLUnicodeString：16 位长度 + 压缩标志 + 字符
fn unicode_string(text: &str) -> Vec<u8> {
    let (flag, payload, count) = encode_chars(text);
    let mut out = (count as u16).to_le_bytes().to_vec();
    out.push(flag);
    out.extend_from_slice(&payload);
    out
}

/// ShortXLUnicodeString：8 位长度
fn short_string(text: &str) -> Vec<u8> {
    let (flag, payload, count) = encode_chars(text);
    let mut out = vec![count as u8, flag];
    out.extend_from_slice(&payload);
    out
}

/// Latin-1 可表示时压缩为单字节，否则 UTF-16LE
fn encode_chars(text: &str) -> (u8, Vec<u8>, usize) {
    if text.chars().all(|c| (c as u32) < 0x100) {
        let bytes: Vec<u8> = text.chars().map(|c| c as u32 as u8).collect();
        let count = bytes.len();
        (0x00, bytes, count)
    } else {
        let units: Vec<u16> = text.encode_utf16().collect();
        let bytes = units.iter().flat_map(|u| u.to_le_bytes()).collect();
        (0x01, bytes, units.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::PlacedImage;
    use calamine::{open_workbook, Data, Reader, Xls};

    #[test]
    fn test_excel_serial() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(excel_serial(&dt), Some(45292.5));

        let early = NaiveDate::from_ymd_opt(1899, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(excel_serial(&early), None);
    }

    #[test]
    fn test_string_encoding() {
        assert_eq!(unicode_string("ab"), vec![2, 0, 0, b'a', b'b']);
        assert_eq!(short_string("中"), vec![1, 1, 0x2D, 0x4E]);
    }

    #[test]
    fn test_xls_writer_readable_by_calamine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xls");
        let table = Table::new(
            vec!["名称".into(), "qty".into(), "ok".into()],
            vec![
                vec![CellValue::text("苹果"), CellValue::Int(3), CellValue::Bool(false)],
                vec![CellValue::text("pear")],
            ],
        );

        XlsWriter.write(&table, &path).unwrap();

        let mut workbook: Xls<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec![SHEET_NAME.to_string()]);
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("名称".into())));
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("苹果".into())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(3.0)));
        assert_eq!(range.get_value((1, 2)), Some(&Data::Bool(false)));
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("pear".into())));
    }

    #[test]
    fn test_shared_strings_dedup() {
        let mut strings = SharedStrings::default();
        assert_eq!(strings.intern("a"), 0);
        assert_eq!(strings.intern("b"), 1);
        assert_eq!(strings.intern("a"), 0);
        assert_eq!(strings.total, 3);
        assert_eq!(strings.strings, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_text_cell_references_sst() {
        let mut strings = SharedStrings::default();
        let mut out = Vec::new();
        push_text(&mut out, &mut strings, 1, 2, "pear");
        push_text(&mut out, &mut strings, 2, 2, "pear");
        // 两条 LABELSST：4 字节记录头 + 6 字节单元格头 + 4 字节索引
        assert_eq!(out.len(), 2 * (4 + 6 + 4));
        assert_eq!(&out[0..2], &LABELSST.to_le_bytes());
        assert_eq!(&out[10..14], &0u32.to_le_bytes());
        assert_eq!(strings.strings.len(), 1);
    }

    #[test]
    fn test_text_over_limit_is_truncated() {
        let mut strings = SharedStrings::default();
        let mut out = Vec::new();
        push_text(&mut out, &mut strings, 0, 0, &"x".repeat(MAX_TEXT_CHARS + 10));
        assert_eq!(strings.strings[0].chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn test_sst_split_into_continue_records() {
        let mut strings = SharedStrings::default();
        for i in 0..60 {
            strings.intern(&format!("{}{}", i, "备".repeat(200)));
        }
        let bodies = strings.record_bodies();
        assert!(bodies.len() > 1);
        assert!(bodies.iter().all(|b| b.len() <= MAX_RECORD_DATA));
        // 首段: cstTotal + cstUnique
        assert_eq!(&bodies[0][0..4], &60u32.to_le_bytes());
        assert_eq!(&bodies[0][4..8], &60u32.to_le_bytes());
    }

    #[test]
    fn test_long_text_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.xls");
        let long = "备".repeat(300);
        let mut rows = vec![vec![CellValue::text(long.clone())]];
        // 足够多的不同长字符串，迫使 SST 跨越多条 CONTINUE
        for i in 0..80 {
            rows.push(vec![CellValue::text(format!("{}-{}", i, "注".repeat(150)))]);
        }
        let table = Table::new(vec!["备注".into()], rows);

        XlsWriter.write(&table, &path).unwrap();

        let mut workbook: Xls<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(range.get_value((1, 0)), Some(&Data::String(long)));
        assert_eq!(
            range.get_value((81, 0)),
            Some(&Data::String(format!("79-{}", "注".repeat(150))))
        );
    }

    #[test]
    fn test_images_dropped_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.xls");
        let mut table = Table::new(vec!["photo".into()], vec![vec![CellValue::Null]]);
        table.images.push(PlacedImage {
            data: vec![0x89, b'P', b'N', b'G'],
            row: 0,
            col: 0,
            width: 10,
            height: 10,
        });

        XlsWriter.write(&table, &path).unwrap();

        let mut workbook: Xls<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("photo".into())));
    }

    #[test]
    fn test_xls_writer_rejects_too_many_columns() {
        let dir = tempfile::tempdir().unwrap();
        let header = (0..300).map(|i| format!("c{}", i)).collect();
        let table = Table::new(header, vec![]);
        let err = XlsWriter.write(&table, &dir.path().join("wide.xls")).unwrap_err();
        assert!(matches!(err, MergeError::UnsupportedFormat(_)));
    }
}
