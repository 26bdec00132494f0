// ==========================================
// 多格式表格合并系统 - XLSX 导出
// ==========================================
// 工作表: "Merged"，第 0 行为表头，数据行 i 写在第 i+1 行
// 图片: 按合并后的 (行, 列) 嵌入，单张失败记录 warn 后跳过
// ==========================================

use crate::domain::table::{CellValue, PlacedImage, Table};
use crate::error::MergeResult;
use crate::exporter::writer_trait::{padded_row, write_error, TableWriter};
use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Image, Workbook, Worksheet, XlsxError};
use std::path::Path;

pub const SHEET_NAME: &str = "Merged";
const DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

pub struct XlsxWriter;

impl TableWriter for XlsxWriter {
    fn write(&self, table: &Table, path: &Path) -> MergeResult<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;
        let date_format = Format::new().set_num_format(DATETIME_NUM_FORMAT);

        for (col, name) in table.header.iter().enumerate() {
            worksheet.write_string(0, to_col(col, path)?, name)?;
        }

        let width = table.header.len();
        for (idx, row) in table.rows.iter().enumerate() {
            let sheet_row = to_row(idx + 1, path)?;
            for (col, cell) in padded_row(row, width).enumerate() {
                write_cell(worksheet, sheet_row, to_col(col, path)?, cell, &date_format)?;
            }
        }

        let mut embedded = 0usize;
        for image in &table.images {
            match insert_image(worksheet, image) {
                Ok(()) => embedded += 1,
                Err(e) => tracing::warn!(
                    row = image.row,
                    col = image.col,
                    error = %e,
                    "图片嵌入失败，已跳过"
                ),
            }
        }

        workbook.save(path)?;
        tracing::debug!(
            path = %path.display(),
            rows = table.rows.len(),
            images = embedded,
            "XLSX 写出完成"
        );
        Ok(())
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    date_format: &Format,
) -> Result<(), XlsxError> {
    match cell {
        CellValue::Null => {}
        CellValue::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        CellValue::Int(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        CellValue::Float(f) if f.is_finite() => {
            worksheet.write_number(row, col, *f)?;
        }
        CellValue::DateTime(dt) => match to_excel_datetime(dt) {
            Ok(excel_dt) => {
                worksheet.write_datetime_with_format(row, col, &excel_dt, date_format)?;
            }
            // Excel 不支持 1900 年以前的日期
            Err(_) => {
                worksheet.write_string(row, col, cell.to_string())?;
            }
        },
        other => {
            worksheet.write_string(row, col, other.to_string())?;
        }
    }
    Ok(())
}

fn to_excel_datetime(dt: &NaiveDateTime) -> Result<ExcelDateTime, XlsxError> {
    let year = u16::try_from(dt.year()).map_err(|_| XlsxError::DateTimeRangeError(dt.to_string()))?;
    ExcelDateTime::from_ymd(year, dt.month() as u8, dt.day() as u8)?.and_hms(
        dt.hour() as u16,
        dt.minute() as u8,
        dt.second(),
    )
}

fn insert_image(worksheet: &mut Worksheet, image: &PlacedImage) -> Result<(), XlsxError> {
    let row = u32::try_from(image.row + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
    let col = u16::try_from(image.col).map_err(|_| XlsxError::RowColumnLimitError)?;
    let picture = Image::new_from_buffer(&image.data)?.set_scale_to_size(
        image.width,
        image.height,
        false,
    );
    worksheet.insert_image(row, col, &picture)?;
    Ok(())
}

fn to_row(row: usize, path: &Path) -> MergeResult<u32> {
    u32::try_from(row).map_err(|_| write_error(path, format!("行号超出范围: {}", row)))
}

fn to_col(col: usize, path: &Path) -> MergeResult<u16> {
    u16::try_from(col).map_err(|_| write_error(path, format!("列号超出范围: {}", col)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use chrono::NaiveDate;

    #[test]
    fn test_xlsx_writer_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let dt = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let table = Table::new(
            vec!["name".into(), "qty".into(), "ok".into(), "when".into()],
            vec![
                vec![
                    CellValue::text("a"),
                    CellValue::Int(3),
                    CellValue::Bool(true),
                    CellValue::DateTime(dt),
                ],
                vec![CellValue::text("b")],
            ],
        );

        XlsxWriter.write(&table, &path).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec![SHEET_NAME.to_string()]);
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(range.get_value((0, 1)), Some(&Data::String("qty".into())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(3.0)));
        assert_eq!(range.get_value((1, 2)), Some(&Data::Bool(true)));
        assert!(matches!(range.get_value((1, 3)), Some(Data::DateTime(_))));
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("b".into())));
    }

    #[test]
    fn test_xlsx_writer_skips_broken_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let mut table = Table::new(vec!["photo".into()], vec![vec![CellValue::Null]]);
        table.images.push(PlacedImage {
            data: b"not an image".to_vec(),
            row: 0,
            col: 0,
            width: 50,
            height: 50,
        });

        XlsxWriter.write(&table, &path).unwrap();
        assert!(path.exists());
    }
}
