// ==========================================
// 多格式表格合并系统 - Excel 读取器
// ==========================================
// 第一遍: calamine 读取第一个工作表的缓存值（公式取计算结果）
// 第二遍: 直接解析 xlsx 包内的绘图部件提取图片（仅 .xlsx）
// 坐标: 按工作表绝对行列重建网格，表头行号与图片锚点同一原点
// ==========================================

use crate::config::ProcessorConfig;
use crate::domain::format::FileFormat;
use crate::domain::table::{CellValue, SourceMetadata, SourceTable};
use crate::error::{MergeError, MergeResult};
use crate::importer::image_extractor::ImageExtractor;
use crate::importer::reader_trait::TableReader;
use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use std::path::Path;

pub struct ExcelReader {
    config: ProcessorConfig,
}

impl ExcelReader {
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// 单元格转换：整数值浮点数按整数处理
    fn convert_cell(cell: &Data) -> CellValue {
        match cell {
            Data::Empty => CellValue::Null,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
                    CellValue::Int(*f as i64)
                } else {
                    CellValue::Float(*f)
                }
            }
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(_) | Data::DateTimeIso(_) => cell
                .as_datetime()
                .map(CellValue::DateTime)
                .unwrap_or_else(|| CellValue::Text(cell.to_string())),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) => CellValue::Text(cell.to_string()),
        }
    }

    /// 以工作表绝对坐标重建网格（range 左上角之前的行列补空）
    fn absolute_grid(range: &Range<Data>) -> Vec<Vec<CellValue>> {
        let Some((start_row, start_col)) = range.start() else {
            return Vec::new();
        };

        let mut grid: Vec<Vec<CellValue>> = vec![Vec::new(); start_row as usize];
        for row in range.rows() {
            let mut cells = vec![CellValue::Null; start_col as usize];
            cells.extend(row.iter().map(Self::convert_cell));
            grid.push(cells);
        }
        grid
    }

    /// 表头识别：从第一个非空行起，在窗口内取非空单元格最多的行（并列取最早）
    pub fn detect_header_row(grid: &[Vec<CellValue>], window: usize) -> usize {
        let non_empty = |row: &Vec<CellValue>| row.iter().filter(|c| c.is_meaningful()).count();

        let first = grid
            .iter()
            .position(|row| non_empty(row) > 0)
            .unwrap_or(0);
        let end = grid.len().min(first + window.max(1));

        let mut best_idx = first;
        let mut best_count: Option<usize> = None;
        for (idx, row) in grid.iter().enumerate().take(end).skip(first) {
            let count = non_empty(row);
            if best_count.map_or(true, |best| count > best) {
                best_count = Some(count);
                best_idx = idx;
            }
        }
        best_idx
    }
}

impl TableReader for ExcelReader {
    fn read(&self, path: &Path) -> MergeResult<SourceTable> {
        let format = FileFormat::require_from_path(path)?;

        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| MergeError::ExcelParseError(format!("{} 不包含工作表", path.display())))??;

        let grid = Self::absolute_grid(&range);
        if grid.is_empty() {
            return Err(MergeError::EmptySheet(path.display().to_string()));
        }

        let header_row = Self::detect_header_row(&grid, self.config.header_scan_rows);
        let header: Vec<String> = grid[header_row]
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let image_columns: Vec<usize> = header
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty() && self.config.is_image_column(name))
            .map(|(idx, _)| idx)
            .collect();

        let mut rows = Vec::new();
        let mut row_positions = Vec::new();
        for (idx, row) in grid.iter().enumerate().skip(header_row + 1) {
            if !row.iter().any(CellValue::is_meaningful) {
                continue;
            }
            let mut normalized = row.clone();
            for &col in &image_columns {
                if let Some(cell) = normalized.get_mut(col) {
                    *cell = CellValue::Null;
                }
            }
            rows.push(normalized);
            row_positions.push(idx);
        }

        let mut metadata = SourceMetadata::new(format);
        metadata.header_row = header_row;
        metadata.row_positions = row_positions;
        if format == FileFormat::Xlsx {
            metadata.images = ImageExtractor::new(&self.config).extract(path);
        }

        tracing::debug!(
            file = %path.display(),
            header_row,
            columns = header.len(),
            rows = rows.len(),
            images = metadata.images.len(),
            "Excel 读取完成"
        );

        Ok(SourceTable {
            header,
            rows,
            metadata,
        })
    }
}
