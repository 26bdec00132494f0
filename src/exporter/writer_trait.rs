// ==========================================
// 多格式表格合并系统 - 导出器 Trait
// ==========================================
// 实现者: XlsxWriter / XlsWriter / CsvWriter / JsonWriter
// ==========================================

use crate::domain::table::{CellValue, Table};
use crate::error::{MergeError, MergeResult};
use std::path::Path;

static NULL_CELL: CellValue = CellValue::Null;

// ==========================================
// TableWriter Trait
// ==========================================
pub trait TableWriter {
    /// 把表格写入目标文件
    ///
    /// # 参数
    /// - table: 表头非空的表格（由 FileWriter 预先检查）
    /// - path: 目标路径，已存在则覆盖
    fn write(&self, table: &Table, path: &Path) -> MergeResult<()>;
}

/// 按表头宽度取一行：短行补空，超出表头的单元格不输出
pub fn padded_row(row: &[CellValue], width: usize) -> impl Iterator<Item = &CellValue> + '_ {
    (0..width).map(move |col| row.get(col).unwrap_or(&NULL_CELL))
}

/// 写入阶段的 IO 错误统一归为 WriteError
pub(crate) fn write_error(path: &Path, err: impl std::fmt::Display) -> MergeError {
    MergeError::WriteError(format!("{}: {}", path.display(), err))
}
