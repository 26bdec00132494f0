// ==========================================
// 多格式表格合并系统 - 读取器 Trait
// ==========================================
// 实现者: CsvReader / JsonReader / ExcelReader
// ==========================================

use crate::domain::table::SourceTable;
use crate::error::MergeResult;
use std::path::Path;

// ==========================================
// TableReader Trait
// ==========================================
pub trait TableReader {
    /// 读取单个文件为 (表头, 数据行, 元数据)
    ///
    /// # 参数
    /// - path: 源文件路径
    ///
    /// # 返回
    /// - Ok(SourceTable): 表头已去空白；数据行已剔除全空行
    /// - Err: 格式错误（致命，调用方不做部分跳过）
    fn read(&self, path: &Path) -> MergeResult<SourceTable>;
}

impl<T: TableReader + ?Sized> TableReader for &T {
    fn read(&self, path: &Path) -> MergeResult<SourceTable> {
        (**self).read(path)
    }
}
