// ==========================================
// 多格式表格合并系统 - 导出层
// ==========================================
// 职责: 按格式写出最终表格（含图片嵌入）
// 支持: .xlsx / .xls（legacy-xls 特性）/ .csv / .json
// ==========================================

pub mod csv_writer;
pub mod file_writer;
pub mod json_writer;
#[cfg(feature = "legacy-xls")]
pub mod xls_writer;
pub mod writer_trait;
pub mod xlsx_writer;

// 重导出
pub use csv_writer::CsvWriter;
pub use file_writer::FileWriter;
pub use json_writer::JsonWriter;
#[cfg(feature = "legacy-xls")]
pub use xls_writer::XlsWriter;
pub use writer_trait::TableWriter;
pub use xlsx_writer::XlsxWriter;
