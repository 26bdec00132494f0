// ==========================================
// 多格式表格合并系统 - 导入层
// ==========================================
// 职责: 多格式读取 + 图片提取 + 按列名合并
// 支持: .xlsx / .xls / .csv / .json
// ==========================================

pub mod csv_reader;
pub mod excel_reader;
pub mod file_reader;
pub mod image_extractor;
pub mod json_reader;
pub mod merger;
pub mod reader_trait;

// 重导出
pub use csv_reader::{CsvEncoding, CsvReader};
pub use excel_reader::ExcelReader;
pub use file_reader::UniversalReader;
pub use image_extractor::ImageExtractor;
pub use json_reader::JsonReader;
pub use merger::{append_source, TableMerger};
pub use reader_trait::TableReader;
