// ==========================================
// 多格式表格合并系统 - 通用文件读取器
// ==========================================
// 根据扩展名自动选择读取器
// ==========================================

use crate::config::ProcessorConfig;
use crate::domain::format::FileFormat;
use crate::domain::table::SourceTable;
use crate::error::{MergeError, MergeResult};
use crate::importer::csv_reader::CsvReader;
use crate::importer::excel_reader::ExcelReader;
use crate::importer::json_reader::JsonReader;
use crate::importer::reader_trait::TableReader;
use std::path::Path;

pub struct UniversalReader {
    csv: CsvReader,
    excel: ExcelReader,
}

impl UniversalReader {
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            csv: CsvReader::new(config),
            excel: ExcelReader::new(config),
        }
    }
}

impl TableReader for UniversalReader {
    fn read(&self, path: &Path) -> MergeResult<SourceTable> {
        // 检查文件存在
        if !path.exists() {
            return Err(MergeError::FileNotFound(path.display().to_string()));
        }

        match FileFormat::require_from_path(path)? {
            FileFormat::Csv => self.csv.read(path),
            FileFormat::Json => JsonReader.read(path),
            FileFormat::Xlsx | FileFormat::Xls => self.excel.read(path),
        }
    }
}
