// ==========================================
// 多格式表格合并系统 - 通用文件写出
// ==========================================
// 输出格式: 参数指定，目标路径扩展名为支持格式时以扩展名为准
// 表头为空一律报错；xls 需要 legacy-xls 能力
// ==========================================

use crate::config::{ProcessorConfig, WriterCapabilities};
use crate::domain::format::FileFormat;
use crate::domain::table::Table;
use crate::error::{MergeError, MergeResult};
use crate::exporter::csv_writer::CsvWriter;
use crate::exporter::json_writer::JsonWriter;
use crate::exporter::writer_trait::{write_error, TableWriter};
use crate::exporter::xlsx_writer::XlsxWriter;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub struct FileWriter {
    csv_bom: bool,
    #[cfg_attr(not(feature = "legacy-xls"), allow(dead_code))]
    capabilities: WriterCapabilities,
}

impl FileWriter {
    pub fn new(config: &ProcessorConfig, capabilities: WriterCapabilities) -> Self {
        Self {
            csv_bom: config.csv_output_bom,
            capabilities,
        }
    }

    /// 最终使用的输出格式
    pub fn resolve_format(destination: &Path, requested: FileFormat) -> FileFormat {
        FileFormat::from_path(destination).unwrap_or(requested)
    }

    /// 写出表格
    ///
    /// # 参数
    /// - table: 待写出的表格
    /// - destination: 目标路径（父目录不存在时自动创建）
    /// - format: 请求的格式
    ///
    /// # 返回
    /// - Ok(PathBuf): 实际写出的路径
    /// - Err(EmptyHeader / MissingDependency / WriteError)
    #[instrument(skip(self, table), fields(destination = %destination.display()))]
    pub fn write(&self, table: &Table, destination: &Path, format: FileFormat) -> MergeResult<PathBuf> {
        if table.header.is_empty() {
            return Err(MergeError::EmptyHeader);
        }

        let format = Self::resolve_format(destination, format);
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
        }

        match format {
            FileFormat::Xlsx => XlsxWriter.write(table, destination)?,
            FileFormat::Csv => CsvWriter::new(self.csv_bom).write(table, destination)?,
            FileFormat::Json => JsonWriter.write(table, destination)?,
            FileFormat::Xls => self.write_xls(table, destination)?,
        }

        tracing::info!(
            format = %format,
            rows = table.rows.len(),
            columns = table.header.len(),
            "导出完成"
        );
        Ok(destination.to_path_buf())
    }

    #[cfg(feature = "legacy-xls")]
    fn write_xls(&self, table: &Table, destination: &Path) -> MergeResult<()> {
        if !self.capabilities.legacy_xls {
            return Err(missing_xls_dependency());
        }
        crate::exporter::xls_writer::XlsWriter.write(table, destination)
    }

    #[cfg(not(feature = "legacy-xls"))]
    fn write_xls(&self, _table: &Table, _destination: &Path) -> MergeResult<()> {
        Err(missing_xls_dependency())
    }
}

fn missing_xls_dependency() -> MergeError {
    MergeError::MissingDependency("xls 导出需要启用 legacy-xls 特性（cfb）".to_string())
}
