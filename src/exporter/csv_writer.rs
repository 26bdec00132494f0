// ==========================================
// 多格式表格合并系统 - CSV 导出
// ==========================================
// 所有单元格按字符串输出，空值为空串；默认带 UTF-8 BOM
// ==========================================

use crate::domain::table::Table;
use crate::error::MergeResult;
use crate::exporter::writer_trait::{padded_row, write_error, TableWriter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub struct CsvWriter {
    bom: bool,
}

impl CsvWriter {
    pub fn new(bom: bool) -> Self {
        Self { bom }
    }
}

impl TableWriter for CsvWriter {
    fn write(&self, table: &Table, path: &Path) -> MergeResult<()> {
        let file = File::create(path).map_err(|e| write_error(path, e))?;
        let mut out = BufWriter::new(file);
        if self.bom {
            out.write_all(UTF8_BOM).map_err(|e| write_error(path, e))?;
        }

        let mut writer = csv::Writer::from_writer(out);
        writer
            .write_record(&table.header)
            .map_err(|e| write_error(path, e))?;

        let width = table.header.len();
        for row in &table.rows {
            let record: Vec<String> = padded_row(row, width).map(|c| c.to_string()).collect();
            writer.write_record(&record).map_err(|e| write_error(path, e))?;
        }
        writer.flush().map_err(|e| write_error(path, e))?;

        tracing::debug!(path = %path.display(), rows = table.rows.len(), bom = self.bom, "CSV 写出完成");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::CellValue;

    #[test]
    fn test_csv_writer_bom_and_padding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table::new(
            vec!["名称".into(), "数量".into()],
            vec![vec![CellValue::text("苹果"), CellValue::Int(3)], vec![CellValue::text("梨")]],
        );

        CsvWriter::new(true).write(&table, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(text, "名称,数量\n苹果,3\n梨,\n");
    }

    #[test]
    fn test_csv_writer_without_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table::new(vec!["a".into()], vec![vec![CellValue::Float(1.0)]]);

        CsvWriter::new(false).write(&table, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\n1.0\n");
    }
}
