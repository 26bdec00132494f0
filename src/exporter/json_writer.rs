// ==========================================
// 多格式表格合并系统 - JSON 导出
// ==========================================
// 输出: { "data": [ {列: 值} ], "count": N, "columns": [...] }
// 空值输出为空串，其余值保留 JSON 类型
// ==========================================

use crate::domain::table::{CellValue, Table};
use crate::error::MergeResult;
use crate::exporter::writer_trait::{padded_row, write_error, TableWriter};
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct JsonWriter;

/// 单元格 → JSON 值
pub fn cell_to_json(cell: &CellValue) -> Value {
    match cell {
        CellValue::Null => Value::String(String::new()),
        CellValue::Bool(b) => Value::Bool(*b),
        CellValue::Int(i) => Value::from(*i),
        CellValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(cell.to_string())),
        CellValue::Text(s) => Value::String(s.clone()),
        CellValue::DateTime(_) => Value::String(cell.to_string()),
    }
}

impl TableWriter for JsonWriter {
    fn write(&self, table: &Table, path: &Path) -> MergeResult<()> {
        let width = table.header.len();
        let data: Vec<Value> = table
            .rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = table
                    .header
                    .iter()
                    .cloned()
                    .zip(padded_row(row, width).map(cell_to_json))
                    .collect();
                Value::Object(record)
            })
            .collect();

        let document = json!({
            "data": data,
            "count": table.rows.len(),
            "columns": table.header,
        });

        let file = File::create(path).map_err(|e| write_error(path, e))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, &document).map_err(|e| write_error(path, e))?;
        out.flush().map_err(|e| write_error(path, e))?;

        tracing::debug!(path = %path.display(), rows = table.rows.len(), "JSON 写出完成");
        Ok(())
    }
}
