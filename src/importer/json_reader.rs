// ==========================================
// 多格式表格合并系统 - JSON 读取器
// ==========================================
// 支持: 顶层对象数组，或含 data/records/rows/items 数组的对象
// 表头: 第一条记录的键（保持原顺序）
// ==========================================

use crate::domain::format::FileFormat;
use crate::domain::table::{CellValue, SourceMetadata, SourceTable};
use crate::error::{MergeError, MergeResult};
use crate::importer::reader_trait::TableReader;
use serde_json::Value;
use std::path::Path;

const RECORD_KEYS: [&str; 4] = ["data", "records", "rows", "items"];

pub struct JsonReader;

impl JsonReader {
    /// 定位记录数组
    fn locate_records(root: &Value) -> MergeResult<&Vec<Value>> {
        match root {
            Value::Array(items) => Ok(items),
            Value::Object(map) => RECORD_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array))
                .ok_or_else(|| {
                    MergeError::JsonParseError(
                        "无法识别的 JSON 结构，需要数组或含 data/records/rows/items 的对象".to_string(),
                    )
                }),
            _ => Err(MergeError::JsonParseError(
                "JSON 根节点必须是数组或对象".to_string(),
            )),
        }
    }

    /// 字段值转文本：字符串原样，其它按 JSON 记法，null 为空串
    fn stringify(value: Option<&Value>) -> CellValue {
        match value {
            None | Some(Value::Null) => CellValue::text(""),
            Some(Value::String(s)) => CellValue::text(s.as_str()),
            Some(other) => CellValue::Text(other.to_string()),
        }
    }
}

impl TableReader for JsonReader {
    fn read(&self, path: &Path) -> MergeResult<SourceTable> {
        let content = std::fs::read_to_string(path)?;
        let root: Value = serde_json::from_str(&content)?;
        let records = Self::locate_records(&root)?;

        let first = records
            .first()
            .ok_or_else(|| MergeError::JsonParseError(format!("{} 不包含任何记录", path.display())))?;
        let header: Vec<String> = first
            .as_object()
            .ok_or_else(|| MergeError::JsonParseError("JSON 记录必须是对象".to_string()))?
            .keys()
            .cloned()
            .collect();

        let mut rows = Vec::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or_else(|| {
                MergeError::JsonParseError(format!("第 {} 条记录不是对象", idx + 1))
            })?;
            rows.push(
                header
                    .iter()
                    .map(|key| Self::stringify(object.get(key)))
                    .collect(),
            );
        }

        tracing::debug!(file = %path.display(), columns = header.len(), rows = rows.len(), "JSON 读取完成");

        let mut metadata = SourceMetadata::new(FileFormat::Json);
        metadata.encoding = Some("utf-8".to_string());
        metadata.row_positions = (0..rows.len()).collect();
        Ok(SourceTable {
            header,
            rows,
            metadata,
        })
    }
}
