// ==========================================
// 多格式表格合并系统 - 表格领域模型
// ==========================================
// 职责: 单元格值 / 表格 / 图片锚点 / 源文件读取结果
// 约定: 行可以比表头短，越界访问一律视为空值
// ==========================================

use crate::domain::format::FileFormat;
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;

/// 日期时间的统一字符串形式
pub const DATETIME_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static NULL_CELL: CellValue = CellValue::Null;

// ==========================================
// CellValue - 单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// 空值或空字符串
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// 去除空白后仍有内容（表头识别、空行判断用）
    pub fn is_meaningful(&self) -> bool {
        match self {
            CellValue::Null => false,
            CellValue::Text(s) => !s.trim().is_empty(),
            _ => true,
        }
    }

    /// 按数值解析；布尔与日期不参与数值计算
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// 去重 / 唯一性比较用的键
    ///
    /// 整数值的浮点数与整数视为同一个值，文本 "1" 与整数 1 不同。
    pub fn key(&self) -> ValueKey {
        match self {
            CellValue::Null => ValueKey::Null,
            CellValue::Bool(b) => ValueKey::Bool(*b),
            CellValue::Int(i) => ValueKey::Int(*i),
            CellValue::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
                    ValueKey::Int(*f as i64)
                } else {
                    ValueKey::Float(f.to_bits())
                }
            }
            CellValue::Text(s) => ValueKey::Text(s.clone()),
            CellValue::DateTime(dt) => ValueKey::DateTime(*dt),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1.0e16 {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            CellValue::Text(s) => f.write_str(s),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_DISPLAY_FORMAT)),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Int(i) => serializer.serialize_i64(*i),
            CellValue::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl From<&serde_json::Value> for CellValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Null,
            serde_json::Value::Bool(b) => CellValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => CellValue::Int(i),
                None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Null),
            },
            serde_json::Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// 可哈希的单元格比较键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    DateTime(NaiveDateTime),
}

// ==========================================
// 图片
// ==========================================

/// 读取阶段的图片锚点（工作表坐标，0 起始）
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAnchor {
    pub data: Vec<u8>,
    pub row: usize,
    pub col: usize,
    pub width: u32,
    pub height: u32,
}

/// 合并后的图片位置（row 为 Table::rows 下标，col 为表头下标）
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    pub data: Vec<u8>,
    pub row: usize,
    pub col: usize,
    pub width: u32,
    pub height: u32,
}

// ==========================================
// Table - 管道各阶段流转的表格
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    #[serde(skip)]
    pub images: Vec<PlacedImage>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            header,
            rows,
            images: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// 越界返回空值
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&NULL_CELL)
    }

    /// 取某列全部值（短行补空）
    pub fn column_values(&self, col: usize) -> Vec<&CellValue> {
        self.rows
            .iter()
            .map(|r| r.get(col).unwrap_or(&NULL_CELL))
            .collect()
    }

    /// 把短行补齐到表头宽度（长行保持不变）
    pub fn pad_rows(&mut self) {
        let width = self.header.len();
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, CellValue::Null);
            }
        }
    }

    /// 写入单元格，短行先补齐
    pub fn set_cell(&mut self, row: usize, col: usize, value: CellValue) {
        if let Some(r) = self.rows.get_mut(row) {
            if r.len() <= col {
                r.resize(col + 1, CellValue::Null);
            }
            r[col] = value;
        }
    }
}

// ==========================================
// SourceTable - 单个文件的读取结果
// ==========================================
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub metadata: SourceMetadata,
}

#[derive(Debug, Clone)]
pub struct SourceMetadata {
    pub format: FileFormat,
    /// CSV 实际使用的编码
    pub encoding: Option<String>,
    /// 表头所在的原始行号（0 起始）
    pub header_row: usize,
    /// 每个数据行在原始文件中的行号，与 rows 一一对应
    pub row_positions: Vec<usize>,
    pub images: Vec<ImageAnchor>,
}

impl SourceMetadata {
    pub fn new(format: FileFormat) -> Self {
        Self {
            format,
            encoding: None,
            header_row: 0,
            row_positions: Vec::new(),
            images: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_cell_display() {
        assert_eq!(CellValue::Null.to_string(), "");
        assert_eq!(CellValue::Int(42).to_string(), "42");
        assert_eq!(CellValue::Float(3.0).to_string(), "3.0");
        assert_eq!(CellValue::Float(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Bool(true).to_string(), "true");
        let dt = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(CellValue::DateTime(dt).to_string(), "2024-03-05 08:30:00");
    }

    #[test]
    fn test_blank_and_meaningful() {
        assert!(CellValue::Null.is_blank());
        assert!(CellValue::text("").is_blank());
        assert!(!CellValue::text(" ").is_blank());
        assert!(!CellValue::text("  ").is_meaningful());
        assert!(CellValue::Int(0).is_meaningful());
    }

    #[test]
    fn test_as_number() {
        assert_eq!(CellValue::text(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(CellValue::Int(3).as_number(), Some(3.0));
        assert_eq!(CellValue::Bool(true).as_number(), None);
        assert_eq!(CellValue::text("abc").as_number(), None);
    }

    #[test]
    fn test_key_equates_integral_float_and_int() {
        assert_eq!(CellValue::Float(1.0).key(), CellValue::Int(1).key());
        assert_ne!(CellValue::text("1").key(), CellValue::Int(1).key());
    }

    #[test]
    fn test_cell_out_of_bounds_is_null() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![CellValue::text("x")]],
        );
        assert_eq!(table.cell(0, 1), &CellValue::Null);
        assert_eq!(table.cell(5, 0), &CellValue::Null);
    }

    #[test]
    fn test_set_cell_pads_short_row() {
        let mut table = Table::new(vec!["a".into(), "b".into()], vec![vec![]]);
        table.set_cell(0, 1, CellValue::Int(7));
        assert_eq!(table.rows[0], vec![CellValue::Null, CellValue::Int(7)]);
    }

    #[test]
    fn test_from_json_value() {
        let v = serde_json::json!({"k": [1, 2]});
        assert_eq!(CellValue::from(&serde_json::json!(5)), CellValue::Int(5));
        assert_eq!(CellValue::from(&serde_json::json!("s")), CellValue::text("s"));
        assert_eq!(CellValue::from(&v), CellValue::text(r#"{"k":[1,2]}"#));
    }
}
