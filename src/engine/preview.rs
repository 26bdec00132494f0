// ==========================================
// 多格式表格合并系统 - 数据预览
// ==========================================
// 职责: 样例行 + 列类型推断 + 空值计数 + 基本统计
// 类型推断: 取前 100 个非空值，多数类型胜出（平票取先出现者）
// ==========================================

use crate::domain::report::{ColumnProfile, ColumnStatistics, ColumnType, TablePreview, ValueCount};
use crate::domain::table::{CellValue, Table};
use crate::engine::patterns::{is_email, is_phone, looks_like_date};
use std::collections::HashMap;

const TYPE_SAMPLE_SIZE: usize = 100;
const TOP_VALUES: usize = 5;

pub struct PreviewGenerator;

impl PreviewGenerator {
    pub fn generate(&self, table: &Table, max_rows: usize) -> TablePreview {
        let columns = table
            .header
            .iter()
            .enumerate()
            .map(|(col, name)| profile_column(table, col, name))
            .collect();

        TablePreview {
            headers: table.header.clone(),
            sample_rows: table.rows.iter().take(max_rows).cloned().collect(),
            total_rows: table.rows.len(),
            total_columns: table.header.len(),
            columns,
        }
    }
}

fn profile_column(table: &Table, col: usize, name: &str) -> ColumnProfile {
    let values = table.column_values(col);
    let null_count = values.iter().filter(|c| c.is_blank()).count();
    let present: Vec<&CellValue> = values.into_iter().filter(|c| !c.is_blank()).collect();

    let column_type = majority_type(&present);
    let statistics = match column_type {
        ColumnType::Number => numeric_statistics(&present),
        ColumnType::Text => Some(text_statistics(&present)),
        _ => None,
    };

    ColumnProfile {
        name: name.to_string(),
        column_type,
        null_count,
        statistics,
    }
}

/// 单个值的类型
pub fn detect_type(cell: &CellValue) -> ColumnType {
    match cell {
        CellValue::Int(_) | CellValue::Float(_) => ColumnType::Number,
        CellValue::DateTime(_) => ColumnType::Date,
        CellValue::Text(s) => {
            if looks_like_date(s) {
                ColumnType::Date
            } else if cell.as_number().is_some() {
                ColumnType::Number
            } else if is_email(s) {
                ColumnType::Email
            } else if is_phone(s) {
                ColumnType::Phone
            } else {
                ColumnType::Text
            }
        }
        CellValue::Bool(_) | CellValue::Null => ColumnType::Unknown,
    }
}

fn majority_type(present: &[&CellValue]) -> ColumnType {
    let mut counts: Vec<(ColumnType, usize)> = Vec::new();
    for cell in present.iter().take(TYPE_SAMPLE_SIZE) {
        let kind = detect_type(cell);
        match counts.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, n)) => *n += 1,
            None => counts.push((kind, 1)),
        }
    }

    // 严格大于才替换，保证平票时先出现者胜出
    let mut best: Option<(ColumnType, usize)> = None;
    for (kind, n) in counts {
        if best.map_or(true, |(_, m)| n > m) {
            best = Some((kind, n));
        }
    }
    best.map(|(kind, _)| kind).unwrap_or(ColumnType::Unknown)
}

fn numeric_statistics(present: &[&CellValue]) -> Option<ColumnStatistics> {
    let mut values: Vec<f64> = present
        .iter()
        .filter_map(|c| c.as_number())
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let count = values.len();
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };

    Some(ColumnStatistics::Numeric {
        min: values[0],
        max: values[count - 1],
        mean: values.iter().sum::<f64>() / count as f64,
        median,
        count,
    })
}

fn text_statistics(present: &[&CellValue]) -> ColumnStatistics {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for cell in present {
        let text = cell.to_string();
        let entry = counts.entry(text.clone()).or_insert(0);
        if *entry == 0 {
            order.push(text);
        }
        *entry += 1;
    }

    let unique_count = order.len();
    let mut ranked: Vec<ValueCount> = order
        .into_iter()
        .map(|value| {
            let count = counts.get(&value).copied().unwrap_or(0);
            ValueCount { value, count }
        })
        .collect();
    // 稳定排序：计数相同保持首次出现顺序
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(TOP_VALUES);

    ColumnStatistics::Text {
        unique_count,
        total_count: present.len(),
        top_values: ranked,
    }
}
