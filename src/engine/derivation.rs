// ==========================================
// 多格式表格合并系统 - 派生列服务
// ==========================================
// 职责: 从已有列截取子串 + 值映射，追加恰好一列
// 映射: 按列表顺序，首个命中生效；字面值须整串相等
// ==========================================

use crate::domain::rules::{DerivationRule, Extraction};
use crate::domain::table::{CellValue, Table};
use tracing::instrument;

pub struct DerivationService;

impl DerivationService {
    /// 执行派生规则
    ///
    /// # 返回
    /// - true: 已追加新列
    /// - false: 源列不存在或新列名已被占用，表格未修改
    #[instrument(skip_all, fields(source = %rule.source_column, target = %rule.new_column))]
    pub fn apply(&self, table: &mut Table, rule: &DerivationRule) -> bool {
        let Some(src) = table.column_index(&rule.source_column) else {
            tracing::warn!(column = %rule.source_column, "派生规则源列不存在，已跳过");
            return false;
        };
        if table.column_index(&rule.new_column).is_some() {
            tracing::warn!(column = %rule.new_column, "派生列名与已有列重复，已跳过");
            return false;
        }

        table.pad_rows();
        let mut mapped = 0usize;
        for row in table.rows.iter_mut() {
            let derived = match row.get(src) {
                None | Some(CellValue::Null) => CellValue::Null,
                Some(cell) => {
                    let (value, hit) = derive_value(&cell.to_string(), rule);
                    if hit {
                        mapped += 1;
                    }
                    CellValue::Text(value)
                }
            };
            row.push(derived);
        }
        table.header.push(rule.new_column.clone());

        tracing::info!(rows = table.rows.len(), mapped, "派生列已生成");
        true
    }
}

/// 截取 + 映射；返回 (结果, 是否命中映射)
pub fn derive_value(source: &str, rule: &DerivationRule) -> (String, bool) {
    let extracted = match &rule.extraction {
        Some(extraction) => extract(source, extraction),
        None => source.to_string(),
    };
    match rule.mappings.iter().find(|m| m.pattern.matches(&extracted)) {
        Some(mapping) => (mapping.value.clone(), true),
        None => (extracted, false),
    }
}

/// 按字符截取 [start, end)；one_indexed 时只调整 start
pub fn extract(source: &str, extraction: &Extraction) -> String {
    let start = if extraction.one_indexed && extraction.start > 0 {
        extraction.start - 1
    } else {
        extraction.start
    };
    let chars: Vec<char> = source.chars().collect();
    if start >= chars.len() {
        return String::new();
    }
    let end = extraction.end.unwrap_or(chars.len()).min(chars.len());
    if end <= start {
        return String::new();
    }
    chars[start..end].iter().collect()
}
