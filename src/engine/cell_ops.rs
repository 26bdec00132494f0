// ==========================================
// 多格式表格合并系统 - 单元格操作
// ==========================================
// 职责: 对某一列的每个非空单元格做字符串编辑
// 位置: 按字符计（非字节），越界时保持原值
// ==========================================

use crate::domain::rules::{CellAction, CellOperation};
use crate::domain::table::{CellValue, Table};
use tracing::instrument;

pub struct CellOperator;

impl CellOperator {
    /// 按 order 升序执行全部操作
    ///
    /// # 返回
    /// - 因目标列不存在而跳过的操作数
    #[instrument(skip_all, fields(operations = operations.len()))]
    pub fn apply(&self, table: &mut Table, operations: &[CellOperation]) -> usize {
        let mut ordered: Vec<&CellOperation> = operations.iter().collect();
        ordered.sort_by_key(|op| op.order);

        let mut skipped = 0;
        for op in ordered {
            let Some(col) = table.column_index(&op.column) else {
                tracing::warn!(column = %op.column, action = op.action.name(), "单元格操作目标列不存在，已跳过");
                skipped += 1;
                continue;
            };

            let mut changed = 0usize;
            for row in table.rows.iter_mut() {
                let Some(cell) = row.get_mut(col) else {
                    continue;
                };
                if cell.is_null() {
                    continue;
                }
                let current = cell.to_string();
                let edited = apply_action(&current, &op.action);
                if edited != current || !matches!(cell, CellValue::Text(_)) {
                    *cell = CellValue::Text(edited);
                    changed += 1;
                }
            }
            tracing::debug!(column = %op.column, action = op.action.name(), changed, "单元格操作完成");
        }
        skipped
    }
}

/// 对单个字符串执行操作
pub fn apply_action(value: &str, action: &CellAction) -> String {
    match action {
        CellAction::AddPrefix(prefix) => format!("{}{}", prefix, value),
        CellAction::AddSuffix(suffix) => format!("{}{}", value, suffix),
        CellAction::RemovePrefix(prefix) => value
            .strip_prefix(prefix.as_str())
            .unwrap_or(value)
            .to_string(),
        CellAction::RemoveSuffix(suffix) => value
            .strip_suffix(suffix.as_str())
            .unwrap_or(value)
            .to_string(),
        CellAction::Replace { from, to } => {
            if from.is_empty() {
                value.to_string()
            } else {
                value.replace(from.as_str(), to)
            }
        }
        CellAction::InsertAt { position, value: insert } => {
            let chars: Vec<char> = value.chars().collect();
            match usize::try_from(*position) {
                Ok(pos) if pos <= chars.len() => {
                    let mut out: String = chars[..pos].iter().collect();
                    out.push_str(insert);
                    out.extend(&chars[pos..]);
                    out
                }
                _ => value.to_string(),
            }
        }
        CellAction::DeleteAt { position, length } => {
            let chars: Vec<char> = value.chars().collect();
            match usize::try_from(*position) {
                Ok(pos) if pos < chars.len() => {
                    let end = pos.saturating_add(*length).min(chars.len());
                    chars[..pos].iter().chain(&chars[end..]).collect()
                }
                _ => value.to_string(),
            }
        }
    }
}
