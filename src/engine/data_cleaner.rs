// ==========================================
// 多格式表格合并系统 - 数据清洗器
// ==========================================
// 职责: 去重 / 空值填充 / 类型转换 / 去空格 / 日期标准化 / 大小写
// 顺序: 按 order 升序（稳定排序），原地修改表格
// 目标列缺失: 记录 warn，跳过该列
// ==========================================

use crate::domain::report::{CleaningSummary, ConversionFailure};
use crate::domain::rules::{CleaningAction, CleaningRule, FillMethod, TargetType};
use crate::domain::table::{CellValue, Table, ValueKey};
use crate::engine::patterns::parse_date;
use std::collections::HashSet;
use std::fmt::Write;
use tracing::instrument;

/// 单元格类型转换失败
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionError {
    pub value: String,
    pub target: TargetType,
}

pub struct DataCleaner;

impl DataCleaner {
    /// 按顺序执行全部清洗规则
    ///
    /// # 返回
    /// - CleaningSummary: 执行/跳过规则数、删除行数、变更单元格数、转换失败计数
    #[instrument(skip_all, fields(rules = rules.len(), rows = table.rows.len()))]
    pub fn apply_rules(&self, table: &mut Table, rules: &[CleaningRule]) -> CleaningSummary {
        let mut ordered: Vec<&CleaningRule> = rules.iter().collect();
        ordered.sort_by_key(|rule| rule.order);

        let mut summary = CleaningSummary::default();
        for rule in ordered {
            self.apply_rule(table, rule, &mut summary);
        }

        tracing::info!(
            applied = summary.rules_applied,
            skipped = summary.rules_skipped,
            rows_removed = summary.rows_removed,
            cells_changed = summary.cells_changed,
            conversion_failures = summary.total_conversion_failures(),
            "数据清洗完成"
        );
        summary
    }

    fn apply_rule(&self, table: &mut Table, rule: &CleaningRule, summary: &mut CleaningSummary) {
        let action = rule.action.name();

        // 去重且未指定列：整行比较
        if matches!(rule.action, CleaningAction::RemoveDuplicates) && rule.columns.is_empty() {
            let all: Vec<usize> = (0..table.header.len()).collect();
            summary.rows_removed += self.remove_duplicates(table, &all);
            summary.rules_applied += 1;
            return;
        }

        let columns = resolve_columns(table, &rule.columns, action);
        if columns.is_empty() {
            tracing::warn!(action, columns = ?rule.columns, "清洗规则的目标列均不存在，已跳过");
            summary.rules_skipped += 1;
            return;
        }
        summary.rules_applied += 1;

        match &rule.action {
            CleaningAction::RemoveDuplicates => {
                summary.rows_removed += self.remove_duplicates(table, &columns);
            }
            CleaningAction::FillNull(method) => {
                for &col in &columns {
                    summary.cells_changed += self.fill_null(table, col, method);
                }
            }
            CleaningAction::ConvertType(target) => {
                for &col in &columns {
                    let (changed, failed) = self.convert_column(table, col, *target);
                    summary.cells_changed += changed;
                    if failed > 0 {
                        tracing::debug!(column = %table.header[col], failed, "部分单元格类型转换失败");
                        summary.conversion_failures.push(ConversionFailure {
                            column: table.header[col].clone(),
                            count: failed,
                        });
                    }
                }
            }
            CleaningAction::TrimSpaces => {
                for &col in &columns {
                    summary.cells_changed += map_text(table, col, |s| s.trim().to_string());
                }
            }
            CleaningAction::Uppercase => {
                for &col in &columns {
                    summary.cells_changed += map_text(table, col, |s| s.to_uppercase());
                }
            }
            CleaningAction::Lowercase => {
                for &col in &columns {
                    summary.cells_changed += map_text(table, col, |s| s.to_lowercase());
                }
            }
            CleaningAction::StandardizeDate { output_format } => {
                for &col in &columns {
                    summary.cells_changed += self.standardize_date(table, col, output_format);
                }
            }
        }
    }

    /// 去重，保留首次出现；返回删除行数
    pub fn remove_duplicates(&self, table: &mut Table, columns: &[usize]) -> usize {
        let mut seen: HashSet<Vec<ValueKey>> = HashSet::new();
        let mut new_index: Vec<Option<usize>> = Vec::with_capacity(table.rows.len());
        let mut kept = 0usize;

        for row_idx in 0..table.rows.len() {
            let key: Vec<ValueKey> = columns.iter().map(|&c| table.cell(row_idx, c).key()).collect();
            if seen.insert(key) {
                new_index.push(Some(kept));
                kept += 1;
            } else {
                new_index.push(None);
            }
        }

        let removed = table.rows.len() - kept;
        if removed == 0 {
            return 0;
        }

        let mut idx = 0;
        table.rows.retain(|_| {
            let keep = new_index[idx].is_some();
            idx += 1;
            keep
        });

        // 被删除行上的图片一并删除，其余图片行号前移
        table.images.retain_mut(|image| match new_index.get(image.row).copied().flatten() {
            Some(row) => {
                image.row = row;
                true
            }
            None => false,
        });

        removed
    }

    /// 空值填充；返回填充的单元格数
    pub fn fill_null(&self, table: &mut Table, col: usize, method: &FillMethod) -> usize {
        let row_count = table.rows.len();
        let mut changed = 0;

        match method {
            FillMethod::Forward | FillMethod::Backward => {
                let order: Vec<usize> = if matches!(method, FillMethod::Forward) {
                    (0..row_count).collect()
                } else {
                    (0..row_count).rev().collect()
                };
                let mut carry: Option<CellValue> = None;
                for row in order {
                    let cell = table.cell(row, col);
                    if cell.is_blank() {
                        if let Some(value) = &carry {
                            table.set_cell(row, col, value.clone());
                            changed += 1;
                        }
                    } else {
                        carry = Some(cell.clone());
                    }
                }
            }
            FillMethod::Value(value) => {
                changed += fill_blanks(table, col, value);
            }
            FillMethod::Mean | FillMethod::Median => {
                let mut values: Vec<f64> = table
                    .column_values(col)
                    .into_iter()
                    .filter(|c| !c.is_blank())
                    .filter_map(CellValue::as_number)
                    .filter(|v| v.is_finite())
                    .collect();
                if values.is_empty() {
                    return 0;
                }
                let stat = if matches!(method, FillMethod::Mean) {
                    values.iter().sum::<f64>() / values.len() as f64
                } else {
                    median(&mut values)
                };
                changed += fill_blanks(table, col, &CellValue::Float(stat));
            }
        }
        changed
    }

    /// 转换整列；返回 (转换成功数, 失败数)，空值不参与
    fn convert_column(&self, table: &mut Table, col: usize, target: TargetType) -> (usize, usize) {
        let mut changed = 0;
        let mut failed = 0;
        for row in table.rows.iter_mut() {
            let Some(cell) = row.get_mut(col) else {
                continue;
            };
            if cell.is_blank() {
                continue;
            }
            match convert_cell(cell, target) {
                Ok(converted) => {
                    if *cell != converted {
                        *cell = converted;
                        changed += 1;
                    }
                }
                Err(_) => failed += 1,
            }
        }
        (changed, failed)
    }

    /// 日期标准化；无法识别的保持原样
    fn standardize_date(&self, table: &mut Table, col: usize, output_format: &str) -> usize {
        let mut changed = 0;
        for row in table.rows.iter_mut() {
            let Some(cell) = row.get_mut(col) else {
                continue;
            };
            let parsed = match cell {
                CellValue::DateTime(dt) => Some(*dt),
                CellValue::Text(s) if !s.is_empty() => parse_date(s),
                _ => None,
            };
            let Some(dt) = parsed else {
                continue;
            };

            let mut formatted = String::new();
            if write!(formatted, "{}", dt.format(output_format)).is_err() {
                tracing::warn!(format = output_format, "日期格式化失败，保持原值");
                continue;
            }
            *cell = CellValue::Text(formatted);
            changed += 1;
        }
        changed
    }
}

/// 单元格类型转换
///
/// 整数转换按截断处理（"3.7" → 3）；字符串转换适用于任意非空值
pub fn convert_cell(cell: &CellValue, target: TargetType) -> Result<CellValue, ConversionError> {
    let fail = || ConversionError {
        value: cell.to_string(),
        target,
    };

    match target {
        TargetType::String => Ok(CellValue::Text(cell.to_string())),
        TargetType::Float => match cell {
            CellValue::Bool(b) => Ok(CellValue::Float(if *b { 1.0 } else { 0.0 })),
            CellValue::DateTime(_) | CellValue::Null => Err(fail()),
            other => other.as_number().map(CellValue::Float).ok_or_else(fail),
        },
        TargetType::Integer => match cell {
            CellValue::Int(i) => Ok(CellValue::Int(*i)),
            CellValue::Bool(b) => Ok(CellValue::Int(i64::from(*b))),
            CellValue::DateTime(_) | CellValue::Null => Err(fail()),
            other => {
                let v = other.as_number().ok_or_else(fail)?;
                if !v.is_finite() || v.abs() >= 9.2e18 {
                    return Err(fail());
                }
                Ok(CellValue::Int(v.trunc() as i64))
            }
        },
    }
}

fn resolve_columns(table: &Table, columns: &[String], action: &str) -> Vec<usize> {
    columns
        .iter()
        .filter_map(|name| {
            let idx = table.column_index(name);
            if idx.is_none() {
                tracing::warn!(column = %name, action, "清洗规则目标列不存在，已跳过");
            }
            idx
        })
        .collect()
}

/// 只处理文本单元格；返回变更数
fn map_text<F>(table: &mut Table, col: usize, f: F) -> usize
where
    F: Fn(&str) -> String,
{
    let mut changed = 0;
    for row in table.rows.iter_mut() {
        if let Some(CellValue::Text(s)) = row.get_mut(col) {
            let mapped = f(s);
            if mapped != *s {
                *s = mapped;
                changed += 1;
            }
        }
    }
    changed
}

fn fill_blanks(table: &mut Table, col: usize, value: &CellValue) -> usize {
    let mut changed = 0;
    for row in 0..table.rows.len() {
        if table.cell(row, col).is_blank() {
            table.set_cell(row, col, value.clone());
            changed += 1;
        }
    }
    changed
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
