// ==========================================
// 多格式表格合并系统 - 数据验证器
// ==========================================
// 职责: 按规则逐行检查，产出错误/警告/统计，不修改数据
// 空值: 只有 required 检查空值，其余检查跳过空单元格
// 行号: 错误记录中为 1 起始
// ==========================================

use crate::domain::report::{ValidationError, ValidationReport, ValidationWarning};
use crate::domain::rules::{ExpectedType, ValidationCheck, ValidationRule};
use crate::domain::table::{CellValue, Table, ValueKey};
use crate::engine::patterns::{is_email, is_phone, parse_date};
use std::collections::HashSet;
use tracing::instrument;

pub struct DataValidator;

impl DataValidator {
    /// 执行全部验证规则
    ///
    /// # 返回
    /// - ValidationReport: is_valid 仅由错误数决定，警告不影响
    #[instrument(skip_all, fields(rules = rules.len(), rows = table.rows.len()))]
    pub fn validate(&self, table: &Table, rules: &[ValidationRule]) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for rule in rules {
            let Some(col) = table.column_index(&rule.column) else {
                tracing::warn!(column = %rule.column, "验证规则目标列不存在");
                warnings.push(ValidationWarning {
                    column: rule.column.clone(),
                    message: format!("列 '{}' 不存在", rule.column),
                });
                continue;
            };
            check_column(table, col, rule, &mut errors);
        }

        let report = ValidationReport::build(errors, warnings, table.rows.len());
        tracing::info!(
            is_valid = report.is_valid,
            errors = report.statistics.total_errors,
            warnings = report.statistics.total_warnings,
            "数据验证完成"
        );
        report
    }
}

fn check_column(table: &Table, col: usize, rule: &ValidationRule, errors: &mut Vec<ValidationError>) {
    let column = rule.column.as_str();
    let mut seen: HashSet<ValueKey> = HashSet::new();

    for (idx, cell) in table.column_values(col).into_iter().enumerate() {
        if cell.is_blank() {
            if matches!(rule.check, ValidationCheck::Required) {
                push_error(errors, rule, idx, cell, || format!("'{}' 不能为空", column));
            }
            continue;
        }

        match &rule.check {
            ValidationCheck::Required => {}
            ValidationCheck::Type(expected) => {
                if !matches_type(cell, *expected) {
                    push_error(errors, rule, idx, cell, || {
                        format!("'{}' 类型错误，期望 {}", column, expected.name())
                    });
                }
            }
            ValidationCheck::Range { min, max } => {
                // 非数值不参与范围检查
                let Some(value) = cell.as_number() else {
                    continue;
                };
                if let Some(min) = min.filter(|m| value < *m) {
                    push_error(errors, rule, idx, cell, || {
                        format!("'{}' 值 {} 小于最小值 {}", column, value, min)
                    });
                }
                if let Some(max) = max.filter(|m| value > *m) {
                    push_error(errors, rule, idx, cell, || {
                        format!("'{}' 值 {} 大于最大值 {}", column, value, max)
                    });
                }
            }
            ValidationCheck::Length { min, max } => {
                let length = cell.to_string().chars().count();
                if let Some(min) = min.filter(|m| length < *m) {
                    push_error(errors, rule, idx, cell, || {
                        format!("'{}' 长度 {} 小于最小长度 {}", column, length, min)
                    });
                }
                if let Some(max) = max.filter(|m| length > *m) {
                    push_error(errors, rule, idx, cell, || {
                        format!("'{}' 长度 {} 大于最大长度 {}", column, length, max)
                    });
                }
            }
            ValidationCheck::Regex { pattern, regex } => {
                if !regex.is_match(&cell.to_string()) {
                    push_error(errors, rule, idx, cell, || {
                        format!("'{}' 不匹配正则表达式 {}", column, pattern)
                    });
                }
            }
            ValidationCheck::Unique => {
                if !seen.insert(cell.key()) {
                    push_error(errors, rule, idx, cell, || format!("'{}' 值 '{}' 重复", column, cell));
                }
            }
            ValidationCheck::Enum(values) => {
                let text = cell.to_string();
                if !values.iter().any(|v| *v == text) {
                    push_error(errors, rule, idx, cell, || {
                        format!(
                            "'{}' 值 '{}' 不在允许的值列表中: [{}]",
                            column,
                            text,
                            values.join(", ")
                        )
                    });
                }
            }
        }
    }
}

fn push_error<F>(
    errors: &mut Vec<ValidationError>,
    rule: &ValidationRule,
    idx: usize,
    cell: &CellValue,
    default_message: F,
) where
    F: FnOnce() -> String,
{
    errors.push(ValidationError {
        row: idx + 1,
        column: rule.column.clone(),
        value: cell.clone(),
        message: rule.error_message.clone().unwrap_or_else(default_message),
    });
}

fn matches_type(cell: &CellValue, expected: ExpectedType) -> bool {
    match expected {
        ExpectedType::Number => cell.as_number().is_some(),
        ExpectedType::Integer => cell.as_number().is_some_and(f64::is_finite),
        ExpectedType::Email => is_email(&cell.to_string()),
        ExpectedType::Phone => is_phone(&cell.to_string()),
        ExpectedType::Date => match cell {
            CellValue::DateTime(_) => true,
            other => parse_date(&other.to_string()).is_some(),
        },
    }
}
