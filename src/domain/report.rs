// ==========================================
// 多格式表格合并系统 - 报告类型
// ==========================================
// 职责: 验证报告 / 清洗汇总 / 文件预览
// ==========================================

use crate::domain::table::CellValue;
use serde::Serialize;

// ==========================================
// 验证报告
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// 1 起始行号
    pub row: usize,
    pub column: String,
    pub value: CellValue,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationWarning {
    pub column: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationStatistics {
    pub total_rows: usize,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub statistics: ValidationStatistics,
}

impl ValidationReport {
    /// 由错误与警告汇总统计
    pub fn build(
        errors: Vec<ValidationError>,
        warnings: Vec<ValidationWarning>,
        total_rows: usize,
    ) -> Self {
        let statistics = ValidationStatistics {
            total_rows,
            total_errors: errors.len(),
            total_warnings: warnings.len(),
            error_rate: errors.len() as f64 / total_rows.max(1) as f64,
        };
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            statistics,
        }
    }
}

// ==========================================
// 清洗汇总
// ==========================================

/// 单条规则的类型转换失败计数
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionFailure {
    pub column: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningSummary {
    pub rules_applied: usize,
    /// 目标列缺失而跳过
    pub rules_skipped: usize,
    pub rows_removed: usize,
    pub cells_changed: usize,
    pub conversion_failures: Vec<ConversionFailure>,
}

impl CleaningSummary {
    pub fn total_conversion_failures(&self) -> usize {
        self.conversion_failures.iter().map(|f| f.count).sum()
    }
}

// ==========================================
// 文件预览
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    Date,
    Email,
    Phone,
    Text,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnStatistics {
    Numeric {
        min: f64,
        max: f64,
        mean: f64,
        median: f64,
        count: usize,
    },
    Text {
        unique_count: usize,
        total_count: usize,
        top_values: Vec<ValueCount>,
    },
}

/// 单列画像
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub column_type: ColumnType,
    /// 空值或空字符串的数量
    pub null_count: usize,
    pub statistics: Option<ColumnStatistics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePreview {
    pub headers: Vec<String>,
    pub sample_rows: Vec<Vec<CellValue>>,
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<ColumnProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_build_statistics() {
        let errors = vec![ValidationError {
            row: 1,
            column: "a".into(),
            value: CellValue::Null,
            message: "m".into(),
        }];
        let report = ValidationReport::build(errors, vec![], 4);
        assert!(!report.is_valid);
        assert_eq!(report.statistics.total_errors, 1);
        assert!((report.statistics.error_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_report_on_empty_table() {
        let report = ValidationReport::build(vec![], vec![], 0);
        assert!(report.is_valid);
        assert_eq!(report.statistics.error_rate, 0.0);
    }
}
