// ==========================================
// 多格式表格合并系统 - 合并任务
// ==========================================
// 职责: 调用方交付的任务记录（JSON 形状）及其编译结果
// ==========================================

use crate::domain::format::FileFormat;
use crate::domain::rules::{
    CellOperation, CellOperationRecord, CleaningRule, CleaningRuleRecord, DerivationRule,
    DerivationRuleRecord, ValidationRule, ValidationRuleRecord,
};
use crate::error::{MergeError, MergeResult};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::path::{Path, PathBuf};

fn default_output_format() -> String {
    "xlsx".to_string()
}

fn default_filter_mode() -> String {
    "none".to_string()
}

/// 合并任务记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeTask {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default = "default_filter_mode")]
    pub filter_mode: String,
    #[serde(default)]
    pub filter_columns: Vec<String>,
    #[serde(default)]
    pub cleaning_rules: Vec<CleaningRuleRecord>,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRuleRecord>,
    #[serde(default)]
    pub column_rule: Option<DerivationRuleRecord>,
    #[serde(default)]
    pub cell_operations: Vec<CellOperationRecord>,
}

impl Default for MergeTask {
    fn default() -> Self {
        Self {
            task_id: None,
            name: None,
            files: Vec::new(),
            output_format: default_output_format(),
            output_path: None,
            filter_mode: default_filter_mode(),
            filter_columns: Vec::new(),
            cleaning_rules: Vec::new(),
            validation_rules: Vec::new(),
            column_rule: None,
            cell_operations: Vec::new(),
        }
    }
}

impl MergeTask {
    /// 从 JSON 文件加载任务
    pub fn from_json_file(path: &Path) -> MergeResult<Self> {
        if !path.exists() {
            return Err(MergeError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let task = serde_json::from_str(&content)?;
        Ok(task)
    }
}

/// 列过滤模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    None,
    Keep,
    Remove,
}

impl FilterMode {
    /// 未知模式按 None 处理
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "keep" => FilterMode::Keep,
            "remove" => FilterMode::Remove,
            "none" | "" => FilterMode::None,
            other => {
                tracing::debug!(mode = other, "未知列过滤模式，按 none 处理");
                FilterMode::None
            }
        }
    }
}

/// 编译后的任务：所有规则已转换为强类型
#[derive(Debug, Clone)]
pub struct TaskPlan {
    pub cleaning: Vec<CleaningRule>,
    pub validation: Vec<ValidationRule>,
    pub derivation: Option<DerivationRule>,
    pub cell_operations: Vec<CellOperation>,
    pub filter_mode: FilterMode,
    pub filter_columns: Vec<String>,
    pub output_format: FileFormat,
}

impl TaskPlan {
    /// 编译任务记录
    ///
    /// # 返回
    /// - Err(InvalidRule): 任意一条规则无法构建
    /// - Err(UnsupportedFormat): 输出格式不在支持列表中
    pub fn compile(task: &MergeTask) -> MergeResult<Self> {
        let output_format = FileFormat::from_name(&task.output_format)
            .ok_or_else(|| MergeError::UnsupportedFormat(task.output_format.clone()))?;

        let cleaning = task
            .cleaning_rules
            .iter()
            .map(CleaningRule::try_from)
            .collect::<MergeResult<Vec<_>>>()?;
        let validation = task
            .validation_rules
            .iter()
            .map(ValidationRule::try_from)
            .collect::<MergeResult<Vec<_>>>()?;
        let derivation = task
            .column_rule
            .as_ref()
            .map(DerivationRule::try_from)
            .transpose()?;
        let cell_operations = task
            .cell_operations
            .iter()
            .map(CellOperation::try_from)
            .collect::<MergeResult<Vec<_>>>()?;

        Ok(Self {
            cleaning,
            validation,
            derivation,
            cell_operations,
            filter_mode: FilterMode::from_name(&task.filter_mode),
            filter_columns: task.filter_columns.clone(),
            output_format,
        })
    }
}
