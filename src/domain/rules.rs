// ==========================================
// 多格式表格合并系统 - 规则定义
// ==========================================
// 职责: 持久化规则记录（serde 原样结构）→ 强类型规则
// 约定: 未知动作 / 缺少必填参数 / 非法正则 在构建时报 InvalidRule
// ==========================================

use crate::domain::table::CellValue;
use crate::error::{MergeError, MergeResult};
use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::TryFrom;
use std::fmt::Write;

/// 参数字典
pub type Parameters = Map<String, Value>;

pub const DEFAULT_DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d";

// ==========================================
// 参数读取辅助
// ==========================================

fn param_str<'a>(params: &'a Parameters, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// 数值参数，允许数字或可解析的字符串；null 视为未设置
fn param_f64(params: &Parameters, key: &str, rule: &str) -> MergeResult<Option<f64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            MergeError::invalid_rule(rule, format!("参数 {} 不是数值: {}", key, s))
        }),
        Some(other) => Err(MergeError::invalid_rule(
            rule,
            format!("参数 {} 不是数值: {}", key, other),
        )),
    }
}

fn param_usize(params: &Parameters, key: &str, rule: &str) -> MergeResult<Option<usize>> {
    match param_f64(params, key, rule)? {
        None => Ok(None),
        Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(Some(v as usize)),
        Some(v) => Err(MergeError::invalid_rule(
            rule,
            format!("参数 {} 必须为非负整数: {}", key, v),
        )),
    }
}

/// JSON 值的字符串形式（字符串不带引号）
fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 校验 strftime 输出格式
fn validate_date_format(format: &str, rule: &str) -> MergeResult<()> {
    if format.is_empty() {
        return Err(MergeError::invalid_rule(rule, "日期输出格式为空"));
    }
    let invalid = || MergeError::invalid_rule(rule, format!("日期输出格式无效: {}", format));
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(invalid());
    }
    // 需要时区等信息的格式符无法用于无时区日期
    let sample = NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)?;
    let mut rendered = String::new();
    write!(rendered, "{}", sample.format(format)).map_err(|_| invalid())?;
    Ok(())
}

// ==========================================
// 清洗规则
// ==========================================

/// 清洗规则持久化记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningRuleRecord {
    pub action: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleaningRule {
    pub action: CleaningAction,
    pub columns: Vec<String>,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CleaningAction {
    RemoveDuplicates,
    FillNull(FillMethod),
    ConvertType(TargetType),
    TrimSpaces,
    StandardizeDate { output_format: String },
    Uppercase,
    Lowercase,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillMethod {
    Forward,
    Backward,
    Value(CellValue),
    Mean,
    Median,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Integer,
    Float,
    String,
}

impl CleaningAction {
    pub fn name(&self) -> &'static str {
        match self {
            CleaningAction::RemoveDuplicates => "remove_duplicates",
            CleaningAction::FillNull(_) => "fill_null",
            CleaningAction::ConvertType(_) => "convert_type",
            CleaningAction::TrimSpaces => "trim_spaces",
            CleaningAction::StandardizeDate { .. } => "standardize_date",
            CleaningAction::Uppercase => "uppercase",
            CleaningAction::Lowercase => "lowercase",
        }
    }
}

impl TryFrom<&CleaningRuleRecord> for CleaningRule {
    type Error = MergeError;

    fn try_from(record: &CleaningRuleRecord) -> MergeResult<Self> {
        let params = &record.parameters;
        let action = match record.action.as_str() {
            "remove_duplicates" => CleaningAction::RemoveDuplicates,
            "fill_null" => {
                let method = match param_str(params, "method").unwrap_or("forward") {
                    "forward" => FillMethod::Forward,
                    "backward" => FillMethod::Backward,
                    "value" => FillMethod::Value(
                        params
                            .get("value")
                            .map(CellValue::from)
                            .unwrap_or_else(|| CellValue::text("")),
                    ),
                    "mean" => FillMethod::Mean,
                    "median" => FillMethod::Median,
                    other => {
                        return Err(MergeError::invalid_rule(
                            "fill_null",
                            format!("未知填充方式: {}", other),
                        ))
                    }
                };
                CleaningAction::FillNull(method)
            }
            "convert_type" => {
                let target = match param_str(params, "type").unwrap_or("string") {
                    "integer" | "int" => TargetType::Integer,
                    "float" => TargetType::Float,
                    "string" | "str" => TargetType::String,
                    other => {
                        return Err(MergeError::invalid_rule(
                            "convert_type",
                            format!("未知目标类型: {}", other),
                        ))
                    }
                };
                CleaningAction::ConvertType(target)
            }
            "trim_spaces" => CleaningAction::TrimSpaces,
            "standardize_date" => {
                let output_format = param_str(params, "format")
                    .unwrap_or(DEFAULT_DATE_OUTPUT_FORMAT)
                    .to_string();
                validate_date_format(&output_format, "standardize_date")?;
                CleaningAction::StandardizeDate { output_format }
            }
            "uppercase" => CleaningAction::Uppercase,
            "lowercase" => CleaningAction::Lowercase,
            other => {
                return Err(MergeError::invalid_rule(
                    "cleaning",
                    format!("未知清洗动作: {}", other),
                ))
            }
        };

        Ok(CleaningRule {
            action,
            columns: record.columns.clone(),
            order: record.order,
        })
    }
}

// ==========================================
// 验证规则
// ==========================================

/// 验证规则持久化记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRuleRecord {
    pub column: String,
    pub rule_type: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub column: String,
    pub check: ValidationCheck,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ValidationCheck {
    Required,
    Type(ExpectedType),
    Range { min: Option<f64>, max: Option<f64> },
    Length { min: Option<usize>, max: Option<usize> },
    Regex { pattern: String, regex: Regex },
    Unique,
    Enum(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedType {
    Number,
    Integer,
    Email,
    Phone,
    Date,
}

impl ExpectedType {
    pub fn name(&self) -> &'static str {
        match self {
            ExpectedType::Number => "number",
            ExpectedType::Integer => "integer",
            ExpectedType::Email => "email",
            ExpectedType::Phone => "phone",
            ExpectedType::Date => "date",
        }
    }
}

impl TryFrom<&ValidationRuleRecord> for ValidationRule {
    type Error = MergeError;

    fn try_from(record: &ValidationRuleRecord) -> MergeResult<Self> {
        let params = &record.parameters;
        let rule_type = record.rule_type.as_str();
        let check = match rule_type {
            "required" => ValidationCheck::Required,
            "type" => {
                let expected = match param_str(params, "type") {
                    Some("number") => ExpectedType::Number,
                    Some("integer") => ExpectedType::Integer,
                    Some("email") => ExpectedType::Email,
                    Some("phone") => ExpectedType::Phone,
                    Some("date") => ExpectedType::Date,
                    Some(other) => {
                        return Err(MergeError::invalid_rule(
                            "type",
                            format!("未知期望类型: {}", other),
                        ))
                    }
                    None => return Err(MergeError::invalid_rule("type", "缺少参数 type")),
                };
                ValidationCheck::Type(expected)
            }
            "range" => ValidationCheck::Range {
                min: param_f64(params, "min", rule_type)?,
                max: param_f64(params, "max", rule_type)?,
            },
            "length" => ValidationCheck::Length {
                min: param_usize(params, "min", rule_type)?,
                max: param_usize(params, "max", rule_type)?,
            },
            "regex" => {
                let pattern = param_str(params, "pattern").unwrap_or_default();
                if pattern.is_empty() {
                    return Err(MergeError::invalid_rule("regex", "缺少参数 pattern"));
                }
                // 只锚定开头
                let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                    MergeError::invalid_rule("regex", format!("正则表达式无效 {}: {}", pattern, e))
                })?;
                ValidationCheck::Regex {
                    pattern: pattern.to_string(),
                    regex,
                }
            }
            "unique" => ValidationCheck::Unique,
            "enum" => {
                let values = match params.get("values") {
                    Some(Value::Array(items)) => items.iter().map(value_to_plain_string).collect(),
                    Some(other) => {
                        return Err(MergeError::invalid_rule(
                            "enum",
                            format!("参数 values 必须为列表: {}", other),
                        ))
                    }
                    None => Vec::new(),
                };
                ValidationCheck::Enum(values)
            }
            other => {
                return Err(MergeError::invalid_rule(
                    "validation",
                    format!("未知验证类型: {}", other),
                ))
            }
        };

        Ok(ValidationRule {
            column: record.column.clone(),
            check,
            error_message: record
                .error_message
                .as_ref()
                .filter(|m| !m.is_empty())
                .cloned(),
        })
    }
}

// ==========================================
// 派生列规则
// ==========================================

/// 派生列规则持久化记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivationRuleRecord {
    pub source_column: String,
    pub new_column: String,
    #[serde(default)]
    pub extraction: Option<ExtractionRecord>,
    #[serde(default)]
    pub mappings: Vec<MappingRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: Option<usize>,
    #[serde(default)]
    pub one_indexed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub pattern: String,
    pub value: String,
    #[serde(default)]
    pub regex: bool,
}

#[derive(Debug, Clone)]
pub struct DerivationRule {
    pub source_column: String,
    pub new_column: String,
    pub extraction: Option<Extraction>,
    pub mappings: Vec<ValueMapping>,
}

/// 半开区间 [start, end)，按字符计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extraction {
    pub start: usize,
    pub end: Option<usize>,
    pub one_indexed: bool,
}

#[derive(Debug, Clone)]
pub struct ValueMapping {
    pub pattern: MatchPattern,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum MatchPattern {
    /// 整串相等
    Exact(String),
    /// 任意位置匹配
    Regex(Regex),
}

impl MatchPattern {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            MatchPattern::Exact(p) => p == text,
            MatchPattern::Regex(re) => re.is_match(text),
        }
    }
}

impl TryFrom<&DerivationRuleRecord> for DerivationRule {
    type Error = MergeError;

    fn try_from(record: &DerivationRuleRecord) -> MergeResult<Self> {
        if record.new_column.trim().is_empty() {
            return Err(MergeError::invalid_rule("column_rule", "new_column 不能为空"));
        }

        let mappings = record
            .mappings
            .iter()
            .map(|m| {
                let pattern = if m.regex {
                    MatchPattern::Regex(Regex::new(&m.pattern).map_err(|e| {
                        MergeError::invalid_rule(
                            "column_rule",
                            format!("映射正则无效 {}: {}", m.pattern, e),
                        )
                    })?)
                } else {
                    MatchPattern::Exact(m.pattern.clone())
                };
                Ok(ValueMapping {
                    pattern,
                    value: m.value.clone(),
                })
            })
            .collect::<MergeResult<Vec<_>>>()?;

        Ok(DerivationRule {
            source_column: record.source_column.clone(),
            new_column: record.new_column.clone(),
            extraction: record.extraction.as_ref().map(|e| Extraction {
                start: e.start,
                end: e.end,
                one_indexed: e.one_indexed,
            }),
            mappings,
        })
    }
}

// ==========================================
// 单元格操作
// ==========================================

/// 单元格操作持久化记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellOperationRecord {
    pub column: String,
    pub action: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub length: Option<i64>,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellOperation {
    pub column: String,
    pub action: CellAction,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellAction {
    AddPrefix(String),
    AddSuffix(String),
    RemovePrefix(String),
    RemoveSuffix(String),
    Replace { from: String, to: String },
    InsertAt { position: i64, value: String },
    DeleteAt { position: i64, length: usize },
}

impl CellAction {
    pub fn name(&self) -> &'static str {
        match self {
            CellAction::AddPrefix(_) => "add_prefix",
            CellAction::AddSuffix(_) => "add_suffix",
            CellAction::RemovePrefix(_) => "remove_prefix",
            CellAction::RemoveSuffix(_) => "remove_suffix",
            CellAction::Replace { .. } => "replace",
            CellAction::InsertAt { .. } => "insert_at",
            CellAction::DeleteAt { .. } => "delete_at",
        }
    }
}

impl TryFrom<&CellOperationRecord> for CellOperation {
    type Error = MergeError;

    fn try_from(record: &CellOperationRecord) -> MergeResult<Self> {
        let action_name = record.action.as_str();
        let required_value = || {
            record.value.clone().ok_or_else(|| {
                MergeError::invalid_rule(action_name, format!("列 {} 的操作缺少 value", record.column))
            })
        };

        let action = match action_name {
            "add_prefix" => CellAction::AddPrefix(required_value()?),
            "add_suffix" => CellAction::AddSuffix(required_value()?),
            "remove_prefix" => CellAction::RemovePrefix(required_value()?),
            "remove_suffix" => CellAction::RemoveSuffix(required_value()?),
            "replace" => CellAction::Replace {
                from: record.old_value.clone().unwrap_or_default(),
                to: record.new_value.clone().unwrap_or_default(),
            },
            "insert_at" => CellAction::InsertAt {
                position: record.position.unwrap_or(0),
                value: required_value()?,
            },
            "delete_at" => {
                let length = record.length.unwrap_or(1);
                if length < 0 {
                    return Err(MergeError::invalid_rule(
                        "delete_at",
                        format!("删除长度不能为负数: {}", length),
                    ));
                }
                CellAction::DeleteAt {
                    position: record.position.unwrap_or(0),
                    length: length as usize,
                }
            }
            other => {
                return Err(MergeError::invalid_rule(
                    "cell_operation",
                    format!("未知单元格操作: {}", other),
                ))
            }
        };

        Ok(CellOperation {
            column: record.column.clone(),
            action,
            order: record.order,
        })
    }
}
