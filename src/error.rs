// ==========================================
// 多格式表格合并系统 - 错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 格式错误 / 缺失依赖 / 规则配置 / IO / 配置 / 内部
// ==========================================

use serde::Serialize;
use thiserror::Error;

/// 管道错误类型
///
/// 只有致命错误才会走到这里；列缺失、单张图片失败等
/// 可降级的情况在各阶段内部记录 warn 日志后跳过。
#[derive(Error, Debug)]
pub enum MergeError {
    // ===== 文件与格式错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv/.json）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("JSON 解析失败: {0}")]
    JsonParseError(String),

    #[error("未找到表头行: {0}")]
    HeaderNotFound(String),

    #[error("工作表为空: {0}")]
    EmptySheet(String),

    // ===== 依赖错误 =====
    #[error("缺少可选依赖: {0}")]
    MissingDependency(String),

    // ===== 规则配置错误 =====
    #[error("规则配置无效 ({rule}): {message}")]
    InvalidRule { rule: String, message: String },

    // ===== 导出错误 =====
    #[error("表头为空，无法导出")]
    EmptyHeader,

    #[error("文件写入失败: {0}")]
    WriteError(String),

    // ===== 配置错误 =====
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("没有可合并的输入文件")]
    NoInputFiles,

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 对调用方暴露的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Format,
    MissingDependency,
    InvalidRule,
    Io,
    Config,
    Internal,
}

impl MergeError {
    /// 错误类别（任务记录只保存类别 + 原始消息）
    pub fn kind(&self) -> ErrorKind {
        match self {
            MergeError::FileNotFound(_) | MergeError::FileReadError(_) | MergeError::WriteError(_) => {
                ErrorKind::Io
            }
            MergeError::UnsupportedFormat(_)
            | MergeError::ExcelParseError(_)
            | MergeError::CsvParseError(_)
            | MergeError::JsonParseError(_)
            | MergeError::HeaderNotFound(_)
            | MergeError::EmptySheet(_)
            | MergeError::EmptyHeader => ErrorKind::Format,
            MergeError::MissingDependency(_) => ErrorKind::MissingDependency,
            MergeError::InvalidRule { .. } => ErrorKind::InvalidRule,
            MergeError::ConfigError(_) | MergeError::NoInputFiles => ErrorKind::Config,
            MergeError::Other(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        MergeError::InvalidRule {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for MergeError {
    fn from(err: std::io::Error) -> Self {
        MergeError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for MergeError {
    fn from(err: csv::Error) -> Self {
        MergeError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for MergeError {
    fn from(err: calamine::Error) -> Self {
        MergeError::ExcelParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for MergeError {
    fn from(err: serde_json::Error) -> Self {
        MergeError::JsonParseError(err.to_string())
    }
}

// 实现 From<zip::result::ZipError>
impl From<zip::result::ZipError> for MergeError {
    fn from(err: zip::result::ZipError) -> Self {
        MergeError::ExcelParseError(err.to_string())
    }
}

// 实现 From<rust_xlsxwriter::XlsxError>
impl From<rust_xlsxwriter::XlsxError> for MergeError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        MergeError::WriteError(err.to_string())
    }
}

/// Result 类型别名
pub type MergeResult<T> = Result<T, MergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(MergeError::EmptySheet("a.xlsx".into()).kind(), ErrorKind::Format);
        assert_eq!(
            MergeError::MissingDependency("xls".into()).kind(),
            ErrorKind::MissingDependency
        );
        assert_eq!(
            MergeError::invalid_rule("cleaning", "unknown action").kind(),
            ErrorKind::InvalidRule
        );
        assert_eq!(MergeError::NoInputFiles.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_error_message_is_verbatim() {
        let err = MergeError::invalid_rule("fill_null", "缺少 method");
        assert_eq!(err.to_string(), "规则配置无效 (fill_null): 缺少 method");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MergeError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
