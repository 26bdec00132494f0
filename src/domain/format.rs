// ==========================================
// 多格式表格合并系统 - 文件格式
// ==========================================

use crate::error::{MergeError, MergeResult};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// 支持的读写格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Xlsx,
    Xls,
    Csv,
    Json,
}

impl FileFormat {
    /// 按扩展名识别（大小写不敏感），无法识别返回 None
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_name)
    }

    /// 按名称识别（"xlsx" / ".CSV" 均可）
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('.').to_lowercase().as_str() {
            "xlsx" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            "csv" => Some(FileFormat::Csv),
            "json" => Some(FileFormat::Json),
            _ => None,
        }
    }

    /// 按扩展名识别，无法识别时报格式错误
    pub fn require_from_path(path: &Path) -> MergeResult<Self> {
        Self::from_path(path).ok_or_else(|| {
            MergeError::UnsupportedFormat(
                path.extension()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string()),
            )
        })
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Xlsx => "xlsx",
            FileFormat::Xls => "xls",
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
