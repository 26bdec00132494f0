// ==========================================
// 多格式表格合并系统 - 处理器配置
// ==========================================
// 职责: 管道可调常量（编码顺序 / 表头扫描窗口 / 图片列识别 / 导出选项）
// 加载顺序: 默认值 → JSON 配置文件 → 环境变量覆写 → 校验
// ==========================================

use crate::error::{MergeError, MergeResult};
use crate::importer::csv_reader::CsvEncoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 处理器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// CSV 尝试的编码顺序
    pub csv_encodings: Vec<String>,

    /// 表头识别窗口（从第一个非空行起最多扫描的行数）
    pub header_scan_rows: usize,

    /// 图片列识别关键字（拉丁字母不区分大小写）
    pub image_column_tokens: Vec<String>,

    /// 图片未给出尺寸时的默认宽高（像素）
    pub default_image_width: u32,
    pub default_image_height: u32,

    /// CSV 导出是否写 BOM
    pub csv_output_bom: bool,

    /// 任务未指定输出路径时的输出目录
    pub output_dir: PathBuf,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            csv_encodings: ["utf-8", "utf-8-sig", "gbk", "gb2312", "latin1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            header_scan_rows: 6,
            image_column_tokens: ["图", "照", "image", "photo"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_image_width: 100,
            default_image_height: 100,
            csv_output_bom: true,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ProcessorConfig {
    /// 加载配置：可选 JSON 文件 + 环境变量覆写 + 校验
    ///
    /// # 参数
    /// - path: 配置文件路径（None 时使用默认值）
    pub fn load(path: Option<&Path>) -> MergeResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件读取（缺省字段取默认值）
    pub fn from_file(path: &Path) -> MergeResult<Self> {
        if !path.exists() {
            return Err(MergeError::ConfigError(format!(
                "配置文件不存在: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| MergeError::ConfigError(format!("配置文件格式错误: {}", e)))
    }

    /// 环境变量覆写
    ///
    /// 无法解析的值记录 warn 并保留原值
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(config_keys::CSV_ENCODINGS) {
            let encodings: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !encodings.is_empty() {
                self.csv_encodings = encodings;
            }
        }

        if let Some(raw) = lookup(config_keys::HEADER_SCAN_ROWS) {
            match raw.trim().parse::<usize>() {
                Ok(v) => self.header_scan_rows = v,
                Err(_) => tracing::warn!(
                    config_key = config_keys::HEADER_SCAN_ROWS,
                    raw_value = %raw,
                    "表头扫描行数格式错误，保留原值"
                ),
            }
        }

        if let Some(raw) = lookup(config_keys::CSV_BOM) {
            match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => self.csv_output_bom = true,
                "0" | "false" | "no" => self.csv_output_bom = false,
                _ => tracing::warn!(
                    config_key = config_keys::CSV_BOM,
                    raw_value = %raw,
                    "CSV BOM 开关格式错误，保留原值"
                ),
            }
        }

        if let Some(raw) = lookup(config_keys::OUTPUT_DIR) {
            if !raw.trim().is_empty() {
                self.output_dir = PathBuf::from(raw.trim());
            }
        }
    }

    /// 校验配置
    pub fn validate(&self) -> MergeResult<()> {
        if self.header_scan_rows == 0 {
            return Err(MergeError::ConfigError(
                "header_scan_rows 必须大于 0".to_string(),
            ));
        }
        if self.csv_encodings.is_empty() {
            return Err(MergeError::ConfigError("csv_encodings 不能为空".to_string()));
        }
        if let Some(bad) = self
            .csv_encodings
            .iter()
            .find(|label| CsvEncoding::from_label(label).is_none())
        {
            return Err(MergeError::ConfigError(format!("未知编码: {}", bad)));
        }
        if self.default_image_width == 0 || self.default_image_height == 0 {
            return Err(MergeError::ConfigError(
                "默认图片尺寸必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 表头是否指向图片列
    pub fn is_image_column(&self, header: &str) -> bool {
        let lower = header.to_lowercase();
        self.image_column_tokens
            .iter()
            .any(|token| !token.is_empty() && lower.contains(&token.to_lowercase()))
    }
}

// ==========================================
// 环境变量键
// ==========================================
pub mod config_keys {
    pub const CSV_ENCODINGS: &str = "TABLE_MERGER_CSV_ENCODINGS";
    pub const HEADER_SCAN_ROWS: &str = "TABLE_MERGER_HEADER_SCAN_ROWS";
    pub const CSV_BOM: &str = "TABLE_MERGER_CSV_BOM";
    pub const OUTPUT_DIR: &str = "TABLE_MERGER_OUTPUT_DIR";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.header_scan_rows, 6);
        assert_eq!(config.csv_encodings[0], "utf-8");
    }

    #[test]
    fn test_from_file_partial_fields() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"header_scan_rows": 3, "csv_output_bom": false}}"#).unwrap();

        let config = ProcessorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.header_scan_rows, 3);
        assert!(!config.csv_output_bom);
        assert_eq!(config.default_image_width, 100);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (config_keys::CSV_ENCODINGS, "gbk, utf-8"),
            (config_keys::HEADER_SCAN_ROWS, "not-a-number"),
            (config_keys::CSV_BOM, "false"),
        ]
        .into_iter()
        .collect();

        let mut config = ProcessorConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.csv_encodings, vec!["gbk", "utf-8"]);
        assert_eq!(config.header_scan_rows, 6);
        assert!(!config.csv_output_bom);
    }

    #[test]
    fn test_validate_rejects_unknown_encoding() {
        let config = ProcessorConfig {
            csv_encodings: vec!["klingon".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MergeError::ConfigError(_))));
    }

    #[test]
    fn test_is_image_column() {
        let config = ProcessorConfig::default();
        assert!(config.is_image_column("产品图片"));
        assert!(config.is_image_column("Photo URL"));
        assert!(config.is_image_column("IMAGE"));
        assert!(!config.is_image_column("name"));
    }
}
