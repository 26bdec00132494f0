// ==========================================
// 多格式表格合并系统 - 配置层
// ==========================================
// 职责: 处理器配置 + 导出能力
// 来源: 默认值 / JSON 文件 / 环境变量
// ==========================================

pub mod capabilities;
pub mod processor_config;

// 重导出
pub use capabilities::WriterCapabilities;
pub use processor_config::{config_keys, ProcessorConfig};
