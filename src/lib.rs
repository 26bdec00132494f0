// ==========================================
// 多格式表格合并系统 - 核心库
// ==========================================
// 职责: 多格式读取 → 合并 → 清洗 → 验证 → 派生 → 单元格操作 → 列过滤 → 导出
// 格式: .xlsx / .xls / .csv / .json（xlsx 图片随行迁移）
// 运行: 单线程同步，一次调用处理一个任务
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 表格、规则、任务、报告
pub mod domain;

// 导入层 - 多格式读取与合并
pub mod importer;

// 引擎层 - 规则处理与管道编排
pub mod engine;

// 导出层 - 多格式写出
pub mod exporter;

// 配置层 - 处理器配置与导出能力
pub mod config;

// 错误类型
pub mod error;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    CellValue, CleaningSummary, FileFormat, FilterMode, MergeTask, Table, TablePreview, TaskPlan,
    ValidationReport,
};

// 引擎
pub use engine::{
    CellOperator, ColumnFilter, DataCleaner, DataValidator, DerivationService, MergeOrchestrator,
    PipelineOutput, PreviewGenerator,
};

// 导入 / 导出
pub use exporter::{FileWriter, TableWriter};
pub use importer::{TableMerger, TableReader, UniversalReader};

// 配置
pub use config::{ProcessorConfig, WriterCapabilities};

// 错误
pub use error::{ErrorKind, MergeError, MergeResult};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "多格式表格合并系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
