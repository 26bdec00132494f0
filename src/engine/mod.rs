// ==========================================
// 多格式表格合并系统 - 引擎层
// ==========================================
// 职责: 合并后的规则处理（清洗 / 验证 / 派生 / 单元格操作 / 列过滤）
// 约定: 各阶段独占表格，原地修改，按顺序串行执行
// ==========================================

pub mod cell_ops;
pub mod column_filter;
pub mod data_cleaner;
pub mod derivation;
pub mod orchestrator;
pub mod patterns;
pub mod preview;
pub mod validator;

// 重导出核心引擎
pub use cell_ops::CellOperator;
pub use column_filter::ColumnFilter;
pub use data_cleaner::{convert_cell, ConversionError, DataCleaner};
pub use derivation::DerivationService;
pub use orchestrator::{MergeOrchestrator, PipelineOutput};
pub use preview::PreviewGenerator;
pub use validator::DataValidator;
