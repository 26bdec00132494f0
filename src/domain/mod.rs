// ==========================================
// 多格式表格合并系统 - 领域层
// ==========================================

pub mod format;
pub mod report;
pub mod rules;
pub mod table;
pub mod task;

// 重导出核心类型
pub use format::FileFormat;
pub use report::{
    CleaningSummary, ColumnProfile, ColumnStatistics, ColumnType, ConversionFailure,
    TablePreview, ValidationError, ValidationReport, ValidationStatistics, ValidationWarning,
    ValueCount,
};
pub use rules::{
    CellAction, CellOperation, CellOperationRecord, CleaningAction, CleaningRule,
    CleaningRuleRecord, DerivationRule, DerivationRuleRecord, ExpectedType, Extraction,
    FillMethod, MatchPattern, TargetType, ValidationCheck, ValidationRule, ValidationRuleRecord,
    ValueMapping,
};
pub use table::{CellValue, ImageAnchor, PlacedImage, SourceMetadata, SourceTable, Table, ValueKey};
pub use task::{FilterMode, MergeTask, TaskPlan};
