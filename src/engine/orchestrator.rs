// ==========================================
// 多格式表格合并系统 - 管道编排器
// ==========================================
// 流程: 编译规则 → 合并 → 清洗 → 验证 → 派生 → 单元格操作 → 列过滤 → 导出
// 验证: 只产出报告，不阻断后续步骤
// 并发: 单次调用独占自己的表格与规则，不共享可变状态
// ==========================================

use crate::config::{ProcessorConfig, WriterCapabilities};
use crate::domain::format::FileFormat;
use crate::domain::report::{CleaningSummary, TablePreview, ValidationReport};
use crate::domain::table::Table;
use crate::domain::task::{MergeTask, TaskPlan};
use crate::engine::{
    CellOperator, ColumnFilter, DataCleaner, DataValidator, DerivationService, PreviewGenerator,
};
use crate::error::{MergeError, MergeResult};
use crate::exporter::FileWriter;
use crate::importer::{TableMerger, TableReader, UniversalReader};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

// ==========================================
// PipelineOutput - 管道结果
// ==========================================

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub task_id: String,
    #[serde(skip)]
    pub table: Table,
    /// 未配置验证规则时为 None
    pub validation: Option<ValidationReport>,
    pub cleaning: CleaningSummary,
    pub output_path: PathBuf,
    pub output_format: FileFormat,
}

// ==========================================
// MergeOrchestrator - 管道编排器
// ==========================================

pub struct MergeOrchestrator {
    config: ProcessorConfig,
    reader: UniversalReader,
    writer: FileWriter,
}

impl MergeOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - config: 处理器配置
    /// - capabilities: 启动时检测到的导出能力
    pub fn new(config: ProcessorConfig, capabilities: WriterCapabilities) -> Self {
        Self {
            reader: UniversalReader::new(&config),
            writer: FileWriter::new(&config, capabilities),
            config,
        }
    }

    /// 执行完整管道
    ///
    /// # 返回
    /// - Ok(PipelineOutput): 最终表格、验证报告、清洗汇总、输出路径
    /// - Err: 规则无效、文件格式错误、缺失依赖、写出失败
    #[instrument(skip_all, fields(files = task.files.len()))]
    pub fn run(&self, task: &MergeTask) -> MergeResult<PipelineOutput> {
        let task_id = task
            .task_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        info!(task_id = %task_id, name = ?task.name, "开始执行合并任务");

        // ==========================================
        // 步骤1: 编译规则
        // ==========================================
        let plan = TaskPlan::compile(task)?;
        if task.files.is_empty() {
            return Err(MergeError::NoInputFiles);
        }

        // ==========================================
        // 步骤2-3: 合并 + 清洗
        // ==========================================
        let (mut table, cleaning) = self.merge_and_clean(&task.files, &plan)?;

        // ==========================================
        // 步骤4: 验证（不阻断）
        // ==========================================
        let validation = if plan.validation.is_empty() {
            None
        } else {
            let report = DataValidator.validate(&table, &plan.validation);
            if !report.is_valid {
                warn!(
                    task_id = %task_id,
                    errors = report.statistics.total_errors,
                    "数据验证未通过，继续处理"
                );
            }
            Some(report)
        };

        // ==========================================
        // 步骤5: 派生列
        // ==========================================
        if let Some(rule) = &plan.derivation {
            DerivationService.apply(&mut table, rule);
        }

        // ==========================================
        // 步骤6: 单元格操作
        // ==========================================
        if !plan.cell_operations.is_empty() {
            let skipped = CellOperator.apply(&mut table, &plan.cell_operations);
            debug!(skipped, "单元格操作执行完毕");
        }

        // ==========================================
        // 步骤7: 列过滤
        // ==========================================
        ColumnFilter.apply(&mut table, plan.filter_mode, &plan.filter_columns);

        // ==========================================
        // 步骤8: 导出
        // ==========================================
        let destination = self.output_path(task, &task_id, plan.output_format);
        let output_format = FileWriter::resolve_format(&destination, plan.output_format);
        let output_path = self.writer.write(&table, &destination, plan.output_format)?;

        info!(
            task_id = %task_id,
            output = %output_path.display(),
            rows = table.rows.len(),
            columns = table.header.len(),
            "合并任务完成"
        );

        Ok(PipelineOutput {
            task_id,
            table,
            validation,
            cleaning,
            output_path,
            output_format,
        })
    }

    /// 只做合并、清洗与验证，不写出文件
    #[instrument(skip_all, fields(files = task.files.len()))]
    pub fn validate_only(&self, task: &MergeTask) -> MergeResult<ValidationReport> {
        let plan = TaskPlan::compile(task)?;
        if task.files.is_empty() {
            return Err(MergeError::NoInputFiles);
        }
        let (table, _) = self.merge_and_clean(&task.files, &plan)?;
        Ok(DataValidator.validate(&table, &plan.validation))
    }

    /// 单文件预览
    ///
    /// # 参数
    /// - path: 源文件
    /// - max_rows: 样例行数
    #[instrument(skip(self))]
    pub fn preview_file(&self, path: &Path, max_rows: usize) -> MergeResult<TablePreview> {
        let source = self.reader.read(path)?;
        let table = Table::new(source.header, source.rows);
        Ok(PreviewGenerator.generate(&table, max_rows))
    }

    fn merge_and_clean(
        &self,
        files: &[PathBuf],
        plan: &TaskPlan,
    ) -> MergeResult<(Table, CleaningSummary)> {
        let merger = TableMerger::new(&self.reader);
        let mut table = merger.merge(files)?;
        let cleaning = if plan.cleaning.is_empty() {
            CleaningSummary::default()
        } else {
            DataCleaner.apply_rules(&mut table, &plan.cleaning)
        };
        Ok((table, cleaning))
    }

    fn output_path(&self, task: &MergeTask, task_id: &str, format: FileFormat) -> PathBuf {
        match &task.output_path {
            Some(path) => path.clone(),
            None => self
                .config
                .output_dir
                .join(format!("merged_{}.{}", task_id, format.extension())),
        }
    }
}
