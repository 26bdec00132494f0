// ==========================================
// 多格式表格合并系统 - 命令行入口
// ==========================================
// 子命令: run / validate / preview
// 输出: stdout 打印 JSON 结果；失败时 stderr 原样输出错误信息并返回非零
// ==========================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use table_merger::{logging, MergeOrchestrator, MergeTask, ProcessorConfig, WriterCapabilities};

#[derive(Parser)]
#[command(name = "table-merger", version, about = "多格式表格合并、清洗、验证与导出")]
struct Cli {
    /// 处理器配置文件（JSON）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 执行完整合并任务
    Run {
        /// 任务文件（JSON）
        #[arg(long)]
        task: PathBuf,

        /// 覆盖任务中的输出路径
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 合并并验证，不写出文件
    Validate {
        #[arg(long)]
        task: PathBuf,
    },
    /// 预览单个文件
    Preview {
        file: PathBuf,

        /// 样例行数
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
}

fn main() {
    logging::init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ProcessorConfig::load(cli.config.as_deref())?;
    let capabilities = WriterCapabilities::detect();
    tracing::info!(
        version = table_merger::VERSION,
        legacy_xls = capabilities.legacy_xls,
        "{} 启动",
        table_merger::APP_NAME
    );
    let orchestrator = MergeOrchestrator::new(config, capabilities);

    let summary = match cli.command {
        Commands::Run { task, output } => {
            let mut task = MergeTask::from_json_file(&task)?;
            if output.is_some() {
                task.output_path = output;
            }
            let result = orchestrator.run(&task)?;
            serde_json::to_value(&result).context("结果序列化失败")?
        }
        Commands::Validate { task } => {
            let task = MergeTask::from_json_file(&task)?;
            let report = orchestrator.validate_only(&task)?;
            serde_json::to_value(&report).context("结果序列化失败")?
        }
        Commands::Preview { file, rows } => {
            let preview = orchestrator.preview_file(&file, rows)?;
            json!(preview)
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("结果序列化失败")?
    );
    Ok(())
}
