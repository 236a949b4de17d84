use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use uuid::Uuid;

use rucase::assertion::{matched_prefix, parse_directive};
use rucase::case::{SelectionStrategy, select_case_files};
use rucase::logger;
use rucase::runner::{
    CaseReporter, CaseRunner, FilePool, FileReport, PoolOptions, RunSummary, merge_results,
};
use rucase::variable::{ConfigLoader, SystemConfig};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// 多文件运行时的默认目录
const RUNS_DIR: &str = ".rucase/runs";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 执行用例文件或目录
    Run(RunArgs),
    /// 解析断言指令并打印其类型
    Check {
        #[arg(required = true)]
        directives: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// 用例文件或目录（.yaml / .yml / .json）
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// 当前环境名
    #[arg(short, long)]
    pub env: Option<String>,

    /// 配置文件路径（默认自动查找 rucase.toml）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 预置变量 key=value，可重复
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// 并发 worker 数量；指定后总是使用进程池
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// 单个 worker 超时（秒）
    #[arg(long)]
    pub timeout: Option<u64>,

    /// 交互式选择要执行的文件
    #[arg(long)]
    pub select: bool,

    /// 结果目录（默认 .rucase/runs/<时间戳>）
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 显示完整响应
    #[arg(short, long)]
    pub verbose: bool,

    /// worker 模式：报告写入该文件
    #[arg(long, hide = true)]
    pub worker_output: Option<PathBuf>,

    /// worker 模式：日志写入该文件
    #[arg(long, hide = true)]
    pub log_file: Option<PathBuf>,
}

impl RunArgs {
    fn parsed_vars(&self) -> Result<Vec<(String, String)>> {
        self.vars
            .iter()
            .map(|raw| {
                ConfigLoader::parse_cli_var(raw)
                    .with_context(|| format!("invalid --var '{}', expected key=value", raw))
            })
            .collect()
    }

    /// 传给 worker 的参数
    fn passthrough(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(env) = &self.env {
            args.extend(["--env".to_string(), env.clone()]);
        }
        if let Some(config) = &self.config {
            args.extend(["--config".to_string(), config.display().to_string()]);
        }
        for var in &self.vars {
            args.extend(["--var".to_string(), var.clone()]);
        }
        if self.verbose {
            args.push("--verbose".to_string());
        }
        args
    }
}

/// 执行 `run`，返回是否全部通过
pub async fn run(args: RunArgs) -> Result<bool> {
    if let Some(output) = args.worker_output.clone() {
        return run_worker(&args, &output).await;
    }

    logger::init_logger(args.verbose);
    let config = ConfigLoader::load(args.config.as_deref())?;
    let strategy = if args.select {
        SelectionStrategy::Interactive
    } else {
        SelectionStrategy::All
    };
    let files = select_case_files(&args.paths, strategy)?;

    if files.is_empty() {
        println!("{}", "No case files selected".yellow());
        return Ok(true);
    }

    if files.len() == 1 && args.jobs.is_none() {
        let reporter = CaseReporter::new(args.verbose);
        let report = run_in_process(&args, &config, &files[0], &reporter).await?;
        reporter.print_summary(&report.summary);
        return Ok(report.success());
    }

    run_pool(&args, &config, &files).await
}

/// worker 进程：只执行一个文件，把报告写到指定位置
async fn run_worker(args: &RunArgs, output: &Path) -> Result<bool> {
    match &args.log_file {
        Some(path) => logger::init_file_logger(path, args.verbose)?,
        None => logger::init_logger(args.verbose),
    }

    let [file] = args.paths.as_slice() else {
        bail!("worker mode expects exactly one case file");
    };

    let config = ConfigLoader::load(args.config.as_deref())?;
    let reporter = CaseReporter::new(args.verbose);
    let report = run_in_process(args, &config, file, &reporter).await?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("failed to write report {}", output.display()))?;
    info!(report = %output.display(), "worker report written");

    Ok(report.success())
}

async fn run_in_process(
    args: &RunArgs,
    config: &SystemConfig,
    file: &Path,
    reporter: &CaseReporter,
) -> Result<FileReport> {
    let env = config.current_environment(args.env.as_deref());
    let mut runner =
        CaseRunner::from_config(config, env.as_deref())?.with_variables(args.parsed_vars()?);

    let report = runner
        .run_file(file)
        .await
        .with_context(|| format!("failed to run {}", file.display()))?;

    reporter.print_header(&report.file, report.results.len());
    for result in &report.results {
        reporter.print_result(result);
    }
    Ok(report)
}

async fn run_pool(args: &RunArgs, config: &SystemConfig, files: &[PathBuf]) -> Result<bool> {
    // 提前校验，避免每个 worker 各自报同样的错
    args.parsed_vars()?;

    let run_dir = args.output.clone().unwrap_or_else(default_run_dir);
    let program = std::env::current_exe().context("cannot locate rucase executable")?;
    let jobs = args
        .jobs
        .or(config.runner.jobs)
        .unwrap_or_else(rucase::runner::pool::default_jobs);
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.runner.worker_timeout());

    let options = PoolOptions::new(program, &run_dir)
        .with_jobs(jobs)
        .with_timeout(timeout)
        .with_passthrough(args.passthrough());
    println!(
        "\nRunning {} files with {} workers, results in {}\n",
        files.len(),
        options.jobs,
        run_dir.display().to_string().bold()
    );

    let outcomes = FilePool::new(options).run(files).await?;
    let merged = merge_results(&outcomes, &run_dir.join("results"))?;
    info!(reports = merged.len(), "reports merged");

    let reporter = CaseReporter::new(args.verbose);
    reporter.print_file_table(&outcomes);

    let mut summary = RunSummary::default();
    for report in outcomes.iter().filter_map(|o| o.report.as_ref()) {
        summary.merge(&report.summary);
    }
    reporter.print_summary(&summary);

    Ok(outcomes.iter().all(|o| o.success()))
}

fn default_run_dir() -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let id = Uuid::new_v4().simple().to_string();
    PathBuf::from(RUNS_DIR).join(format!("{}_{}", stamp, &id[..8]))
}

/// 执行 `check`，全部可识别时返回 true
pub fn check(directives: &[String]) -> bool {
    let mut all_valid = true;
    for raw in directives {
        let directive = parse_directive(raw);
        if directive.is_valid() {
            println!(
                " {} {} -> {} ({})",
                "✓".green(),
                raw,
                directive.kind_name().cyan(),
                matched_prefix(raw).unwrap_or_default()
            );
        } else {
            all_valid = false;
            let detail = match &directive {
                rucase::assertion::Directive::Malformed { reason } => reason.clone(),
                _ => format!("undefined assertion rule: {}", raw),
            };
            println!(" {} {} -> {}", "✗".red(), raw, detail);
        }
    }
    all_valid
}
