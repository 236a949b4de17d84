use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::runner::types::{FileOutcome, FileReport, WorkerStatus};
use crate::{Result, RucaseError};

/// 进程池配置
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// 同时运行的 worker 数量
    pub jobs: usize,
    /// 单个 worker 的超时
    pub timeout: Duration,
    /// 本次运行的目录，每个 worker 在其下有独立子目录
    pub run_dir: PathBuf,
    /// worker 可执行文件（通常是当前程序）
    pub program: PathBuf,
    /// 透传给 worker 的参数（`--env`、`--config`、`--var`）
    pub passthrough: Vec<String>,
}

impl PoolOptions {
    pub fn new(program: impl Into<PathBuf>, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs: default_jobs(),
            timeout: Duration::from_secs(600),
            run_dir: run_dir.into(),
            program: program.into(),
            passthrough: Vec::new(),
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_passthrough(mut self, args: Vec<String>) -> Self {
        self.passthrough = args;
        self
    }
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// 一个文件一个子进程，子进程之间不共享任何状态
pub struct FilePool {
    options: PoolOptions,
}

/// 单个 worker 的启动参数
#[derive(Debug, Clone)]
struct WorkerJob {
    index: usize,
    file: PathBuf,
    dir: PathBuf,
}

impl WorkerJob {
    fn report_file(&self) -> PathBuf {
        self.dir.join("report.json")
    }

    fn log_file(&self) -> PathBuf {
        self.dir.join("worker.log")
    }

    fn console_file(&self) -> PathBuf {
        self.dir.join("console.txt")
    }
}

impl FilePool {
    pub fn new(options: PoolOptions) -> Self {
        Self { options }
    }

    /// 执行所有文件，全部结束后按输入顺序返回结果
    pub async fn run(&self, files: &[PathBuf]) -> Result<Vec<FileOutcome>> {
        let workers_dir = self.options.run_dir.join("workers");
        fs::create_dir_all(&workers_dir)?;

        info!(
            files = files.len(),
            jobs = self.options.jobs,
            timeout_secs = self.options.timeout.as_secs(),
            "starting worker pool"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.jobs.max(1)));
        let mut set = JoinSet::new();

        for (index, file) in files.iter().enumerate() {
            let dir = workers_dir.join(format!("{:03}_{}", index + 1, file_stem(file)));
            fs::create_dir_all(&dir)?;

            let job = WorkerJob {
                index,
                file: file.clone(),
                dir,
            };
            let options = self.options.clone();
            let semaphore = Arc::clone(&semaphore);

            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => run_worker(&options, &job).await,
                    Err(e) => failed_outcome(&job, format!("pool closed: {}", e), Duration::ZERO),
                };
                (job.index, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(files.len());
        while let Some(joined) = set.join_next().await {
            let (index, outcome) =
                joined.map_err(|e| RucaseError::Other(format!("worker task failed: {}", e)))?;
            outcomes.push((index, outcome));
        }
        outcomes.sort_by_key(|(index, _)| *index);

        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }
}

async fn run_worker(options: &PoolOptions, job: &WorkerJob) -> FileOutcome {
    let start = Instant::now();
    let console = match fs::File::create(job.console_file()) {
        Ok(file) => file,
        Err(e) => {
            let reason = format!("cannot create console file: {}", e);
            return failed_outcome(job, reason, start.elapsed());
        }
    };
    let console_err = match console.try_clone() {
        Ok(file) => file,
        Err(e) => {
            let reason = format!("cannot create console file: {}", e);
            return failed_outcome(job, reason, start.elapsed());
        }
    };

    let mut command = Command::new(&options.program);
    command
        .arg("run")
        .arg("--worker-output")
        .arg(job.report_file())
        .arg("--log-file")
        .arg(job.log_file())
        .args(&options.passthrough)
        .arg(&job.file)
        .stdin(Stdio::null())
        .stdout(Stdio::from(console))
        .stderr(Stdio::from(console_err))
        .kill_on_drop(true);

    debug!(file = %job.file.display(), dir = %job.dir.display(), "spawning worker");
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return failed_outcome(job, format!("cannot start worker: {}", e), start.elapsed());
        }
    };

    let waited = tokio::time::timeout(options.timeout, child.wait()).await;
    let status = match waited {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            return failed_outcome(job, format!("worker wait failed: {}", e), start.elapsed());
        }
        Err(_) => {
            warn!(file = %job.file.display(), "worker timed out, killing it");
            if let Err(e) = child.kill().await {
                warn!(file = %job.file.display(), error = %e, "failed to kill worker");
            }
            return FileOutcome {
                file: job.file.clone(),
                status: WorkerStatus::TimedOut,
                report: None,
                elapsed: start.elapsed(),
                log_file: job.log_file(),
                report_file: job.report_file(),
            };
        }
    };

    let elapsed = start.elapsed();
    match read_report(&job.report_file()) {
        Ok(report) => {
            info!(
                file = %job.file.display(),
                passed = report.summary.passed,
                failed = report.summary.failed,
                "worker finished"
            );
            FileOutcome {
                file: job.file.clone(),
                status: WorkerStatus::Completed,
                report: Some(report),
                elapsed,
                log_file: job.log_file(),
                report_file: job.report_file(),
            }
        }
        Err(e) => failed_outcome(
            job,
            format!("worker exited with {} without a report: {}", status, e),
            elapsed,
        ),
    }
}

fn failed_outcome(job: &WorkerJob, reason: String, elapsed: Duration) -> FileOutcome {
    warn!(file = %job.file.display(), reason = %reason, "worker failed");
    FileOutcome {
        file: job.file.clone(),
        status: WorkerStatus::Failed(reason),
        report: None,
        elapsed,
        log_file: job.log_file(),
        report_file: job.report_file(),
    }
}

fn read_report(path: &Path) -> Result<FileReport> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cases".to_string())
}

/// 把各 worker 的报告复制到同一个目录，重名时依次加 `_1`、`_2` 后缀
pub fn merge_results(outcomes: &[FileOutcome], target: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(target)?;

    let mut merged = Vec::new();
    for outcome in outcomes {
        if !outcome.report_file.is_file() {
            continue;
        }
        let destination = unique_destination(target, &file_stem(&outcome.file), "json");
        fs::copy(&outcome.report_file, &destination)?;
        debug!(from = %outcome.report_file.display(), to = %destination.display(), "report merged");
        merged.push(destination);
    }
    Ok(merged)
}

fn unique_destination(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.{}", stem, extension));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
