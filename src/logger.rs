use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt};

use crate::Result;

fn default_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// 初始化日志系统
///
/// 支持通过 RUST_LOG 环境变量控制日志级别
/// 默认级别: info（verbose 时为 debug）
///
/// 示例:
/// - RUST_LOG=debug rucase run cases/
/// - RUST_LOG=rucase::variable=trace rucase run cases/login.yaml
pub fn init_logger(verbose: bool) {
    let initialized = fmt()
        .with_env_filter(default_filter(verbose))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    if initialized.is_ok() {
        tracing::debug!("Logger initialized");
    }
}

/// 初始化写入文件的日志（worker 进程各自独立的日志文件）
pub fn init_file_logger(path: &Path, verbose: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let initialized = fmt()
        .with_env_filter(default_filter(verbose))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init();

    if initialized.is_ok() {
        tracing::info!(log = %path.display(), "Worker logger initialized");
    }
    Ok(())
}
