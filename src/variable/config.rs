use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::debug;

use crate::{Result, RucaseError};

/// 选择当前环境的系统环境变量名
pub const ENVIRONMENT_VAR: &str = "ENVIRONMENT";

/// 单个环境下的系统变量
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Environment {
    /// 变量映射
    #[serde(flatten)]
    pub variables: HashMap<String, String>,
}

/// 执行相关配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// 单个 worker 进程的超时（秒）
    pub timeout_secs: u64,
    /// 单个 HTTP 请求的超时（秒）
    pub request_timeout_secs: u64,
    /// 并发 worker 数量
    pub jobs: Option<usize>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            request_timeout_secs: 30,
            jobs: None,
        }
    }
}

impl RunnerSettings {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 完整的系统配置文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SystemConfig {
    /// 默认环境名称
    #[serde(default)]
    pub environment: Option<String>,

    /// 所有环境配置：(环境, 变量名) -> 值
    #[serde(default)]
    pub environments: HashMap<String, Environment>,

    /// 关键字标签 -> 操作名
    #[serde(default)]
    pub keywords: HashMap<String, String>,

    #[serde(default)]
    pub runner: RunnerSettings,
}

impl SystemConfig {
    /// 获取指定环境的变量
    pub fn get_environment(&self, env_name: &str) -> Option<&Environment> {
        self.environments.get(env_name)
    }

    /// 两级查找：(环境, 变量名)
    pub fn lookup(&self, env_name: &str, key: &str) -> Option<&str> {
        self.get_environment(env_name)
            .and_then(|env| env.variables.get(key))
            .map(|s| s.as_str())
    }

    /// 当前环境：CLI 参数 > ENVIRONMENT 环境变量 > 配置文件
    pub fn current_environment(&self, cli_env: Option<&str>) -> Option<String> {
        cli_env
            .map(str::to_string)
            .or_else(|| std::env::var(ENVIRONMENT_VAR).ok().filter(|s| !s.is_empty()))
            .or_else(|| self.environment.clone())
    }

    /// 展开环境变量值中的 ${OS_VAR}
    fn resolve_env_vars(&mut self) {
        for env in self.environments.values_mut() {
            for value in env.variables.values_mut() {
                *value = expand_os_env(value);
            }
        }
    }
}

/// 解析并替换系统环境变量 ${VAR}，未设置的保持原样
fn expand_os_env(text: &str) -> String {
    static ENV_REGEX: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env pattern is valid"));

    ENV_REGEX
        .replace_all(text, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "rucase.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<SystemConfig> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            RucaseError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut config: SystemConfig = toml::from_str(&content)
            .map_err(|e| RucaseError::ConfigError(format!("Failed to parse config file: {}", e)))?;
        config.resolve_env_vars();
        Ok(config)
    }

    /// 显式路径优先（读取失败即报错）；否则自动查找，找不到时使用默认配置
    pub fn load(explicit: Option<&Path>) -> Result<SystemConfig> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::find_and_load().unwrap_or_default()),
        }
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及其父目录
    /// 2. 用户配置目录 ~/.config/rucase/
    pub fn find_and_load() -> Option<SystemConfig> {
        Self::try_load_from_current_dir().or_else(Self::try_load_from_user_dir)
    }

    fn try_load_from_current_dir() -> Option<SystemConfig> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.exists() {
                debug!(path = %config_path.display(), "loading config");
                return Self::load_from_path(&config_path).ok();
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    fn try_load_from_user_dir() -> Option<SystemConfig> {
        let home = dirs::home_dir()?;
        let config_path = home.join(".config").join("rucase").join(Self::CONFIG_FILE);

        if config_path.exists() {
            Self::load_from_path(&config_path).ok()
        } else {
            None
        }
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
    }
}
