use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::variable::config::SystemConfig;
use crate::variable::store::VariableStore;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(.*?)\}").expect("placeholder pattern is valid"));

/// 单个字符串允许的最大替换次数，防止变量值引用自身导致死循环
pub const MAX_SUBSTITUTIONS: usize = 64;

/// 插值结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolated {
    pub text: String,
    /// 无法解析的变量名（或超出替换上限的说明）
    pub unresolved: Option<String>,
}

/// `${name}` 占位符替换器
///
/// 先查当前环境的系统变量，再查变量池。
#[derive(Debug, Clone, Default)]
pub struct Interpolator {
    system: HashMap<String, String>,
}

impl Interpolator {
    pub fn new(config: &SystemConfig, env_name: Option<&str>) -> Self {
        let system = env_name
            .and_then(|name| config.get_environment(name))
            .map(|env| env.variables.clone())
            .unwrap_or_default();
        Self { system }
    }

    /// 逐个替换第一个占位符，直到没有占位符为止
    ///
    /// 每次替换后删除反斜杠，并把换行转义成两个字符 `\n`，
    /// 以便结果能作为 JSON 请求体解析。
    /// 任何一个变量找不到时放弃整个替换，返回原字符串。
    pub fn interpolate(&self, text: &str, store: &VariableStore) -> Interpolated {
        let mut data = text.to_string();
        let mut rounds = 0;

        loop {
            let Some(caps) = PLACEHOLDER.captures(&data) else {
                break;
            };
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            let range = whole.range();
            let name = name.as_str().to_string();

            if rounds == MAX_SUBSTITUTIONS {
                warn!(
                    variable = %name,
                    limit = MAX_SUBSTITUTIONS,
                    "interpolation stopped: substitution limit reached"
                );
                return Interpolated {
                    text: data,
                    unresolved: Some(format!(
                        "substitution limit ({}) reached at ${{{}}}",
                        MAX_SUBSTITUTIONS, name
                    )),
                };
            }

            let Some(value) = self.resolve(&name, store) else {
                warn!(variable = %name, "variable not found in system config or variable store");
                return Interpolated {
                    text: text.to_string(),
                    unresolved: Some(name),
                };
            };

            data.replace_range(range, &value);
            data = data.replace('\\', "");
            data = data.replace('\n', "\\n");
            rounds += 1;
        }

        Interpolated {
            text: data,
            unresolved: None,
        }
    }

    /// 只要文本结果
    pub fn render(&self, text: &str, store: &VariableStore) -> String {
        self.interpolate(text, store).text
    }

    pub fn resolve(&self, name: &str, store: &VariableStore) -> Option<String> {
        self.system
            .get(name)
            .cloned()
            .or_else(|| store.get_text(name).map(str::to_string))
    }
}

/// `${abc}` 取出 `abc`，不含占位符时原样返回
pub fn placeholder_name(text: &str) -> &str {
    PLACEHOLDER
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
}
