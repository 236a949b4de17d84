use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::variable::SystemConfig;
use crate::{Result, RucaseError};

/// 关键字操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    SetVariable,
    GetJsonValue,
    Replace,
    RandomString,
    FetchAllIds,
    ForceWait,
    CurrentCaseFile,
}

impl Keyword {
    pub const ALL: [Keyword; 7] = [
        Keyword::SetVariable,
        Keyword::GetJsonValue,
        Keyword::Replace,
        Keyword::RandomString,
        Keyword::FetchAllIds,
        Keyword::ForceWait,
        Keyword::CurrentCaseFile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Keyword::SetVariable => "set_variable",
            Keyword::GetJsonValue => "get_json_value",
            Keyword::Replace => "replace",
            Keyword::RandomString => "random_string",
            Keyword::FetchAllIds => "fetch_all_ids",
            Keyword::ForceWait => "force_wait",
            Keyword::CurrentCaseFile => "current_case_file",
        }
    }
}

impl FromStr for Keyword {
    type Err = RucaseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Keyword::ALL
            .into_iter()
            .find(|k| k.name() == name)
            .ok_or_else(|| RucaseError::ConfigError(format!("unknown keyword operation: {}", s)))
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 关键字标签 -> 操作，在加载配置时一次性建立
#[derive(Debug, Clone)]
pub struct KeywordRegistry {
    labels: HashMap<String, Keyword>,
}

impl Default for KeywordRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KeywordRegistry {
    /// 只包含英文操作名
    pub fn builtin() -> Self {
        let labels = Keyword::ALL
            .into_iter()
            .map(|k| (k.name().to_string(), k))
            .collect();
        Self { labels }
    }

    /// 内置名称加上配置文件 `[keywords]` 中的标签
    ///
    /// 标签指向不存在的操作时报配置错误。
    pub fn from_config(config: &SystemConfig) -> Result<Self> {
        let mut registry = Self::builtin();
        for (label, operation) in &config.keywords {
            let keyword: Keyword = operation.parse().map_err(|_| {
                RucaseError::ConfigError(format!(
                    "keyword '{}' maps to unknown operation '{}'",
                    label, operation
                ))
            })?;
            debug!(label = %label, operation = %keyword, "keyword registered");
            registry.labels.insert(label.trim().to_lowercase(), keyword);
        }
        Ok(registry)
    }

    /// 查找标签（大小写不敏感）
    pub fn resolve(&self, label: &str) -> Option<Keyword> {
        self.labels.get(&label.trim().to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = KeywordRegistry::builtin();
        assert_eq!(registry.len(), Keyword::ALL.len());
        assert_eq!(registry.resolve("set_variable"), Some(Keyword::SetVariable));
        assert_eq!(registry.resolve("SET_VARIABLE"), Some(Keyword::SetVariable));
        assert_eq!(registry.resolve("send_email"), None);
    }

    #[test]
    fn test_config_labels() {
        let mut config = SystemConfig::default();
        config
            .keywords
            .insert("设置变量".to_string(), "set_variable".to_string());
        config
            .keywords
            .insert("Wait".to_string(), "force_wait".to_string());

        let registry = KeywordRegistry::from_config(&config).unwrap();
        assert_eq!(registry.resolve("设置变量"), Some(Keyword::SetVariable));
        assert_eq!(registry.resolve("wait"), Some(Keyword::ForceWait));
    }

    #[test]
    fn test_unknown_operation_is_config_error() {
        let mut config = SystemConfig::default();
        config
            .keywords
            .insert("发邮件".to_string(), "send_email".to_string());

        let err = KeywordRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, RucaseError::ConfigError(_)));
    }

    #[test]
    fn test_keyword_from_str() {
        assert_eq!("fetch_all_ids".parse::<Keyword>().unwrap(), Keyword::FetchAllIds);
        assert!("nope".parse::<Keyword>().is_err());
    }
}
