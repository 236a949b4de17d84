use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 断言内部错误，在求值边界处折叠为失败结果
#[derive(Debug, thiserror::Error)]
pub enum AssertError {
    #[error("JSON decode error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("invalid JSONPath '{path}': {message}")]
    InvalidJsonPath { path: String, message: String },

    #[error("key '{key}' of path '{path}' not found")]
    PathNotFound { path: String, key: String },

    #[error("path '{path}' expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("cannot convert {0} to an integer")]
    NotAnInteger(String),

    #[error("cannot load '{path}': {message}")]
    FileError { path: String, message: String },

    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    #[error("structure for '{0}' is an empty list, nothing to match elements against")]
    EmptyListSchema(String),
}

/// `jsonpath_` 指令的比较运算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonPathOp {
    Equal,    // =
    Contains, // &
    Greater,  // >
    Less,     // <
    NotEqual, // <>
}

impl JsonPathOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::Contains => "&",
            Self::Greater => ">",
            Self::Less => "<",
            Self::NotEqual => "<>",
        }
    }

    /// 是否为整数比较
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Greater | Self::Less | Self::NotEqual)
    }
}

impl fmt::Display for JsonPathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 解析后的断言指令
///
/// `expected` 字段保存未插值的原文，求值时才替换 `${...}`。
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `contains_a.b.c`
    Contains { path: String },
    /// `value_key=expected`
    Value { path: String, expected: String },
    /// `time_N`，单位秒
    ResponseTime { max_secs: u64 },
    /// `jsonpath_$.a.b=1` 等
    JsonPath {
        path: String,
        op: JsonPathOp,
        expected: String,
    },
    /// `schema_file.json`
    Schema { file: PathBuf },
    /// `header_Name=part`
    HeaderContains { name: String, expected: String },
    /// `headerValue_Name=value`
    HeaderEquals { name: String, expected: String },
    /// `header_text_xxx` / `text_contains_xxx`
    TextContains { text: String },
    /// `text_matches_regex`
    TextMatches { pattern: String },
    /// `cookies_contain_name`
    CookieExists { name: String },
    /// `cookie_value_name=value`
    CookieEquals { name: String, expected: String },
    /// `response_size_min=X&max=Y`
    ResponseSize { min: usize, max: usize },
    /// `structure_file.json`
    Structure { file: PathBuf },
    /// 前缀已识别但参数不合法
    Malformed { reason: String },
    /// 没有匹配的前缀
    Unknown,
}

impl Directive {
    /// 指令种类名称（用于 `rucase check` 输出）
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Contains { .. } => "contains",
            Self::Value { .. } => "value",
            Self::ResponseTime { .. } => "time",
            Self::JsonPath { .. } => "jsonpath",
            Self::Schema { .. } => "schema",
            Self::HeaderContains { .. } => "header",
            Self::HeaderEquals { .. } => "headerValue",
            Self::TextContains { .. } => "text_contains",
            Self::TextMatches { .. } => "text_matches",
            Self::CookieExists { .. } => "cookies_contain",
            Self::CookieEquals { .. } => "cookie_value",
            Self::ResponseSize { .. } => "response_size",
            Self::Structure { .. } => "structure",
            Self::Malformed { .. } => "malformed",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Malformed { .. } | Self::Unknown)
    }
}

/// 单条断言结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    /// 原始断言字符串
    pub raw: String,

    /// 是否通过
    pub passed: bool,

    /// 可读的原因说明
    pub reason: String,
}

impl AssertionResult {
    pub fn pass(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            passed: true,
            reason: reason.into(),
        }
    }

    pub fn fail(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            passed: false,
            reason: reason.into(),
        }
    }

    /// 从内部错误构造失败结果
    pub fn error(raw: impl Into<String>, context: &str, error: AssertError) -> Self {
        Self::fail(raw, format!("{} failed: {}", context, error))
    }
}

/// 一组断言的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionReport {
    pub results: Vec<AssertionResult>,
}

impl AssertionReport {
    pub fn new(results: Vec<AssertionResult>) -> Self {
        Self { results }
    }

    /// 全部通过才算成功
    pub fn success(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "assertions finished: total {}, passed {}, failed {}",
            self.total(),
            self.passed(),
            self.failed()
        )
    }

    /// 汇总行加每条断言一行
    pub fn render(&self) -> String {
        let mut lines = vec![self.summary()];
        for (i, result) in self.results.iter().enumerate() {
            let status = if result.passed {
                "✓ passed"
            } else {
                "✗ failed"
            };
            lines.push(format!(
                "---assertion {}: {} -> {}: {}",
                i + 1,
                result.raw,
                status,
                result.reason
            ));
        }
        lines.join("\n")
    }
}
