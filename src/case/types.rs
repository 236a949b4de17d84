use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::http::Method;
use crate::{Result, RucaseError};

/// 用例 ID，表格里可能是数字也可能是字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseId {
    Number(i64),
    Text(String),
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseId::Number(n) => write!(f, "{}", n),
            CaseId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// 一个测试步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub case_id: CaseId,

    #[serde(default)]
    pub title: String,

    /// HTTP 方法，或关键字标签
    pub method: String,

    #[serde(default)]
    pub url: String,

    /// `Name: value` 逐行书写的请求头模板
    #[serde(default, deserialize_with = "header_lines")]
    pub headers: Option<String>,

    /// 请求体模板
    #[serde(default, deserialize_with = "text_or_json")]
    pub data: Option<String>,

    /// 断言指令列表，按顺序执行
    #[serde(default, deserialize_with = "directive_list")]
    pub assertions: Vec<String>,

    /// 无法解析成指令列表的断言单元格原文，执行时该用例判为失败
    #[serde(skip)]
    pub invalid_assertions: Option<String>,

    /// 变量提取指令（`obj|var:key`）或上传文件（`file|path`）
    #[serde(default, deserialize_with = "text_or_json")]
    pub other: Option<String>,

    /// 所属 sheet 名称
    #[serde(default)]
    pub sheet: Option<String>,

    /// 关键字步骤的结果变量名
    #[serde(default, deserialize_with = "text_or_json")]
    pub result: Option<String>,

    #[serde(default, deserialize_with = "text_or_json")]
    pub param_1: Option<String>,

    #[serde(default, deserialize_with = "text_or_json")]
    pub param_2: Option<String>,

    #[serde(default, deserialize_with = "text_or_json")]
    pub param_3: Option<String>,
}

/// 步骤类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Http(Method),
    Keyword,
}

impl Case {
    /// 从单条用例记录构造
    ///
    /// 断言单元格格式错误时不报错，原文保存在 `invalid_assertions`，
    /// 由执行阶段把该用例判为失败，同文件的其他用例照常加载。
    pub fn from_value(mut value: Value) -> serde_json::Result<Self> {
        let invalid = take_invalid_assertions(&mut value);
        let mut case: Case = serde_json::from_value(value)?;
        case.invalid_assertions = invalid;
        Ok(case)
    }

    /// 方法名是 HTTP 动词时为 HTTP 步骤，否则按关键字处理
    pub fn step_kind(&self) -> StepKind {
        match self.method.parse::<Method>() {
            Ok(method) => StepKind::Http(method),
            Err(_) => StepKind::Keyword,
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self.step_kind(), StepKind::Http(_))
    }

    /// 上传文件路径（`other = "file|path"`）
    pub fn upload_path(&self) -> Option<&str> {
        self.other
            .as_deref()
            .and_then(|other| other.strip_prefix("file|"))
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }

    /// 变量提取指令（排除上传文件）
    pub fn extraction(&self) -> Option<&str> {
        self.other
            .as_deref()
            .map(str::trim)
            .filter(|other| !other.is_empty() && !other.starts_with("file|"))
    }

    /// 检查必填字段
    pub fn validate(&self) -> Result<()> {
        if self.method.trim().is_empty() {
            return Err(RucaseError::ParseError(format!(
                "case {}: method is required",
                self.case_id
            )));
        }

        if self.is_http() {
            if self.title.trim().is_empty() {
                return Err(RucaseError::ParseError(format!(
                    "case {}: title is required",
                    self.case_id
                )));
            }
            if self.url.trim().is_empty() {
                return Err(RucaseError::ParseError(format!(
                    "case {}: url is required",
                    self.case_id
                )));
            }
        }

        Ok(())
    }
}

/// 字符串原样保留，其他 JSON/YAML 值序列化成 JSON 文本
fn text_or_json<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// 请求头可以写成多行字符串，也可以写成映射
fn header_lines<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Object(map)) => {
            let lines: Vec<String> = map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{}: {}", k, s),
                    other => format!("{}: {}", k, other),
                })
                .collect();
            Some(lines.join("\n"))
        }
        Some(other) => Some(other.to_string()),
    })
}

/// 取出不是字符串列表的断言单元格
fn take_invalid_assertions(value: &mut Value) -> Option<String> {
    let map = value.as_object_mut()?;
    let valid = match map.get("assertions")? {
        Value::Null => true,
        Value::Array(items) => items.iter().all(Value::is_string),
        Value::String(s) => {
            s.trim().is_empty() || serde_json::from_str::<Vec<String>>(s).is_ok()
        }
        _ => false,
    };
    if valid {
        return None;
    }

    map.remove("assertions").map(|cell| match cell {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// 断言列表可以是数组，也可以是表格单元格里的 JSON 数组字符串
fn directive_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(Vec::new()),
        Some(Value::String(s)) => serde_json::from_str::<Vec<Value>>(&s)
            .map_err(|e| D::Error::custom(format!("assertions must be a JSON list: {}", e)))?,
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(D::Error::custom(format!(
                "assertions must be a list, got {}",
                other
            )));
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(D::Error::custom(format!(
                "assertion must be a string, got {}",
                other
            ))),
        })
        .collect()
}
