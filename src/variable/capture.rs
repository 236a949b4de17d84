use serde_json::Value;
use tracing::{debug, warn};

use crate::assertion::json::{first_by_key, python_str};
use crate::http::Response;
use crate::variable::store::VariableStore;

/// 响应体中真实换行的占位符
const NEWLINE_SENTINEL: &str = "#$#";

/// 变量提取错误
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("malformed extraction directive: {0}")]
    Malformed(String),

    #[error("unsupported extraction kind: {0}")]
    UnsupportedKind(String),

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("key '{key}' not found in {body}")]
    KeyNotFound { key: String, body: String },
}

/// 变量提取指令，格式 `kind|spec`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractDirective {
    /// `obj|var:key`：递归查找 `key`，存入变量 `var`
    Object { var: String, key: String },
}

impl ExtractDirective {
    pub fn parse(raw: &str) -> Result<Self, CaptureError> {
        let (kind, spec) = raw.split_once('|').ok_or_else(|| {
            CaptureError::Malformed(format!("expected 'kind|spec', got '{}'", raw))
        })?;

        match kind.trim() {
            "obj" => {
                let (var, key) = spec.split_once(':').ok_or_else(|| {
                    CaptureError::Malformed(format!("expected 'var:key', got '{}'", spec))
                })?;
                let (var, key) = (var.trim(), key.trim());
                if var.is_empty() || key.is_empty() {
                    return Err(CaptureError::Malformed(format!(
                        "variable name and key must not be empty: '{}'",
                        spec
                    )));
                }
                Ok(Self::Object {
                    var: var.to_string(),
                    key: key.to_string(),
                })
            }
            other => Err(CaptureError::UnsupportedKind(other.to_string())),
        }
    }
}

/// 提取结果
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExtractOutcome {
    pub success: bool,
    pub message: String,
}

impl ExtractOutcome {
    fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }

    fn failed(error: CaptureError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
        }
    }
}

/// 执行提取指令，成功时写入变量池
///
/// 失败时不修改变量池，也不返回错误。
pub fn extract(response: &Response, raw: &str, store: &mut VariableStore) -> ExtractOutcome {
    let directive = match ExtractDirective::parse(raw) {
        Ok(directive) => directive,
        Err(e) => {
            warn!(directive = raw, error = %e, "extraction skipped");
            return ExtractOutcome::failed(e);
        }
    };

    match directive {
        ExtractDirective::Object { var, key } => match first_value_by_key(response.text(), &key) {
            Ok(value) => {
                debug!(variable = %var, key = %key, value = %value, "variable extracted");
                let message = format!("got value [{}] and stored it in ${{{}}}", value, var);
                store.set(var, value);
                ExtractOutcome::ok(message)
            }
            Err(e) => {
                warn!(directive = raw, error = %e, "extraction failed");
                ExtractOutcome::failed(e)
            }
        },
    }
}

/// 在 JSON 文本中递归查找第一个 `key`，按提取规则转成字符串
///
/// 严格解析失败时，把真实换行换成占位符再解析，取值后占位符还原为两个字符 `\n`；
/// 严格解析得到的字符串值保持原样。单引号统一换成双引号。
pub fn first_value_by_key(json_text: &str, key: &str) -> Result<String, CaptureError> {
    let data = decode_tolerant(json_text)?;
    let found = first_by_key(&data, key)
        .map_err(|e| CaptureError::Malformed(e.to_string()))?
        .ok_or_else(|| CaptureError::KeyNotFound {
            key: format!("$..{}", key),
            body: python_str(&data),
        })?;

    Ok(python_str(found)
        .replace(NEWLINE_SENTINEL, "\\n")
        .replace('\'', "\""))
}

fn decode_tolerant(text: &str) -> Result<Value, CaptureError> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(first) => serde_json::from_str(&text.replace('\n', NEWLINE_SENTINEL))
            .map_err(|_| CaptureError::InvalidJson(first.to_string())),
    }
}
