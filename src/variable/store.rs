use std::collections::HashMap;
use std::fmt;

use crate::http::Response;

/// 变量池中的值
#[derive(Debug, Clone)]
pub enum StoredValue {
    Text(String),
    /// 捕获的整个响应，插值时使用其原始响应体
    Response(Box<Response>),
}

impl StoredValue {
    pub fn as_text(&self) -> &str {
        match self {
            StoredValue::Text(s) => s,
            StoredValue::Response(response) => &response.body,
        }
    }
}

impl fmt::Display for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        StoredValue::Text(value)
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::Text(value.to_string())
    }
}

impl From<Response> for StoredValue {
    fn from(value: Response) -> Self {
        StoredValue::Response(Box::new(value))
    }
}

/// 变量池：在用例之间传递数据
///
/// 每个执行进程持有一个实例，进程启动时创建；
/// 后执行的用例可以覆盖或依赖任意先前用例写入的变量。
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: HashMap<String, StoredValue>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<StoredValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&StoredValue> {
        self.values.get(name)
    }

    /// 获取变量的文本形式
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_text())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// 批量写入文本变量（如 CLI 的 --var 覆盖）
    pub fn extend<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.set(key.into(), StoredValue::Text(value.into()));
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
