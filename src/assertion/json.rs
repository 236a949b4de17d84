use serde_json::Value;
use serde_json_path::JsonPath;

use crate::assertion::types::AssertError;

/// 解析响应体
pub fn parse_body(body: &str) -> Result<Value, AssertError> {
    Ok(serde_json::from_str(body)?)
}

/// 按点号路径查找，`a.b.c` 逐层进入对象
pub fn lookup_dot_path<'a>(data: &'a Value, path: &str) -> Result<&'a Value, AssertError> {
    let mut current = data;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key).ok_or_else(|| AssertError::PathNotFound {
                path: path.to_string(),
                key: key.to_string(),
            })?,
            other => {
                return Err(AssertError::TypeMismatch {
                    path: path.to_string(),
                    expected: "object".to_string(),
                    actual: type_name(other).to_string(),
                });
            }
        };
    }
    Ok(current)
}

/// 执行 JSONPath 查询，返回所有匹配值
///
/// 不以 `$` 开头的路径视为相对根节点，例如 `data.id` 等价于 `$.data.id`。
pub fn query_json_path<'a>(data: &'a Value, path: &str) -> Result<Vec<&'a Value>, AssertError> {
    let normalized = normalize_path(path);
    let compiled = JsonPath::parse(&normalized).map_err(|e| AssertError::InvalidJsonPath {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    Ok(compiled.query(data).all())
}

/// 递归下降查找第一个名为 `key` 的字段（`$..key`）
pub fn first_by_key<'a>(data: &'a Value, key: &str) -> Result<Option<&'a Value>, AssertError> {
    let path = format!("$..{}", bracket_name(key));
    Ok(query_json_path(data, &path)?.into_iter().next())
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let rooted = if trimmed.starts_with('$') {
        trimmed.to_string()
    } else if trimmed.starts_with('[') {
        format!("${}", trimmed)
    } else {
        format!("$.{}", trimmed)
    };
    bracket_loose_names(&rooted)
}

/// 把 `.user-name` 这类 RFC 9535 简写不接受的名字改写成 `['user-name']`
///
/// 方括号和引号内的内容原样保留。
fn bracket_loose_names(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' if depth > 0 => {
                quote = Some(c);
                out.push(c);
            }
            '[' => {
                depth += 1;
                out.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                out.push(c);
            }
            '.' if depth == 0 => {
                let descendant = chars.next_if_eq(&'.').is_some();
                let mut name = String::new();
                while let Some(n) = chars.next_if(|n| *n != '.' && *n != '[') {
                    name.push(n);
                }

                if name.is_empty() || name == "*" || is_shorthand_name(&name) {
                    out.push_str(if descendant { ".." } else { "." });
                    out.push_str(&name);
                } else {
                    if descendant {
                        out.push_str("..");
                    }
                    out.push_str(&bracket_name(&name));
                }
            }
            c => out.push(c),
        }
    }
    out
}

fn is_shorthand_name(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || !c.is_ascii());
    first_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii())
}

fn bracket_name(name: &str) -> String {
    format!("['{}']", name.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// 按 Python `str()` 的规则把 JSON 值转成字符串
///
/// 字符串原样输出，`true` → `True`，`null` → `None`，
/// 对象和数组使用单引号的 repr 形式。
pub fn python_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => python_repr(other),
    }
}

fn python_repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                let f = n.as_f64().unwrap_or_default();
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
        }
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(python_repr).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), python_repr(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

/// 转成整数，规则同 Python `int()`：浮点数截断，字符串去空白后解析
pub fn as_integer(value: &Value) -> Result<i64, AssertError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(|| AssertError::NotAnInteger(n.to_string())),
        Value::String(s) => parse_integer(s),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(AssertError::NotAnInteger(python_str(other))),
    }
}

pub fn parse_integer(text: &str) -> Result<i64, AssertError> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| AssertError::NotAnInteger(format!("'{}'", text)))
}

/// 递归检查 JSON 结构
///
/// - 对象：每个键必须存在，值递归检查
/// - 数组：数据必须是数组，非空时用第一个元素匹配 schema 的第一个元素，
///   schema 为空数组时无法比较，视为失败
/// - 类型名字符串：检查叶子类型
/// - 其他字面量：忽略
pub fn check_structure(data: &Value, schema: &Value, path: &str) -> Result<(), AssertError> {
    match schema {
        Value::Object(expected) => {
            let Value::Object(actual) = data else {
                return Err(mismatch(path, "dict", data));
            };
            for (key, child) in expected {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                let value = actual.get(key).ok_or_else(|| AssertError::PathNotFound {
                    path: display_path(path),
                    key: key.clone(),
                })?;
                check_structure(value, child, &child_path)?;
            }
            Ok(())
        }
        Value::Array(expected) => {
            let Value::Array(actual) = data else {
                return Err(mismatch(path, "list", data));
            };
            match (actual.first(), expected.first()) {
                (Some(_), None) => Err(AssertError::EmptyListSchema(display_path(path))),
                (Some(first), Some(element @ (Value::Object(_) | Value::Array(_)))) => {
                    check_structure(first, element, &format!("{}[0]", path))
                }
                _ => Ok(()),
            }
        }
        Value::String(type_label) => match type_matches(type_label, data) {
            Some(true) | None => Ok(()),
            Some(false) => Err(mismatch(path, type_label, data)),
        },
        _ => Ok(()),
    }
}

/// 不认识的类型名返回 None（当作字面量忽略）
fn type_matches(label: &str, data: &Value) -> Option<bool> {
    let matched = match label {
        "str" | "string" => data.is_string(),
        "int" | "integer" => data.is_i64() || data.is_u64(),
        "float" | "number" => data.is_number(),
        "bool" | "boolean" => data.is_boolean(),
        "list" | "array" => data.is_array(),
        "dict" | "object" => data.is_object(),
        "null" | "None" => data.is_null(),
        _ => return None,
    };
    Some(matched)
}

fn mismatch(path: &str, expected: &str, data: &Value) -> AssertError {
    AssertError::TypeMismatch {
        path: display_path(path),
        expected: expected.to_string(),
        actual: type_name(data).to_string(),
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.to_string()
    }
}

/// Python 风格的类型名
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "None",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
