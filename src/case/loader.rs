use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::case::types::Case;
use crate::{Result, RucaseError};

const CASE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Debug, Deserialize)]
struct Sheet {
    name: String,
    #[serde(default)]
    cases: Vec<Value>,
}

/// 是否为用例文件（按扩展名判断）
pub fn is_case_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| CASE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// 从文件加载用例
///
/// 支持两种结构：
/// - 顶层即用例数组
/// - `{ sheets: [{ name, cases: [...] }] }`，按 sheet 顺序展开
pub fn load_cases(path: &Path) -> Result<Vec<Case>> {
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let document: Value = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };

    let cases = parse_document(document).map_err(|e| match e {
        RucaseError::ParseError(message) => {
            RucaseError::ParseError(format!("{}: {}", path.display(), message))
        }
        other => RucaseError::ParseError(format!("{}: {}", path.display(), other)),
    })?;
    debug!(file = %path.display(), count = cases.len(), "cases loaded");
    Ok(cases)
}

/// 解析已经反序列化的用例文档
pub fn parse_document(document: Value) -> Result<Vec<Case>> {
    match document {
        Value::Array(items) => parse_cases(items, None),
        Value::Object(mut map) => {
            let sheets = map.remove("sheets").ok_or_else(|| {
                RucaseError::ParseError(
                    "expected a list of cases or an object with 'sheets'".to_string(),
                )
            })?;
            let sheets: Vec<Sheet> = serde_json::from_value(sheets)?;

            let mut cases = Vec::new();
            for sheet in sheets {
                cases.extend(parse_cases(sheet.cases, Some(&sheet.name))?);
            }
            Ok(cases)
        }
        Value::Null => Ok(Vec::new()),
        other => Err(RucaseError::ParseError(format!(
            "expected a list of cases, got {}",
            other
        ))),
    }
}

fn parse_cases(items: Vec<Value>, sheet: Option<&str>) -> Result<Vec<Case>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let mut case = Case::from_value(item).map_err(|e| {
                RucaseError::ParseError(format!(
                    "{}case #{}: {}",
                    sheet.map(|s| format!("sheet '{}' ", s)).unwrap_or_default(),
                    index + 1,
                    e
                ))
            })?;
            if let Some(name) = sheet {
                case.sheet = Some(name.to_string());
            }
            case.validate()?;
            Ok(case)
        })
        .collect()
}

/// 列出目录下的用例文件，按文件名排序
pub fn discover_case_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_case_file(path))
        .collect();
    files.sort();
    Ok(files)
}

/// 把命令行给出的文件和目录展开为用例文件列表
pub fn collect_case_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(discover_case_files(path)?);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(RucaseError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("case file not found: {}", path.display()),
            )));
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::types::CaseId;

    #[test]
    fn test_load_yaml_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("login.yaml");
        fs::write(
            &path,
            r#"
- case_id: 1
  title: login
  method: post
  url: ${base_url}/login
  headers: |
    Content-Type: application/json
  data: {"user": "tom"}
  assertions:
    - contains_token
  other: obj|token:token
- case_id: 2
  method: set_variable
  result: name
  param_1: tom
"#,
        )
        .unwrap();

        let cases = load_cases(&path).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].case_id, CaseId::Number(1));
        assert_eq!(cases[0].assertions, vec!["contains_token"]);
        assert_eq!(cases[0].data.as_deref(), Some(r#"{"user":"tom"}"#));
        assert_eq!(cases[1].result.as_deref(), Some("name"));
    }

    #[test]
    fn test_load_json_sheets_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.json");
        fs::write(
            &path,
            r#"{"sheets": [
                {"name": "users", "cases": [{"case_id": "u1", "title": "a", "method": "get", "url": "http://x"}]},
                {"name": "orders", "cases": [{"case_id": "o1", "title": "b", "method": "get", "url": "http://y"}]}
            ]}"#,
        )
        .unwrap();

        let cases = load_cases(&path).unwrap();
        let sheets: Vec<_> = cases.iter().map(|c| c.sheet.as_deref().unwrap()).collect();
        assert_eq!(sheets, vec!["users", "orders"]);
    }

    #[test]
    fn test_missing_method_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "- case_id: 1\n  title: x\n").unwrap();

        let err = load_cases(&path).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("case #1"));
        assert!(message.contains("bad.yaml"));
        assert_eq!(message.matches("解析错误").count(), 1, "{}", message);
    }

    #[test]
    fn test_malformed_assertions_do_not_drop_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.yaml");
        fs::write(
            &path,
            r#"
- case_id: 1
  title: good
  method: get
  url: http://x
  assertions: '["contains_id"]'
- case_id: 2
  title: bad
  method: get
  url: http://x
  assertions: 'contains_id'
"#,
        )
        .unwrap();

        let cases = load_cases(&path).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].assertions, vec!["contains_id"]);
        assert!(cases[0].invalid_assertions.is_none());
        assert_eq!(cases[1].invalid_assertions.as_deref(), Some("contains_id"));
    }

    #[test]
    fn test_discover_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.yaml", "a.json", "c.txt", "d.yml"] {
            fs::write(dir.path().join(name), "[]").unwrap();
        }

        let files = discover_case_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.yaml", "d.yml"]);
    }
}
