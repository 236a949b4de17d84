use std::fs;
use std::path::Path;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::assertion::json::{
    as_integer, check_structure, lookup_dot_path, parse_body, parse_integer, python_str,
    query_json_path,
};
use crate::assertion::parser::parse_directive;
use crate::assertion::types::{
    AssertError, AssertionReport, AssertionResult, Directive, JsonPathOp,
};
use crate::http::Response;
use crate::variable::{Interpolator, VariableStore};

/// 求值上下文：期望值在求值时插值
#[derive(Debug, Clone, Copy)]
pub struct AssertContext<'a> {
    pub interpolator: &'a Interpolator,
    pub store: &'a VariableStore,
}

impl<'a> AssertContext<'a> {
    pub fn new(interpolator: &'a Interpolator, store: &'a VariableStore) -> Self {
        Self {
            interpolator,
            store,
        }
    }

    fn expand(&self, text: &str) -> String {
        self.interpolator.render(text, self.store)
    }
}

/// 依次执行全部断言，不短路
pub fn evaluate_all(
    response: &Response,
    directives: &[String],
    ctx: AssertContext<'_>,
) -> AssertionReport {
    let results = directives
        .iter()
        .map(|raw| evaluate(raw, response, ctx))
        .collect();
    AssertionReport::new(results)
}

/// 解析并执行单条断言
pub fn evaluate(raw: &str, response: &Response, ctx: AssertContext<'_>) -> AssertionResult {
    let directive = parse_directive(raw);
    let result = evaluate_directive(raw, &directive, response, ctx);
    debug!(
        directive = raw,
        kind = directive.kind_name(),
        passed = result.passed,
        "assertion evaluated"
    );
    result
}

/// 执行已解析的断言
pub fn evaluate_directive(
    raw: &str,
    directive: &Directive,
    response: &Response,
    ctx: AssertContext<'_>,
) -> AssertionResult {
    match directive {
        Directive::Contains { path } => eval_contains(raw, response, path),
        Directive::Value { path, expected } => {
            eval_value(raw, response, path, &ctx.expand(expected))
        }
        Directive::ResponseTime { max_secs } => eval_time(raw, response, *max_secs),
        Directive::JsonPath { path, op, expected } => {
            eval_json_path(raw, response, path, *op, &ctx.expand(expected))
        }
        Directive::Schema { file } => eval_schema(raw, response, file),
        Directive::HeaderContains { name, expected } => {
            eval_header_contains(raw, response, name, &ctx.expand(expected))
        }
        Directive::HeaderEquals { name, expected } => {
            eval_header_equals(raw, response, name, &ctx.expand(expected))
        }
        Directive::TextContains { text } => eval_text_contains(raw, response, text),
        Directive::TextMatches { pattern } => eval_text_matches(raw, response, pattern),
        Directive::CookieExists { name } => eval_cookie_exists(raw, response, name),
        Directive::CookieEquals { name, expected } => {
            eval_cookie_equals(raw, response, name, &ctx.expand(expected))
        }
        Directive::ResponseSize { min, max } => eval_response_size(raw, response, *min, *max),
        Directive::Structure { file } => eval_structure(raw, response, file),
        Directive::Malformed { reason } => {
            AssertionResult::fail(raw, format!("malformed assertion: {}", reason))
        }
        Directive::Unknown => {
            AssertionResult::fail(raw, format!("undefined assertion rule: {}", raw))
        }
    }
}

fn eval_contains(raw: &str, response: &Response, path: &str) -> AssertionResult {
    let data = match parse_body(response.text()) {
        Ok(data) => data,
        Err(e) => {
            return AssertionResult::fail(
                raw,
                format!("contains check failed on response {}: {}", response.text(), e),
            );
        }
    };

    let nested = path.contains('.');
    match lookup_dot_path(&data, path) {
        Ok(_) if nested => AssertionResult::pass(
            raw,
            format!("response contains nested key '{}'", path),
        ),
        Ok(_) => AssertionResult::pass(raw, format!("response contains key '{}'", path)),
        Err(e) => AssertionResult::fail(
            raw,
            format!("response {} does not contain '{}': {}", response.text(), path, e),
        ),
    }
}

fn eval_value(raw: &str, response: &Response, path: &str, expected: &str) -> AssertionResult {
    let actual = match parse_body(response.text())
        .and_then(|data| lookup_dot_path(&data, path).map(python_str))
    {
        Ok(actual) => actual,
        Err(e) => return AssertionResult::error(raw, "value check", e),
    };

    if actual == expected {
        AssertionResult::pass(
            raw,
            format!(
                "value of '{}' matches, expected: {}, actual: {}",
                path, expected, actual
            ),
        )
    } else {
        AssertionResult::fail(
            raw,
            format!(
                "value of '{}' does not match, expected: {}, actual: {}",
                path, expected, actual
            ),
        )
    }
}

fn eval_time(raw: &str, response: &Response, max_secs: u64) -> AssertionResult {
    let elapsed = response.elapsed_secs();
    if elapsed <= max_secs as f64 {
        AssertionResult::pass(
            raw,
            format!("response time {:.2}s <= {}s", elapsed, max_secs),
        )
    } else {
        AssertionResult::fail(
            raw,
            format!("response time {:.2}s > {}s", elapsed, max_secs),
        )
    }
}

fn eval_json_path(
    raw: &str,
    response: &Response,
    path: &str,
    op: JsonPathOp,
    expected: &str,
) -> AssertionResult {
    let data = match parse_body(response.text()) {
        Ok(data) => data,
        Err(e) => return AssertionResult::error(raw, "JSONPath check", e),
    };
    let matches = match query_json_path(&data, path) {
        Ok(matches) => matches,
        Err(e) => return AssertionResult::error(raw, "JSONPath check", e),
    };

    match matches.as_slice() {
        [] => AssertionResult::fail(raw, format!("JSONPath '{}' found no match", path)),
        [single] => match compare_single(path, op, single, expected) {
            Ok((true, reason)) => AssertionResult::pass(raw, reason),
            Ok((false, reason)) => AssertionResult::fail(raw, reason),
            Err(e) => AssertionResult::error(raw, "JSONPath check", e),
        },
        many => compare_many(raw, path, op, many, expected),
    }
}

fn compare_single(
    path: &str,
    op: JsonPathOp,
    actual: &Value,
    expected: &str,
) -> Result<(bool, String), AssertError> {
    let actual_text = python_str(actual);
    let outcome = match op {
        JsonPathOp::Equal => {
            let ok = actual_text == expected;
            let reason = format!("'{}' expected {}, actual {}", path, expected, actual_text);
            (ok, reason)
        }
        JsonPathOp::Contains => {
            let ok = actual_text.contains(expected);
            let verb = if ok { "contains" } else { "does not contain" };
            let reason = format!(
                "'{}' value {} {} expected {}",
                path, actual_text, verb, expected
            );
            (ok, reason)
        }
        JsonPathOp::Greater | JsonPathOp::Less | JsonPathOp::NotEqual => {
            let left = as_integer(actual)?;
            let right = parse_integer(expected)?;
            let (ok, relation) = match op {
                JsonPathOp::Greater => (left > right, "greater than"),
                JsonPathOp::Less => (left < right, "less than"),
                _ => (left != right, "not equal to"),
            };
            let reason = if ok {
                format!("'{}' value {} is {} {}", path, left, relation, right)
            } else {
                format!("'{}' value {} is not {} {}", path, left, relation, right)
            };
            (ok, reason)
        }
    };
    Ok(outcome)
}

fn compare_many(
    raw: &str,
    path: &str,
    op: JsonPathOp,
    matches: &[&Value],
    expected: &str,
) -> AssertionResult {
    let rendered: Vec<String> = matches.iter().map(|v| python_str(v)).collect();
    let listing = format!("[{}]", rendered.join(", "));

    if op.is_numeric() {
        return AssertionResult::fail(
            raw,
            format!(
                "'{}' expected a single match for '{}', found {}: {}",
                path,
                op,
                matches.len(),
                listing
            ),
        );
    }

    if rendered.iter().any(|v| v == expected) {
        AssertionResult::pass(
            raw,
            format!("'{}' matches {} include expected {}", path, listing, expected),
        )
    } else {
        AssertionResult::fail(
            raw,
            format!(
                "'{}' matches {} do not include expected {}",
                path, listing, expected
            ),
        )
    }
}

fn load_json_file(path: &Path) -> Result<Value, AssertError> {
    let content = fs::read_to_string(path).map_err(|e| AssertError::FileError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| AssertError::FileError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn eval_schema(raw: &str, response: &Response, file: &Path) -> AssertionResult {
    let schema = match load_json_file(file) {
        Ok(schema) => schema,
        Err(e) => return AssertionResult::error(raw, "JSON schema check", e),
    };
    let data = match parse_body(response.text()) {
        Ok(data) => data,
        Err(e) => return AssertionResult::error(raw, "JSON schema check", e),
    };
    let validator = match jsonschema::validator_for(&schema) {
        Ok(validator) => validator,
        Err(e) => {
            return AssertionResult::fail(
                raw,
                format!("JSON schema check failed: invalid schema {}: {}", file.display(), e),
            );
        }
    };

    let errors: Vec<String> = validator
        .iter_errors(&data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        AssertionResult::pass(raw, "JSON schema check passed: response matches schema")
    } else {
        AssertionResult::fail(
            raw,
            format!("JSON schema check failed: {}", errors.join("; ")),
        )
    }
}

fn eval_header_contains(
    raw: &str,
    response: &Response,
    name: &str,
    expected: &str,
) -> AssertionResult {
    match response.header(name) {
        None => AssertionResult::fail(raw, format!("response has no header '{}'", name)),
        Some(value) if value.contains(expected) => {
            AssertionResult::pass(raw, format!("header '{}' contains '{}'", name, expected))
        }
        Some(value) => AssertionResult::fail(
            raw,
            format!(
                "header '{}' does not contain expected value, expected: {}, actual: {}",
                name, expected, value
            ),
        ),
    }
}

fn eval_header_equals(
    raw: &str,
    response: &Response,
    name: &str,
    expected: &str,
) -> AssertionResult {
    let actual = response.header(name).unwrap_or("None");
    let reason = format!("header '{}' expected {}, actual {}", name, expected, actual);
    if actual == expected {
        AssertionResult::pass(raw, reason)
    } else {
        AssertionResult::fail(raw, reason)
    }
}

fn eval_text_contains(raw: &str, response: &Response, text: &str) -> AssertionResult {
    if response.text().contains(text) {
        AssertionResult::pass(raw, format!("response text contains '{}'", text))
    } else {
        AssertionResult::fail(raw, format!("response text does not contain '{}'", text))
    }
}

fn eval_text_matches(raw: &str, response: &Response, pattern: &str) -> AssertionResult {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            return AssertionResult::error(
                raw,
                "text match",
                AssertError::InvalidRegex(e.to_string()),
            );
        }
    };

    if re.is_match(response.text()) {
        AssertionResult::pass(raw, format!("response text matches '{}'", pattern))
    } else {
        AssertionResult::fail(raw, format!("response text does not match '{}'", pattern))
    }
}

fn eval_cookie_exists(raw: &str, response: &Response, name: &str) -> AssertionResult {
    if response.cookie(name).is_some() {
        AssertionResult::pass(raw, format!("response sets cookie '{}'", name))
    } else {
        AssertionResult::fail(raw, format!("response does not set cookie '{}'", name))
    }
}

fn eval_cookie_equals(
    raw: &str,
    response: &Response,
    name: &str,
    expected: &str,
) -> AssertionResult {
    let actual = response.cookie(name).unwrap_or("None");
    let reason = format!("cookie '{}' expected {}, actual {}", name, expected, actual);
    if actual == expected {
        AssertionResult::pass(raw, reason)
    } else {
        AssertionResult::fail(raw, reason)
    }
}

fn eval_response_size(raw: &str, response: &Response, min: usize, max: usize) -> AssertionResult {
    let size = response.size;
    if size < min {
        AssertionResult::fail(
            raw,
            format!("response size {} bytes < minimum {} bytes", size, min),
        )
    } else if size > max {
        AssertionResult::fail(
            raw,
            format!("response size {} bytes > maximum {} bytes", size, max),
        )
    } else {
        AssertionResult::pass(
            raw,
            format!("response size {} bytes >= {} <= {}", size, min, max),
        )
    }
}

fn eval_structure(raw: &str, response: &Response, file: &Path) -> AssertionResult {
    let outcome = load_json_file(file).and_then(|schema| {
        let data = parse_body(response.text())?;
        check_structure(&data, &schema, "")
    });

    match outcome {
        Ok(()) => AssertionResult::pass(raw, "JSON structure check passed"),
        Err(e) => AssertionResult::error(raw, "JSON structure check", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};
    use std::collections::HashMap;
    use std::time::Duration;

    fn response(body: &str) -> Response {
        Response::new(200, HeaderMap::new(), body.to_string(), Duration::from_millis(20)).unwrap()
    }

    fn run(raw: &str, response: &Response) -> AssertionResult {
        let interpolator = Interpolator::default();
        let store = VariableStore::new();
        evaluate(raw, response, AssertContext::new(&interpolator, &store))
    }

    #[test]
    fn test_contains_nested_key() {
        let resp = response(r#"{"status":"ok","data":{"id":42}}"#);
        let result = run("contains_data.id", &resp);
        assert!(result.passed, "{}", result.reason);
        assert!(result.reason.contains("nested key 'data.id'"));
    }

    #[test]
    fn test_contains_missing_key() {
        let resp = response(r#"{"status":"ok"}"#);
        assert!(!run("contains_data", &resp).passed);
        assert!(!run("contains_data.id", &resp).passed);
    }

    #[test]
    fn test_contains_on_non_json_body() {
        let resp = response("<html></html>");
        let result = run("contains_id", &resp);
        assert!(!result.passed);
        assert!(result.reason.contains("JSON decode error"));
    }

    #[test]
    fn test_value_equal() {
        let resp = response(r#"{"status":"ok","flag":true,"n":3}"#);
        assert!(run("value_status=ok", &resp).passed);
        assert!(run("value_flag=True", &resp).passed);
        assert!(run("value_n=3", &resp).passed);
        assert!(!run("value_status=fail", &resp).passed);
        assert!(!run("value_missing=1", &resp).passed);
    }

    #[test]
    fn test_value_expected_is_interpolated() {
        let resp = response(r#"{"status":"ok"}"#);
        let interpolator = Interpolator::default();
        let mut store = VariableStore::new();
        store.set("expected", "ok");

        let result = evaluate(
            "value_status=${expected}",
            &resp,
            AssertContext::new(&interpolator, &store),
        );
        assert!(result.passed, "{}", result.reason);
    }

    #[test]
    fn test_json_path_less_failure_reason() {
        let resp = response(r#"{"count":5}"#);
        let result = run("jsonpath_$.count<3", &resp);
        assert!(!result.passed);
        assert!(
            result.reason.contains("value 5 is not less than 3"),
            "{}",
            result.reason
        );
    }

    #[test]
    fn test_json_path_comparisons() {
        let resp = response(r#"{"age":20,"name":"Tom Lee","code":"7"}"#);
        assert!(run("jsonpath_$.age>18", &resp).passed);
        assert!(!run("jsonpath_$.age>20", &resp).passed);
        assert!(run("jsonpath_$.age<100", &resp).passed);
        assert!(run("jsonpath_$.age<>7", &resp).passed);
        assert!(!run("jsonpath_$.code<>7", &resp).passed);
        assert!(run("jsonpath_$.name&Tom", &resp).passed);
        assert!(run("jsonpath_$.name=Tom Lee", &resp).passed);
    }

    #[test]
    fn test_json_path_zero_matches_always_fails() {
        let resp = response(r#"{"a":1}"#);
        for raw in [
            "jsonpath_$.b=1",
            "jsonpath_$.b&1",
            "jsonpath_$.b>1",
            "jsonpath_$.b<1",
            "jsonpath_$.b<>1",
        ] {
            let result = run(raw, &resp);
            assert!(!result.passed, "{} should fail", raw);
            assert!(result.reason.contains("no match"));
        }
    }

    #[test]
    fn test_json_path_non_numeric_fails() {
        let resp = response(r#"{"age":"old"}"#);
        let result = run("jsonpath_$.age>18", &resp);
        assert!(!result.passed);
        assert!(result.reason.contains("integer"));
    }

    #[test]
    fn test_json_path_multiple_matches() {
        let resp = response(r#"{"items":[{"id":1},{"id":2}]}"#);
        assert!(run("jsonpath_$.items[*].id=2", &resp).passed);
        assert!(!run("jsonpath_$.items[*].id=3", &resp).passed);

        let result = run("jsonpath_$.items[*].id>0", &resp);
        assert!(!result.passed);
        assert!(result.reason.contains("expected a single match"));
    }

    #[test]
    fn test_unknown_rule() {
        let resp = response("{}");
        let result = run("unknown_foo", &resp);
        assert!(!result.passed);
        assert_eq!(result.reason, "undefined assertion rule: unknown_foo");
    }

    #[test]
    fn test_malformed_never_panics() {
        let resp = response("{}");
        for raw in [
            "value_nokey",
            "time_abc",
            "jsonpath_$.a",
            "header_X",
            "text_matches_(",
            "response_size_10",
        ] {
            let result = run(raw, &resp);
            assert!(!result.passed, "{} should fail", raw);
        }
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        let resp = Response::new(200, headers, "{}".into(), Duration::ZERO).unwrap();

        assert!(run("header_Content-Type=json", &resp).passed);
        assert!(!run("header_Content-Type=xml", &resp).passed);
        assert!(run("headerValue_CONTENT-TYPE=application/json; charset=utf-8", &resp).passed);

        let result = run("headerValue_X-Missing=1", &resp);
        assert!(!result.passed);
        assert!(result.reason.contains("actual None"));
    }

    #[test]
    fn test_text_and_regex() {
        let resp = response(r#"{"code":"success-123"}"#);
        assert!(run("text_contains_success", &resp).passed);
        assert!(!run("text_contains_failure", &resp).passed);
        assert!(run(r"text_matches_success-\d+", &resp).passed);
        assert!(!run(r"text_matches_^\d+$", &resp).passed);
    }

    #[test]
    fn test_cookies() {
        let mut cookies = HashMap::new();
        cookies.insert("session".to_string(), "abc".to_string());
        let resp = response("{}").with_cookies(cookies);

        assert!(run("cookies_contain_session", &resp).passed);
        assert!(!run("cookies_contain_other", &resp).passed);
        assert!(run("cookie_value_session=abc", &resp).passed);
        assert!(!run("cookie_value_session=xyz", &resp).passed);
    }

    #[test]
    fn test_response_size_and_time() {
        let resp = response(r#"{"a":1}"#);
        assert!(run("response_size_min=1&max=100", &resp).passed);
        assert!(!run("response_size_min=10&max=100", &resp).passed);
        assert!(!run("response_size_min=0&max=3", &resp).passed);
        assert!(run("time_5", &resp).passed);
        assert!(!run("time_0", &resp).passed);
    }

    #[test]
    fn test_schema_and_structure_files() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("schema.json");
        fs::write(
            &schema_path,
            r#"{"type":"object","required":["id"],"properties":{"id":{"type":"integer"}}}"#,
        )
        .unwrap();
        let structure_path = dir.path().join("structure.json");
        fs::write(&structure_path, r#"{"id":"int"}"#).unwrap();

        let good = response(r#"{"id":1}"#);
        let bad = response(r#"{"id":"x"}"#);

        let schema = format!("schema_{}", schema_path.display());
        let structure = format!("structure_{}", structure_path.display());

        assert!(run(&schema, &good).passed);
        assert!(!run(&schema, &bad).passed);
        assert!(run(&structure, &good).passed);
        assert!(!run(&structure, &bad).passed);

        let missing = run("schema_/no/such/file.json", &good);
        assert!(!missing.passed);
        assert!(missing.reason.contains("cannot load"));
    }

    #[test]
    fn test_evaluate_all_does_not_short_circuit() {
        let resp = response(r#"{"status":"ok"}"#);
        let interpolator = Interpolator::default();
        let store = VariableStore::new();
        let directives = vec![
            "value_status=bad".to_string(),
            "contains_status".to_string(),
            "unknown_x".to_string(),
        ];

        let report = evaluate_all(&resp, &directives, AssertContext::new(&interpolator, &store));
        assert!(!report.success());
        assert_eq!(report.total(), 3);
        assert_eq!(report.passed(), 1);
        assert!(report.render().contains("---assertion 2: contains_status -> ✓ passed"));
    }

    #[test]
    fn test_same_directive_is_idempotent() {
        let resp = response(r#"{"count":5}"#);
        assert_eq!(run("jsonpath_$.count<3", &resp), run("jsonpath_$.count<3", &resp));
    }
}
