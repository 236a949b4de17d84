use std::path::PathBuf;

use regex::Regex;

use crate::assertion::types::{Directive, JsonPathOp};

type PayloadParser = fn(&str) -> Directive;

/// 前缀表，按顺序匹配，第一个命中的前缀生效
///
/// `header_` 排在 `header_text_` 之前，所以 `header_text_xxx`
/// 实际按响应头断言解析。
const RULES: &[(&str, PayloadParser)] = &[
    ("contains_", parse_contains),
    ("value_", parse_value),
    ("time_", parse_time),
    ("jsonpath_", parse_json_path),
    ("schema_", parse_schema),
    ("header_", parse_header_contains),
    ("headerValue_", parse_header_equals),
    ("header_text_", parse_text_contains),
    ("text_matches_", parse_text_matches),
    ("text_contains_", parse_text_contains),
    ("cookies_contain_", parse_cookie_exists),
    ("cookie_value_", parse_cookie_equals),
    ("response_size_", parse_response_size),
    ("structure_", parse_structure),
];

/// 解析单条断言指令
///
/// 支持的格式：
/// - `contains_data.id`
/// - `value_status=ok`
/// - `jsonpath_$.data.age>18`
/// - `header_Content-Type=json`
/// - `response_size_min=10&max=2048`
pub fn parse_directive(raw: &str) -> Directive {
    RULES
        .iter()
        .find_map(|(prefix, parser)| raw.strip_prefix(prefix).map(parser))
        .unwrap_or(Directive::Unknown)
}

/// 返回命中的前缀，没有命中时为 None
pub fn matched_prefix(raw: &str) -> Option<&'static str> {
    RULES
        .iter()
        .find(|(prefix, _)| raw.starts_with(prefix))
        .map(|(prefix, _)| *prefix)
}

fn malformed(reason: impl Into<String>) -> Directive {
    Directive::Malformed {
        reason: reason.into(),
    }
}

fn parse_contains(payload: &str) -> Directive {
    if payload.is_empty() {
        return malformed("contains directive needs a key");
    }
    Directive::Contains {
        path: payload.to_string(),
    }
}

fn parse_value(payload: &str) -> Directive {
    match payload.split_once('=') {
        Some((path, expected)) => Directive::Value {
            path: path.to_string(),
            expected: expected.to_string(),
        },
        None => malformed("value directive is missing '='"),
    }
}

fn parse_time(payload: &str) -> Directive {
    match payload.trim().parse::<u64>() {
        Ok(max_secs) => Directive::ResponseTime { max_secs },
        Err(e) => malformed(format!(
            "time directive needs an integer number of seconds, got '{}': {}",
            payload, e
        )),
    }
}

fn parse_json_path(payload: &str) -> Directive {
    let has_lt = payload.contains('<');
    let has_gt = payload.contains('>');

    let (op, delimiter) = if payload.contains('=') {
        (JsonPathOp::Equal, "=")
    } else if payload.contains('&') {
        (JsonPathOp::Contains, "&")
    } else if has_gt && !has_lt {
        (JsonPathOp::Greater, ">")
    } else if has_lt && !has_gt {
        (JsonPathOp::Less, "<")
    } else if payload.contains("<>") {
        (JsonPathOp::NotEqual, "<>")
    } else {
        return malformed(format!(
            "jsonpath directive is missing an expected value: {}",
            payload
        ));
    };

    match payload.split_once(delimiter) {
        Some((path, expected)) => Directive::JsonPath {
            path: path.to_string(),
            op,
            expected: expected.to_string(),
        },
        None => malformed(format!(
            "jsonpath directive is missing an expected value: {}",
            payload
        )),
    }
}

fn parse_schema(payload: &str) -> Directive {
    if payload.is_empty() {
        return malformed("schema directive needs a file name");
    }
    Directive::Schema {
        file: PathBuf::from(payload),
    }
}

fn parse_header_contains(payload: &str) -> Directive {
    match payload.split_once('=') {
        Some((name, expected)) => Directive::HeaderContains {
            name: name.to_string(),
            expected: expected.to_string(),
        },
        None => malformed("header directive is missing '='"),
    }
}

fn parse_header_equals(payload: &str) -> Directive {
    match payload.split_once('=') {
        Some((name, expected)) => Directive::HeaderEquals {
            name: name.to_string(),
            expected: expected.to_string(),
        },
        None => malformed("headerValue directive is missing '='"),
    }
}

fn parse_text_contains(payload: &str) -> Directive {
    Directive::TextContains {
        text: payload.to_string(),
    }
}

fn parse_text_matches(payload: &str) -> Directive {
    match Regex::new(payload) {
        Ok(_) => Directive::TextMatches {
            pattern: payload.to_string(),
        },
        Err(e) => malformed(format!("invalid regex '{}': {}", payload, e)),
    }
}

fn parse_cookie_exists(payload: &str) -> Directive {
    Directive::CookieExists {
        name: payload.to_string(),
    }
}

fn parse_cookie_equals(payload: &str) -> Directive {
    match payload.split_once('=') {
        Some((name, expected)) => Directive::CookieEquals {
            name: name.to_string(),
            expected: expected.to_string(),
        },
        None => malformed("cookie_value directive is missing '='"),
    }
}

fn parse_response_size(payload: &str) -> Directive {
    let Some((min_part, max_part)) = payload.split_once('&') else {
        return malformed("response_size directive needs 'min=X&max=Y'");
    };

    let bound = |part: &str, name: &str| -> Result<usize, String> {
        let (_, value) = part
            .split_once('=')
            .ok_or_else(|| format!("response_size bound '{}' is missing '='", name))?;
        value
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("response_size bound '{}' is not an integer: {}", name, e))
    };

    match (bound(min_part, "min"), bound(max_part, "max")) {
        (Ok(min), Ok(max)) => Directive::ResponseSize { min, max },
        (Err(reason), _) | (_, Err(reason)) => malformed(reason),
    }
}

fn parse_structure(payload: &str) -> Directive {
    if payload.is_empty() {
        return malformed("structure directive needs a file name");
    }
    Directive::Structure {
        file: PathBuf::from(payload),
    }
}
