use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap as Headers, HeaderName, HeaderValue};

use crate::http::types::Method;
use crate::{Result, RucaseError};

static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(http|https)://").expect("scheme pattern is valid"));

/// 请求体
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// 以 multipart 的 `file` 字段上传
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: url::Url,
    pub headers: Headers,
    pub body: RequestBody,
}

impl Request {
    /// URL 中必须带有 http(s) 协议头
    pub fn new(method: Method, url: &str) -> Result<Self> {
        if !SCHEME.is_match(url) {
            return Err(RucaseError::InvalidUrl(url.to_string()));
        }
        Ok(Self {
            method,
            url: url::Url::parse(url.trim())?,
            headers: Headers::new(),
            body: RequestBody::Empty,
        })
    }

    fn insert_header(&mut self, key: &str, value: &str) -> Result<()> {
        let name: HeaderName = key
            .parse()
            .map_err(|_| RucaseError::ParseError(format!("invalid header name: {}", key)))?;
        let value: HeaderValue = value
            .parse()
            .map_err(|_| RucaseError::ParseError(format!("invalid header value for {}", key)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self> {
        self.insert_header(key, value)?;
        Ok(self)
    }

    pub fn with_headers(mut self, headers: &[(String, String)]) -> Result<Self> {
        for (key, value) in headers {
            self.insert_header(key, value)?;
        }
        Ok(self)
    }

    pub fn with_json(mut self, data: serde_json::Value) -> Self {
        self.body = RequestBody::Json(data);
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.body = RequestBody::File(path.into());
        self
    }
}
