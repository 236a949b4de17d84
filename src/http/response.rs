use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::HeaderMap as Headers;

use crate::Result;
use crate::http::types::Status;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub headers: Headers,
    pub body: String,
    /// 原始响应体字节数
    pub size: usize,
    pub cookies: HashMap<String, String>,
    pub duration: Duration,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: String, duration: Duration) -> Result<Self> {
        Ok(Self {
            status: Status::new(status)?,
            headers,
            size: body.len(),
            body,
            cookies: HashMap::new(),
            duration,
        })
    }

    pub fn with_cookies(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    /// 按名称查找响应头（大小写不敏感）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|s| s.as_str())
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}
