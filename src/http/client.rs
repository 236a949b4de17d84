use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::Result;
use crate::http::request::{Request, RequestBody};
use crate::http::response::Response;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// 测试环境常见自签名证书，因此不校验证书
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            inner: reqwest::Client::builder()
                .timeout(timeout)
                .danger_accept_invalid_certs(true)
                .build()?,
        })
    }

    pub async fn execute(&self, request: Request) -> Result<Response> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut req = self
            .inner
            .request(request.method.to_reqwest(), request.url)
            .headers(request.headers);

        req = match request.body {
            RequestBody::Empty => req,
            RequestBody::Json(json) => req.json(&json),
            RequestBody::File(path) => {
                let bytes = tokio::fs::read(&path).await?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "file".to_string());
                req.multipart(Form::new().part("file", Part::bytes(bytes).file_name(file_name)))
            }
        };

        let start = Instant::now();
        let response = req.send().await?;
        let duration = start.elapsed();

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let cookies: HashMap<String, String> = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let bytes = response.bytes().await?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(Response::new(status, headers, body, duration)?
            .with_size(bytes.len())
            .with_cookies(cookies))
    }
}
