use colored::*;

use crate::http::Response;

/// 响应体超过这个长度时，紧凑模式只显示字节数
const COMPACT_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Compact,
    Verbose,
}

/// 响应打印器，失败用例与 `-v` 模式下使用
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    format: ResponseFormat,
    color: bool,
}

impl ResponseFormatter {
    pub fn new(format: ResponseFormat) -> Self {
        Self {
            format,
            color: true,
        }
    }

    /// 写日志文件时关闭颜色
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn format(&self, response: &Response) -> String {
        let timing = format!(
            "Time: {}ms  Size: {} bytes",
            response.duration.as_millis(),
            response.size
        );
        let mut output = vec![self.status_line(response), self.paint(timing, |s| s.cyan())];

        match self.format {
            ResponseFormat::Compact => {
                let body = response.text();
                if !body.is_empty() && body.len() < COMPACT_BODY_LIMIT {
                    output.push(pretty_json(body).unwrap_or_else(|| body.to_string()));
                } else if !body.is_empty() {
                    output.push(format!("Body: {} bytes", body.len()));
                }
            }
            ResponseFormat::Verbose => {
                output.push(String::new());
                output.push(self.paint("Headers:".to_string(), |s| s.blue().bold()));
                for (key, value) in response.headers.iter() {
                    let value = value.to_str().unwrap_or("<invalid utf-8>");
                    output.push(format!("   {}: {}", key, value));
                }

                if !response.cookies.is_empty() {
                    output.push(self.paint("Cookies:".to_string(), |s| s.blue().bold()));
                    let mut cookies: Vec<_> = response.cookies.iter().collect();
                    cookies.sort();
                    for (name, value) in cookies {
                        output.push(format!("   {}={}", name, value));
                    }
                }

                let body = response.text();
                if !body.is_empty() {
                    output.push(String::new());
                    output.push(self.paint("Body:".to_string(), |s| s.blue().bold()));
                    output.push(pretty_json(body).unwrap_or_else(|| body.to_string()));
                }
            }
        }

        output.join("\n")
    }

    fn status_line(&self, response: &Response) -> String {
        let line = format!(
            "HTTP {} {}",
            response.status.code(),
            response.status.reason_phrase()
        );
        if !self.color {
            return line;
        }
        let colored = if response.is_success() {
            line.green()
        } else if response.is_client_error() {
            line.yellow()
        } else {
            line.red()
        };
        colored.bold().to_string()
    }

    fn paint(&self, text: String, style: impl Fn(&str) -> ColoredString) -> String {
        if self.color {
            style(&text).to_string()
        } else {
            text
        }
    }
}

/// 合法 JSON 时美化输出
fn pretty_json(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    serde_json::to_string_pretty(&value).ok()
}
