use std::fmt;
use std::str::FromStr;

use crate::{Result, RucaseError};
use serde::{Deserialize, Serialize};

/// 用例里可以出现的 HTTP 方法
///
/// 不在这里的 method 列值一律按关键字步骤处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl FromStr for Method {
    type Err = RucaseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            _ => Err(RucaseError::ParseError(format!("not an HTTP method: {}", s))),
        }
    }
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }

    /// 请求体按 JSON 发送；GET 把 body 拼接到查询串
    pub fn sends_json_body(&self) -> bool {
        !matches!(self, Method::Get)
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 响应状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(u16);

impl Status {
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Self(code))
        } else {
            Err(RucaseError::ParseError(format!(
                "status code out of range: {}",
                code
            )))
        }
    }

    pub fn code(&self) -> u16 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// 控制台输出用的短语，和状态分类表覆盖同一批状态码
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!(" Get ".parse::<Method>().unwrap(), Method::Get);
        assert!("设置变量".parse::<Method>().is_err());
        assert!("HEAD".parse::<Method>().is_err());
    }

    #[test]
    fn test_json_body_methods() {
        assert!(Method::Post.sends_json_body());
        assert!(Method::Put.sends_json_body());
        assert!(Method::Delete.sends_json_body());
        assert!(Method::Patch.sends_json_body());
        assert!(!Method::Get.sends_json_body());
    }

    #[test]
    fn test_status_range() {
        assert!(Status::new(99).is_err());
        assert!(Status::new(600).is_err());

        let status = Status::new(404).unwrap();
        assert!(status.is_client_error());
        assert_eq!(status.reason_phrase(), "Not Found");
        assert_eq!(Status::new(418).unwrap().reason_phrase(), "");
    }
}
