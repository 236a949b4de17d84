use std::fmt;

/// 按状态码分类的响应处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Ok,
    Created,
    NoContent,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalServerError,
    BadGateway,
    ServiceUnavailable,
    Other(u16),
}

/// 非 200 状态码的固定判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub message: &'static str,
    /// 失败消息是否附带原始响应体
    pub include_body: bool,
}

impl StatusClass {
    pub fn classify(code: u16) -> Self {
        match code {
            200 => Self::Ok,
            201 => Self::Created,
            204 => Self::NoContent,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500 => Self::InternalServerError,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            other => Self::Other(other),
        }
    }

    /// 固定判定表，200 返回 None
    pub fn verdict(&self) -> Option<Verdict> {
        let (passed, message, include_body) = match self {
            Self::Ok => return None,
            Self::Created => (true, "resource created", false),
            Self::NoContent => (true, "no content", false),
            Self::BadRequest => (false, "bad request parameters", true),
            Self::Unauthorized => (false, "unauthorized", true),
            Self::Forbidden => (false, "forbidden", true),
            Self::NotFound => (false, "endpoint not found", false),
            Self::InternalServerError => (false, "internal server error", true),
            Self::BadGateway => (false, "bad gateway", true),
            Self::ServiceUnavailable => (false, "service unavailable", true),
            Self::Other(_) => (false, "unhandled status code", true),
        };
        Some(Verdict {
            passed,
            message,
            include_body,
        })
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::NoContent => 204,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
            Self::BadGateway => 502,
            Self::ServiceUnavailable => 503,
            Self::Other(code) => *code,
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
