use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::assertion::{AssertContext, evaluate_all};
use crate::case::{Case, StepKind, load_cases};
use crate::http::{Client, Method, Request, Response};
use crate::keyword::{KeywordContext, KeywordRegistry, run_keyword};
use crate::runner::status::StatusClass;
use crate::runner::types::{CaseResult, FileReport};
use crate::variable::{Interpolator, SystemConfig, VariableStore, extract};
use crate::{Result, RucaseError};

/// 顺序执行用例，变量池在用例之间共享
pub struct CaseRunner {
    client: Client,
    interpolator: Interpolator,
    keywords: KeywordRegistry,
    store: VariableStore,
}

impl CaseRunner {
    pub fn new(client: Client, interpolator: Interpolator, keywords: KeywordRegistry) -> Self {
        Self {
            client,
            interpolator,
            keywords,
            store: VariableStore::new(),
        }
    }

    /// 根据配置创建：请求超时、当前环境的系统变量、关键字表
    pub fn from_config(config: &SystemConfig, env_name: Option<&str>) -> Result<Self> {
        let client = Client::with_timeout(config.runner.request_timeout())?;
        let interpolator = Interpolator::new(config, env_name);
        let keywords = KeywordRegistry::from_config(config)?;
        Ok(Self::new(client, interpolator, keywords))
    }

    /// 预置变量（命令行 `--var`）
    pub fn with_variables<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.store.extend(vars);
        self
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    /// 加载并执行一个用例文件
    pub async fn run_file(&mut self, path: &Path) -> Result<FileReport> {
        let started_at = Utc::now();
        let cases = load_cases(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!(file = %path.display(), cases = cases.len(), "running case file");
        let results = self.run_cases(&cases, Some(&file_name)).await;
        Ok(FileReport::new(path.display().to_string(), started_at, results))
    }

    /// 依次执行，单个用例失败不影响后续用例
    pub async fn run_cases(&mut self, cases: &[Case], case_file: Option<&str>) -> Vec<CaseResult> {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            results.push(self.run_case(case, case_file).await);
        }
        results
    }

    pub async fn run_case(&mut self, case: &Case, case_file: Option<&str>) -> CaseResult {
        let start = Instant::now();
        let mut result = match case.step_kind() {
            StepKind::Http(method) => self.run_http(case, method).await,
            StepKind::Keyword => self.run_keyword_step(case, case_file).await,
        };
        if result.response.is_none() {
            result.duration = start.elapsed();
        }

        if result.success {
            info!(case_id = %result.case_id, title = %result.title, "case passed");
        } else {
            warn!(
                case_id = %result.case_id,
                title = %result.title,
                reason = %result.message,
                "case failed"
            );
        }
        result
    }

    async fn run_keyword_step(&mut self, case: &Case, case_file: Option<&str>) -> CaseResult {
        let mut result = CaseResult::for_case(case);
        let Some(keyword) = self.keywords.resolve(&case.method) else {
            return result.with_error(format!("keyword not configured: {}", case.method));
        };

        let mut ctx = KeywordContext {
            interpolator: &self.interpolator,
            store: &mut self.store,
            case_file,
        };
        let outcome = run_keyword(keyword, case, &mut ctx).await;
        result.success = outcome.success;
        result.message = outcome.message;
        result
    }

    async fn run_http(&mut self, case: &Case, method: Method) -> CaseResult {
        let mut result = CaseResult::for_case(case);

        let request = match self.build_request(case, method, &mut result) {
            Ok(request) => request,
            Err(e) => return result.with_error(e),
        };

        debug!(case_id = %result.case_id, method = %method, url = %result.url, "dispatching case");
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => return result.with_error(format!("request failed: {}", e)),
        };

        result.status = Some(response.status.code());
        result.duration = response.duration;
        self.classify(case, response, result)
    }

    /// 插值 URL、请求头、请求体并构造请求，失败时返回可读原因
    fn build_request(
        &self,
        case: &Case,
        method: Method,
        result: &mut CaseResult,
    ) -> std::result::Result<Request, String> {
        let mut url = self.render(&case.url, result);
        result.url = url.clone();

        let headers = match case.headers.as_deref() {
            Some(template) => parse_headers(&self.render(template, result)).map_err(reason)?,
            None => Vec::new(),
        };

        let data = case
            .data
            .as_deref()
            .map(|template| self.render(template, result))
            .filter(|data| !data.trim().is_empty());

        let mut json_body = None;
        if let Some(data) = data {
            if method.sends_json_body() {
                json_body = Some(decode_json_body(&data).map_err(reason)?);
            } else {
                url = append_query(&url, &data);
                result.url = url.clone();
            }
        }

        let mut request = Request::new(method, &url)
            .map_err(|e| match e {
                RucaseError::InvalidUrl(_) => format!("invalid url: {}", url),
                other => format!("invalid url: {} ({})", url, other),
            })?
            .with_headers(&headers)
            .map_err(reason)?;

        if let Some(path) = case.upload_path() {
            request = request.with_file(path);
        } else if let Some(body) = json_body {
            request = request.with_json(body);
        }
        Ok(request)
    }

    /// 插值并记录未解析的变量
    fn render(&self, template: &str, result: &mut CaseResult) -> String {
        let interpolated = self.interpolator.interpolate(template, &self.store);
        if let Some(name) = interpolated.unresolved {
            result
                .warnings
                .push(format!("unresolved variable ${{{}}}", name));
        }
        interpolated.text
    }

    /// 按状态码处理响应，只有 200 执行断言与变量提取
    fn classify(&mut self, case: &Case, response: Response, mut result: CaseResult) -> CaseResult {
        let class = StatusClass::classify(response.status.code());

        if let Some(verdict) = class.verdict() {
            result.success = verdict.passed;
            result.message = if !verdict.passed && verdict.include_body {
                format!("status {}: {}\n{}", class, verdict.message, response.text())
            } else {
                format!("status {}: {}", class, verdict.message)
            };
            result.response = Some(response);
            return result;
        }

        self.store.set("response", response.clone());

        if let Some(cell) = &case.invalid_assertions {
            result.success = false;
            result.message = format!("malformed assertions: {}", cell);
        } else if case.assertions.is_empty() {
            result.success = true;
            result.message = format!(
                "case [{}] {} executed, no assertions",
                case.case_id, case.title
            );
        } else {
            let ctx = AssertContext::new(&self.interpolator, &self.store);
            let report = evaluate_all(&response, &case.assertions, ctx);
            result.success = report.success();
            result.message = report.render();
            result.report = Some(report);
        }

        if let Some(directive) = case.extraction() {
            let outcome = extract(&response, directive, &mut self.store);
            if !outcome.success {
                result.warnings.push(outcome.message.clone());
            }
            result.extraction = Some(outcome);
        }

        result.response = Some(response);
        result
    }
}

/// 取出错误里的说明文字
fn reason(error: RucaseError) -> String {
    match error {
        RucaseError::ParseError(message) | RucaseError::InvalidUrl(message) => message,
        other => other.to_string(),
    }
}

/// 解析请求头模板：每行 `Name: value`，按第一个冒号切分
///
/// 行分隔符可以是真实换行，也可以是插值后留下的两个字符 `\n`。
pub fn parse_headers(text: &str) -> Result<Vec<(String, String)>> {
    text.split('\n')
        .flat_map(|line| line.split("\\n"))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| RucaseError::ParseError(format!("malformed headers: '{}'", line)))
        })
        .collect()
}

/// 解码 JSON 请求体
///
/// 插值会把换行写成两个字符 `\n`；字符串外的这类序列先还原成换行再解析一次。
pub fn decode_json_body(text: &str) -> Result<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(first) => serde_json::from_str(&restore_structural_newlines(text)).map_err(|_| {
            RucaseError::ParseError(format!("invalid JSON body: {}", first))
        }),
    }
}

fn restore_structural_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_string = !in_string;
                out.push(c);
            }
            '\\' if in_string => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\\' if chars.peek() == Some(&'n') => {
                chars.next();
                out.push('\n');
            }
            c => out.push(c),
        }
    }
    out
}

/// GET 请求把 body 直接拼到查询串
pub fn append_query(url: &str, data: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, data)
}
