use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assertion::AssertionReport;
use crate::case::Case;
use crate::http::Response;
use crate::variable::ExtractOutcome;

/// 单个用例的执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_id: String,

    pub title: String,

    pub sheet: Option<String>,

    /// HTTP 方法或关键字标签
    pub method: String,

    /// 插值后的 URL
    pub url: String,

    /// 响应状态码（如果收到响应）
    pub status: Option<u16>,

    pub duration: Duration,

    pub success: bool,

    /// 执行层面的错误（URL、请求头、请求体、网络），区别于断言失败
    pub error: Option<String>,

    /// 断言报告（只在 200 时存在）
    pub report: Option<AssertionReport>,

    /// 变量提取结果
    pub extraction: Option<ExtractOutcome>,

    /// 可读的结果说明
    pub message: String,

    /// 未解析的变量等诊断信息
    #[serde(default)]
    pub warnings: Vec<String>,

    /// 完整的 HTTP 响应（用于详细输出）
    #[serde(skip)]
    pub response: Option<Response>,
}

impl CaseResult {
    /// 以用例信息初始化，默认失败
    pub fn for_case(case: &Case) -> Self {
        Self {
            case_id: case.case_id.to_string(),
            title: case.title.clone(),
            sheet: case.sheet.clone(),
            method: case.method.clone(),
            url: case.url.clone(),
            status: None,
            duration: Duration::ZERO,
            success: false,
            error: None,
            report: None,
            extraction: None,
            message: String::new(),
            warnings: Vec::new(),
            response: None,
        }
    }

    /// 执行层面失败
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        self.success = false;
        self.message = error.clone();
        self.error = Some(error);
        self
    }

    pub fn assertion_counts(&self) -> (usize, usize) {
        self.report
            .as_ref()
            .map(|r| (r.passed(), r.failed()))
            .unwrap_or((0, 0))
    }
}

/// 执行摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_duration: Duration,
    pub total_assertions: usize,
    pub passed_assertions: usize,
    pub failed_assertions: usize,
}

impl RunSummary {
    pub fn from_results(results: &[CaseResult]) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        let total_duration = results.iter().map(|r| r.duration).sum();

        let (passed_assertions, failed_assertions) = results
            .iter()
            .map(CaseResult::assertion_counts)
            .fold((0, 0), |(p, f), (rp, rf)| (p + rp, f + rf));

        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            total_duration,
            total_assertions: passed_assertions + failed_assertions,
            passed_assertions,
            failed_assertions,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// 合并多个文件的摘要
    pub fn merge(&mut self, other: &RunSummary) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.total_duration += other.total_duration;
        self.total_assertions += other.total_assertions;
        self.passed_assertions += other.passed_assertions;
        self.failed_assertions += other.failed_assertions;
    }
}

/// 单个用例文件的执行报告，worker 进程以 JSON 写出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub file: String,
    pub started_at: DateTime<Utc>,
    pub results: Vec<CaseResult>,
    pub summary: RunSummary,
}

impl FileReport {
    pub fn new(
        file: impl Into<String>,
        started_at: DateTime<Utc>,
        results: Vec<CaseResult>,
    ) -> Self {
        let summary = RunSummary::from_results(&results);
        Self {
            file: file.into(),
            started_at,
            results,
            summary,
        }
    }

    pub fn success(&self) -> bool {
        self.summary.all_passed()
    }
}

/// worker 进程的结束状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    /// 正常退出并写出报告
    Completed,
    /// 启动失败、异常退出或报告无法读取
    Failed(String),
    /// 超时被终止
    TimedOut,
}

/// 单个用例文件在进程池中的执行结果
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub file: PathBuf,
    pub status: WorkerStatus,
    /// 读取到的报告（超时或失败时为 None）
    pub report: Option<FileReport>,
    pub elapsed: Duration,
    pub log_file: PathBuf,
    pub report_file: PathBuf,
}

impl FileOutcome {
    /// 超时或进程失败都算失败
    pub fn success(&self) -> bool {
        self.status == WorkerStatus::Completed
            && self.report.as_ref().is_some_and(FileReport::success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::AssertionResult;
    use serde_json::json;

    fn result(success: bool, millis: u64) -> CaseResult {
        let case: Case = serde_json::from_value(json!({
            "case_id": 1, "title": "t", "method": "get", "url": "http://x"
        }))
        .unwrap();
        let mut result = CaseResult::for_case(&case);
        result.success = success;
        result.duration = Duration::from_millis(millis);
        result
    }

    #[test]
    fn test_summary_counts() {
        let mut with_report = result(false, 200);
        with_report.report = Some(AssertionReport::new(vec![
            AssertionResult::pass("a", "ok"),
            AssertionResult::fail("b", "no"),
        ]));
        let results = vec![result(true, 100), with_report];

        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_assertions, 2);
        assert_eq!(summary.failed_assertions, 1);
        assert_eq!(summary.total_duration, Duration::from_millis(300));
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_with_error() {
        let r = result(true, 0).with_error("invalid url: x");
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("invalid url: x"));
    }

    #[test]
    fn test_summary_merge() {
        let mut a = RunSummary::from_results(&[result(true, 10)]);
        let b = RunSummary::from_results(&[result(false, 10), result(true, 10)]);
        a.merge(&b);
        assert_eq!(a.total, 3);
        assert_eq!(a.failed, 1);
    }

    #[test]
    fn test_file_report_serializes() {
        let report = FileReport::new("a.yaml", Utc::now(), vec![result(true, 5)]);
        let text = serde_json::to_string(&report).unwrap();
        let back: FileReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.summary, report.summary);
        assert!(back.success());
    }
}
