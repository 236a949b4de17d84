use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

use crate::runner::types::{CaseResult, FileOutcome, RunSummary, WorkerStatus};
use crate::utils::{ResponseFormat, ResponseFormatter};

pub struct CaseReporter {
    verbose: bool,
    formatter: ResponseFormatter,
}

impl CaseReporter {
    pub fn new(verbose: bool) -> Self {
        let format = if verbose {
            ResponseFormat::Verbose
        } else {
            ResponseFormat::Compact
        };

        Self {
            verbose,
            formatter: ResponseFormatter::new(format),
        }
    }

    /// 打印文件开始
    pub fn print_header(&self, file_path: &str, total: usize) {
        println!("\nRunning {} cases from {}...\n", total, file_path.bold());
    }

    /// 打印单个用例结果
    pub fn print_result(&self, result: &CaseResult) {
        let symbol = if result.success {
            "✓".green()
        } else {
            "✗".red()
        };
        let sheet = result
            .sheet
            .as_deref()
            .map(|s| format!("[{}] ", s))
            .unwrap_or_default();
        let status = result
            .status
            .map(|s| format!(" {}", s))
            .unwrap_or_default();

        println!(
            " {} {}{} - {} {} {}{} ({}ms)",
            symbol,
            sheet.dimmed(),
            result.case_id,
            result.title,
            result.method.cyan(),
            result.url,
            status,
            result.duration.as_millis()
        );

        for warning in &result.warnings {
            println!("   {}: {}", "Warning".yellow(), warning);
        }

        if let Some(error) = &result.error {
            println!("   {}: {}", "Error".red().bold(), error);
            return;
        }

        if let Some(report) = &result.report {
            println!("   {}", report.summary());
            for (i, assertion) in report.results.iter().enumerate() {
                if assertion.passed {
                    println!("     {} {}. {}", "✓".green(), i + 1, assertion.raw);
                    if self.verbose {
                        println!("       {}", assertion.reason.dimmed());
                    }
                } else {
                    println!("     {} {}. {}", "✗".red(), i + 1, assertion.raw);
                    println!("       {}", assertion.reason.red());
                }
            }
        } else if self.verbose || !result.success {
            println!("   {}", result.message);
        }

        if let Some(extraction) = &result.extraction {
            let label = if extraction.success {
                "Extracted".green()
            } else {
                "Extraction failed".yellow()
            };
            println!("   {}: {}", label, extraction.message);
        }

        if self.verbose || !result.success {
            if let Some(response) = &result.response {
                for line in self.formatter.format(response).lines() {
                    println!("   {}", line);
                }
                println!();
            }
        }
    }

    /// 打印执行摘要
    pub fn print_summary(&self, summary: &RunSummary) {
        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        if summary.failed == 0 {
            println!(
                "  {}: {} passed, {} total",
                "Cases".bold(),
                summary.passed.to_string().green(),
                summary.total
            );
        } else {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Cases".bold(),
                summary.passed.to_string().green(),
                summary.failed.to_string().red(),
                summary.total
            );
        }

        if summary.total_assertions > 0 {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Assertions".bold(),
                summary.passed_assertions.to_string().green(),
                summary.failed_assertions.to_string().red(),
                summary.total_assertions
            );
        }

        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            summary.total_duration.as_secs_f64()
        );
        println!();
    }

    /// 进程池执行后按文件打印表格
    pub fn print_file_table(&self, outcomes: &[FileOutcome]) {
        println!("{}", file_table(outcomes));
    }
}

impl Default for CaseReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

/// 构造文件汇总表
pub fn file_table(outcomes: &[FileOutcome]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "File", "Status", "Cases", "Passed", "Failed", "Duration", "Log",
    ]);

    for outcome in outcomes {
        let (status, color) = match &outcome.status {
            WorkerStatus::Completed if outcome.success() => ("passed".to_string(), Color::Green),
            WorkerStatus::Completed => ("failed".to_string(), Color::Red),
            WorkerStatus::TimedOut => ("timed out".to_string(), Color::Red),
            WorkerStatus::Failed(reason) => (format!("error: {}", reason), Color::Red),
        };
        let summary = outcome.report.as_ref().map(|r| &r.summary);
        let count = |f: fn(&RunSummary) -> usize| {
            summary
                .map(|s| f(s).to_string())
                .unwrap_or_else(|| "-".to_string())
        };

        table.add_row(vec![
            Cell::new(outcome.file.display()),
            Cell::new(status).fg(color),
            Cell::new(count(|s| s.total)),
            Cell::new(count(|s| s.passed)),
            Cell::new(count(|s| s.failed)),
            Cell::new(format!("{:.2}s", outcome.elapsed.as_secs_f64())),
            Cell::new(outcome.log_file.display()).add_attribute(Attribute::Dim),
        ]);
    }

    table
}
