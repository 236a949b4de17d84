use std::time::Duration;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::assertion::json::lookup_dot_path;
use crate::case::Case;
use crate::keyword::registry::Keyword;
use crate::variable::{Interpolator, VariableStore, first_value_by_key, placeholder_name};

/// 关键字步骤执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordOutcome {
    pub success: bool,
    pub message: String,
}

impl KeywordOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 关键字执行所需的上下文
pub struct KeywordContext<'a> {
    pub interpolator: &'a Interpolator,
    pub store: &'a mut VariableStore,
    /// 当前执行的用例文件名
    pub case_file: Option<&'a str>,
}

/// 执行一个关键字步骤
pub async fn run_keyword(
    keyword: Keyword,
    case: &Case,
    ctx: &mut KeywordContext<'_>,
) -> KeywordOutcome {
    debug!(case_id = %case.case_id, keyword = %keyword, "running keyword");

    let outcome = match keyword {
        Keyword::ForceWait => return force_wait(case).await,
        Keyword::SetVariable => set_variable(case, ctx),
        Keyword::GetJsonValue => get_json_value(case, ctx),
        Keyword::Replace => replace(case, ctx),
        Keyword::RandomString => random_string(case, ctx),
        Keyword::FetchAllIds => fetch_all_ids(case, ctx),
        Keyword::CurrentCaseFile => current_case_file(case, ctx),
    };

    outcome.unwrap_or_else(KeywordOutcome::failed)
}

type StepResult = std::result::Result<KeywordOutcome, String>;

fn required<'c>(value: &'c Option<String>, field: &str) -> std::result::Result<&'c str, String> {
    value
        .as_deref()
        .ok_or_else(|| format!("missing parameter '{}'", field))
}

/// 结果变量名，允许写成 `${name}`
fn result_var(case: &Case) -> std::result::Result<String, String> {
    required(&case.result, "result").map(|r| placeholder_name(r.trim()).to_string())
}

fn store_result(ctx: &mut KeywordContext<'_>, var: String, value: String) -> KeywordOutcome {
    let message = format!("stored [{}] ==> [${{{}}}]", value, var);
    ctx.store.set(var, value);
    KeywordOutcome::ok(message)
}

fn set_variable(case: &Case, ctx: &mut KeywordContext<'_>) -> StepResult {
    let var = result_var(case)?;
    let value = ctx
        .interpolator
        .render(required(&case.param_1, "param_1")?, ctx.store);
    Ok(store_result(ctx, var, value))
}

fn get_json_value(case: &Case, ctx: &mut KeywordContext<'_>) -> StepResult {
    let var = result_var(case)?;
    let json_text = ctx
        .interpolator
        .render(required(&case.param_1, "param_1")?, ctx.store);
    let key = ctx
        .interpolator
        .render(required(&case.param_2, "param_2")?, ctx.store);

    let value = first_value_by_key(&json_text, &key).map_err(|e| e.to_string())?;
    Ok(store_result(ctx, var, value))
}

fn replace(case: &Case, ctx: &mut KeywordContext<'_>) -> StepResult {
    let var = result_var(case)?;
    let data = ctx
        .interpolator
        .render(required(&case.param_1, "param_1")?, ctx.store);
    let old = required(&case.param_2, "param_2")?;
    let new = case.param_3.as_deref().unwrap_or_default();
    Ok(store_result(ctx, var, data.replace(old, new)))
}

fn random_string(case: &Case, ctx: &mut KeywordContext<'_>) -> StepResult {
    let var = result_var(case)?;
    let charset: Vec<char> = required(&case.param_1, "param_1")?.chars().collect();
    let length: usize = required(&case.param_2, "param_2")?
        .trim()
        .parse()
        .map_err(|e| format!("random string length must be an integer: {}", e))?;

    if charset.is_empty() {
        return Err("random string charset is empty".to_string());
    }

    let mut rng = rand::rng();
    let value: String = (0..length)
        .filter_map(|_| charset.choose(&mut rng).copied())
        .collect();
    Ok(store_result(ctx, var, value))
}

fn fetch_all_ids(case: &Case, ctx: &mut KeywordContext<'_>) -> StepResult {
    let var = result_var(case)?;
    let json_text = ctx
        .interpolator
        .render(required(&case.param_1, "param_1")?, ctx.store);
    let field = case
        .param_3
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .unwrap_or("id");

    let data: Value =
        serde_json::from_str(&json_text).map_err(|e| format!("invalid JSON: {}", e))?;
    let list = match case.param_2.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(path) => lookup_dot_path(&data, path).map_err(|e| e.to_string())?,
        None => &data,
    };
    let Value::Array(items) = list else {
        return Err(format!("expected a list, got {}", list));
    };

    let ids: Vec<Value> = items
        .iter()
        .filter_map(|item| item.get(field).cloned())
        .collect();
    let value = Value::Array(ids).to_string();
    Ok(store_result(ctx, var, value))
}

fn current_case_file(case: &Case, ctx: &mut KeywordContext<'_>) -> StepResult {
    let var = result_var(case)?;
    let name = ctx
        .case_file
        .ok_or_else(|| "current case file name is not set".to_string())?
        .to_string();
    Ok(store_result(ctx, var, name))
}

async fn force_wait(case: &Case) -> KeywordOutcome {
    let seconds = match case
        .param_1
        .as_deref()
        .map(|s| s.trim().parse::<f64>())
    {
        Some(Ok(s)) if s.is_finite() && s >= 0.0 => s,
        Some(_) => return KeywordOutcome::failed("wait seconds must be a non-negative number"),
        None => return KeywordOutcome::failed("missing parameter 'param_1'"),
    };

    info!(seconds, "force wait");
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    KeywordOutcome::ok(format!("waited [{}] seconds", seconds))
}
