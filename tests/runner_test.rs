use std::fs;

use rucase::case::Case;
use rucase::http::Client;
use rucase::keyword::KeywordRegistry;
use rucase::runner::CaseRunner;
use rucase::variable::{Interpolator, SystemConfig};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runner() -> CaseRunner {
    CaseRunner::new(
        Client::new().unwrap(),
        Interpolator::default(),
        KeywordRegistry::builtin(),
    )
}

fn case(value: serde_json::Value) -> Case {
    serde_json::from_value(value).unwrap()
}

/// 404 直接判定失败，不执行断言
#[tokio::test]
async fn test_not_found_fails_without_assertions() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no route here"))
        .mount(&mock_server)
        .await;

    let case = case(json!({
        "case_id": 1,
        "title": "missing endpoint",
        "method": "GET",
        "url": format!("{}/api/missing", mock_server.uri()),
        "assertions": ["contains_id"]
    }));

    let result = runner().run_case(&case, None).await;
    assert!(!result.success);
    assert_eq!(result.status, Some(404));
    assert!(result.report.is_none());
    assert!(result.message.contains("endpoint not found"));
    assert!(!result.message.contains("no route here"));
}

#[tokio::test]
async fn test_server_error_includes_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("stack trace"))
        .mount(&mock_server)
        .await;

    let case = case(json!({
        "case_id": 2, "title": "boom", "method": "GET",
        "url": format!("{}/boom", mock_server.uri())
    }));

    let result = runner().run_case(&case, None).await;
    assert!(!result.success);
    assert!(result.message.contains("internal server error"));
    assert!(result.message.contains("stack trace"));
}

#[tokio::test]
async fn test_created_passes_on_status_alone() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let case = case(json!({
        "case_id": 3, "title": "create", "method": "POST",
        "url": format!("{}/items", mock_server.uri()),
        "data": {"name": "x"},
        "assertions": ["contains_never_checked"]
    }));

    let result = runner().run_case(&case, None).await;
    assert!(result.success, "{}", result.message);
    assert!(result.message.contains("resource created"));
    assert!(result.report.is_none());
}

/// 提取的变量被后续用例的请求头引用
#[tokio::test]
async fn test_extraction_feeds_later_case() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({"user": "alice", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"token": "abc123"}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/profile"))
        .and(header("Authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "alice"})))
        .mount(&mock_server)
        .await;

    let cases = vec![
        case(json!({
            "case_id": 1,
            "title": "login",
            "method": "POST",
            "url": format!("{}/api/login", mock_server.uri()),
            "headers": "Content-Type: application/json",
            "data": r#"{"user": "alice", "password": "secret"}"#,
            "assertions": ["contains_data.token"],
            "other": "obj|x:token"
        })),
        case(json!({
            "case_id": 2,
            "title": "profile",
            "method": "GET",
            "url": format!("{}/api/profile", mock_server.uri()),
            "headers": "Authorization: Bearer ${x}",
            "assertions": ["value_name=alice"]
        })),
    ];

    let mut runner = runner();
    let results = runner.run_cases(&cases, None).await;

    assert!(results[0].success, "{}", results[0].message);
    let extraction = results[0].extraction.as_ref().unwrap();
    assert!(extraction.success, "{}", extraction.message);
    assert_eq!(runner.store().get_text("x"), Some("abc123"));

    assert!(results[1].success, "{}", results[1].message);
    assert!(results[1].warnings.is_empty());
}

#[tokio::test]
async fn test_failed_extraction_does_not_fail_case() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&mock_server)
        .await;

    let case = case(json!({
        "case_id": 1, "title": "t", "method": "GET",
        "url": mock_server.uri(),
        "other": "obj|x:token"
    }));

    let mut runner = runner();
    let result = runner.run_case(&case, None).await;
    assert!(result.success);
    assert!(!result.extraction.as_ref().unwrap().success);
    assert!(!runner.store().contains("x"));
    assert!(runner.store().contains("response"));
}

#[tokio::test]
async fn test_invalid_json_body_fails_before_sending() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let case = case(json!({
        "case_id": 1, "title": "bad body", "method": "POST",
        "url": format!("{}/items", mock_server.uri()),
        "data": "{not json"
    }));

    let result = runner().run_case(&case, None).await;
    assert!(!result.success);
    assert!(result.status.is_none());
    assert!(result.error.as_deref().unwrap().contains("invalid JSON body"));
}

#[tokio::test]
async fn test_get_body_appended_as_query() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": 3})))
        .mount(&mock_server)
        .await;

    let case = case(json!({
        "case_id": 1, "title": "search", "method": "GET",
        "url": format!("{}/search?q=rust", mock_server.uri()),
        "data": "page=2",
        "assertions": ["jsonpath_$.hits>0"]
    }));

    let result = runner().run_case(&case, None).await;
    assert!(result.success, "{}", result.message);
    assert!(result.url.ends_with("/search?q=rust&page=2"));
}

#[tokio::test]
async fn test_keyword_step_sets_variable_for_url() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .mount(&mock_server)
        .await;

    let cases = vec![
        case(json!({
            "case_id": 1, "title": "pick user", "method": "set_variable",
            "result": "uid", "param_1": "7"
        })),
        case(json!({
            "case_id": 2, "title": "get user", "method": "GET",
            "url": format!("{}/users/${{uid}}", mock_server.uri()),
            "assertions": ["jsonpath_$.id=7"]
        })),
        case(json!({
            "case_id": 3, "title": "not configured", "method": "发送邮件"
        })),
    ];

    let results = runner().run_cases(&cases, None).await;
    assert!(results[0].success, "{}", results[0].message);
    assert!(results[1].success, "{}", results[1].message);
    assert!(!results[2].success);
    assert!(
        results[2]
            .error
            .as_deref()
            .unwrap()
            .contains("keyword not configured")
    );
}

#[tokio::test]
async fn test_unresolved_variable_reported_as_warning() {
    let case = case(json!({
        "case_id": 1, "title": "no base", "method": "GET",
        "url": "${base_url}/health"
    }));

    let result = runner().run_case(&case, None).await;
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("invalid url"));
    assert_eq!(result.warnings, vec!["unresolved variable ${base_url}"]);
}

#[tokio::test]
async fn test_connection_failure_is_execution_error() {
    let case = case(json!({
        "case_id": 1, "title": "closed port", "method": "GET",
        "url": "http://127.0.0.1:9/unreachable"
    }));

    let result = runner().run_case(&case, None).await;
    assert!(!result.success);
    assert!(result.status.is_none());
    assert!(result.report.is_none());
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_cookies_are_assertable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=xyz; Path=/")
                .set_body_json(json!({"ok": true})),
        )
        .mount(&mock_server)
        .await;

    let case = case(json!({
        "case_id": 1, "title": "cookie", "method": "GET",
        "url": mock_server.uri(),
        "assertions": ["cookies_contain_session", "cookie_value_session=xyz"]
    }));

    let result = runner().run_case(&case, None).await;
    assert!(result.success, "{}", result.message);
}

/// 系统配置里的环境变量优先于变量池
#[tokio::test]
async fn test_run_file_with_environment_config() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&mock_server)
        .await;

    let config: SystemConfig = toml::from_str(&format!(
        r#"
environment = "dev"

[environments.dev]
base_url = "{}"

[keywords]
"设置变量" = "set_variable"
"#,
        mock_server.uri()
    ))
    .unwrap();

    let temp_dir = TempDir::new().unwrap();
    let case_file = temp_dir.path().join("smoke.yaml");
    fs::write(
        &case_file,
        r#"
sheets:
  - name: smoke
    cases:
      - case_id: 1
        title: remember status
        method: 设置变量
        result: expected
        param_1: ok
      - case_id: 2
        title: status
        method: GET
        url: ${base_url}/api/status
        assertions:
          - value_status=${expected}
          - time_5
"#,
    )
    .unwrap();

    let mut runner = CaseRunner::from_config(&config, Some("dev")).unwrap();
    let report = runner.run_file(&case_file).await.unwrap();

    assert_eq!(report.results.len(), 2);
    assert!(report.success(), "{:?}", report.results);
    assert_eq!(report.results[1].sheet.as_deref(), Some("smoke"));
    assert_eq!(report.summary.passed, 2);
    assert_eq!(report.summary.total_assertions, 2);
}

/// 断言单元格写错只让该用例失败，同文件的其他用例照常执行
#[tokio::test]
async fn test_malformed_assertions_fail_only_that_case() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let case_file = temp_dir.path().join("mixed.yaml");
    fs::write(
        &case_file,
        format!(
            r#"
- case_id: 1
  title: good
  method: GET
  url: {uri}/a
  assertions: ["contains_id"]
- case_id: 2
  title: bad cell
  method: GET
  url: {uri}/b
  assertions: 'contains_id'
"#,
            uri = mock_server.uri()
        ),
    )
    .unwrap();

    let report = runner().run_file(&case_file).await.unwrap();
    assert_eq!(report.results.len(), 2);
    assert!(report.results[0].success, "{}", report.results[0].message);
    assert!(!report.results[1].success);
    assert_eq!(report.results[1].status, Some(200));
    assert!(report.results[1].message.contains("malformed assertions"));
    assert!(report.results[1].message.contains("contains_id"));
}

#[tokio::test]
async fn test_upload_sends_multipart_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uploaded": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let upload = temp_dir.path().join("report.csv");
    fs::write(&upload, "sku,qty\na1,3\n").unwrap();

    let case = case(json!({
        "case_id": 1, "title": "upload", "method": "POST",
        "url": format!("{}/upload", mock_server.uri()),
        "data": {"ignored": true},
        "assertions": ["contains_uploaded"],
        "other": format!("file|{}", upload.display())
    }));

    let result = runner().run_case(&case, None).await;
    assert!(result.success, "{}", result.message);
    assert!(result.extraction.is_none());

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="file""#));
    assert!(body.contains(r#"filename="report.csv""#));
    assert!(body.contains("sku,qty\na1,3\n"));
    assert!(!body.contains("ignored"));
}

#[tokio::test]
async fn test_missing_upload_file_is_execution_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.bin");

    let case = case(json!({
        "case_id": 1, "title": "upload missing", "method": "POST",
        "url": format!("{}/upload", mock_server.uri()),
        "other": format!("file|{}", missing.display())
    }));

    let result = runner().run_case(&case, None).await;
    assert!(!result.success);
    assert!(result.status.is_none());
    assert!(result.error.as_deref().unwrap().contains("request failed"));
}
