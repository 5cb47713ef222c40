// 审计模块测试

use std::io::Read;
use std::sync::Arc;

use actix_web::{web, App, HttpResponse};
use chrono::Utc;
use flate2::read::GzDecoder;
use serde_json::{json, Value};
use tempfile::TempDir;

use super::*;
use crate::config::{AppConfig, AuditConfig};
use crate::errors::RequestIdMiddleware;
use crate::services::blob::BlobUploader;
use crate::services::blob::testing::RecordingUploader;

fn audit_config(dir: &TempDir) -> AuditConfig {
    AuditConfig {
        log_dir: dir.path().join("logs").display().to_string(),
        rotate_max_bytes: 64,
        ..AppConfig::default().audit
    }
}

fn entry(path: &str) -> AuditEntry {
    AuditEntry {
        ts: Utc::now(),
        tag: "api".to_string(),
        method: "GET".to_string(),
        path: path.to_string(),
        status: 200,
        ms: 3,
        user_id: None,
        role: None,
        ip: Some("10.0.0.1".to_string()),
        ua: None,
        body: None,
        request_id: "req-1".to_string(),
        correlation_id: "req-1".to_string(),
    }
}

#[test]
fn test_mask_nested_keys() {
    let keys = vec!["password".to_string(), "token".to_string()];
    let body = json!({
        "username": "niina",
        "Password": "secret",
        "profile": {"token": "abc", "items": [{"password": "x", "keep": 1}]}
    });

    let masked = mask_value(&body, &keys);
    assert_eq!(masked["username"], "niina");
    assert_eq!(masked["Password"], "***");
    assert_eq!(masked["profile"]["token"], "***");
    assert_eq!(masked["profile"]["items"][0]["password"], "***");
    assert_eq!(masked["profile"]["items"][0]["keep"], 1);
}

#[tokio::test]
async fn test_flush_appends_json_lines() {
    let dir = TempDir::new().unwrap();
    let logger = AuditLogger::new(&audit_config(&dir));
    assert!(logger.is_file_enabled());

    assert_eq!(logger.flush().await.unwrap(), 0);

    logger.enqueue(entry("/api/health"));
    logger.enqueue(entry("/api/emergency-flow"));
    assert_eq!(logger.pending(), 2);
    assert_eq!(logger.flush().await.unwrap(), 2);
    assert_eq!(logger.pending(), 0);

    logger.enqueue(entry("/api/chats"));
    logger.flush().await.unwrap();

    let content = std::fs::read_to_string(logger.log_file()).unwrap();
    let lines: Vec<Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["path"], "/api/emergency-flow");
    assert_eq!(lines[0]["requestId"], "req-1");
}

#[tokio::test]
async fn test_rotation_compresses_and_uploads() {
    let dir = TempDir::new().unwrap();
    let mut config = audit_config(&dir);
    config.container = "knowledge".to_string();
    let logger = Arc::new(AuditLogger::new(&config));
    let uploader = Arc::new(RecordingUploader::default());
    let rotator = AuditRotator::new(
        logger.clone(),
        &config,
        Some(uploader.clone() as Arc<dyn BlobUploader>),
    );

    // 文件不存在时不轮转
    assert!(rotator.rotate_if_needed().await.unwrap().is_none());

    logger.enqueue(entry("/api/a"));
    logger.enqueue(entry("/api/b"));
    logger.flush().await.unwrap();

    let outcome = rotator.rotate_if_needed().await.unwrap().unwrap();
    assert!(outcome.uploaded);
    assert!(outcome.blob_name.starts_with("userlog/audit-"));
    assert!(outcome.blob_name.ends_with(".log.gz"));
    assert!(outcome.archive.exists());
    assert!(!logger.log_file().exists());

    let mut decoded = String::new();
    GzDecoder::new(std::fs::File::open(&outcome.archive).unwrap())
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded.lines().count(), 2);

    let uploads = uploader.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "knowledge");
}

#[tokio::test]
async fn test_rotation_below_threshold_and_failed_upload() {
    let dir = TempDir::new().unwrap();
    let mut config = audit_config(&dir);
    config.rotate_max_bytes = 1_000_000;
    config.compress = false;
    let logger = Arc::new(AuditLogger::new(&config));
    let uploader = Arc::new(RecordingUploader {
        fail_times: u32::MAX,
        ..Default::default()
    });
    let rotator = AuditRotator::new(
        logger.clone(),
        &config,
        Some(uploader as Arc<dyn BlobUploader>),
    );

    logger.enqueue(entry("/api/a"));
    logger.flush().await.unwrap();
    assert!(rotator.rotate_if_needed().await.unwrap().is_none());

    // 上传失败不影响轮转
    let outcome = rotator.rotate().await.unwrap().unwrap();
    assert!(!outcome.uploaded);
    assert!(outcome.archive.extension().is_some_and(|e| e == "log"));
    assert!(outcome.archive.exists());
}

#[actix_web::test]
async fn test_middleware_records_masked_body() {
    let dir = TempDir::new().unwrap();
    let logger = Arc::new(AuditLogger::new(&audit_config(&dir)));

    let app = actix_web::test::init_service(
        App::new()
            .wrap(AuditMiddleware::new(logger.clone()))
            .wrap(RequestIdMiddleware)
            .route(
                "/api/auth/login",
                web::post().to(|body: web::Json<Value>| async move {
                    HttpResponse::Ok().json(json!({"echo": body["username"]}))
                }),
            ),
    )
    .await;

    let req = actix_web::test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header(("x-request-id", "audit-req"))
        .insert_header(("x-forwarded-for", "192.168.1.5, 10.0.0.1"))
        .set_json(json!({"username": "tanaka", "password": "hunter2"}))
        .to_request();
    let resp: Value = actix_web::test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["echo"], "tanaka");

    logger.flush().await.unwrap();
    let content = std::fs::read_to_string(logger.log_file()).unwrap();
    let record: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(record["method"], "POST");
    assert_eq!(record["status"], 200);
    assert_eq!(record["ip"], "192.168.1.5");
    assert_eq!(record["requestId"], "audit-req");
    assert_eq!(record["correlationId"], "audit-req");
    assert_eq!(record["body"]["password"], "***");
    assert_eq!(record["body"]["username"], "tanaka");
}

#[tokio::test]
async fn test_concurrent_rotation_runs_once() {
    let dir = TempDir::new().unwrap();
    let config = audit_config(&dir);
    let logger = Arc::new(AuditLogger::new(&config));
    let rotator = AuditRotator::new(logger.clone(), &config, None);

    for path in ["/api/a", "/api/b", "/api/c"] {
        logger.enqueue(entry(path));
    }
    logger.flush().await.unwrap();
    let size = std::fs::metadata(logger.log_file()).unwrap().len();
    assert!(size >= config.rotate_max_bytes);

    let (first, second) = tokio::join!(rotator.rotate(), rotator.rotate());
    let outcomes: Vec<_> = [first.unwrap(), second.unwrap()]
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(outcomes.len(), 1);

    let log_dir = logger.log_file().parent().unwrap().to_path_buf();
    let archives: Vec<String> = std::fs::read_dir(&log_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("audit-") && name.ends_with(".log.gz"))
        .collect();
    assert_eq!(archives.len(), 1);
    assert_eq!(outcomes[0].archive, log_dir.join(&archives[0]));

    // 标记已释放，之后可以再次轮转
    logger.enqueue(entry("/api/d"));
    logger.flush().await.unwrap();
    assert!(rotator.rotate().await.unwrap().is_some());
}
