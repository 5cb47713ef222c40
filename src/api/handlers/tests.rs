// 路由冒烟测试
// 数据库使用断开的连接，只覆盖不依赖数据库的路径

use std::path::Path;
use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use tempfile::TempDir;
use uuid::Uuid;

use super::HealthState;
use crate::api::middleware::{JwtAuthMiddleware, JwtUtils};
use crate::api::routes::configure_routes;
use crate::config::SecurityConfig;
use crate::flow::{FileFlowStore, FlowImageStore, FlowStore};
use crate::services::{
    AuthService, ChatService, DocumentService, KnowledgeBase, MaintenanceService,
    TroubleshootingQa,
};

const SECRET: &str = "route-test-secret-with-enough-length-0123";

fn app_config(root: &Path) -> impl FnOnce(&mut web::ServiceConfig) {
    let root = root.to_path_buf();
    move |cfg| {
        let db = DatabaseConnection::Disconnected;
        let kb = KnowledgeBase::new(root.join("knowledge-base"));
        let store: Arc<dyn FlowStore> = Arc::new(FileFlowStore::new(kb.troubleshooting_dir()));
        let security = SecurityConfig {
            jwt_secret: SECRET.to_string(),
            jwt_expiration: 3600,
            bcrypt_cost: 4,
            cors_origins: vec![],
        };
        let images = FlowImageStore::new(
            kb.root(),
            vec!["png".to_string(), "jpg".to_string()],
            1024,
        );
        let maintenance = MaintenanceService::new(
            vec![root.join("uploads")],
            root.join("logs"),
            kb.log_backup_dir(),
            6,
        );

        cfg.app_data(web::Data::new(HealthState::new(db.clone(), None, "test")))
            .app_data(web::Data::new(AuthService::new(db.clone(), &security)))
            .app_data(web::Data::new(DocumentService::new(db.clone())))
            .app_data(web::Data::new(ChatService::new(db, kb.exports_dir())))
            .app_data(web::Data::new(TroubleshootingQa::new(store.clone(), None)))
            .app_data(web::Data::from(store))
            .app_data(web::Data::new(images))
            .app_data(web::Data::new(maintenance))
            .app_data(web::Data::new(kb))
            .configure(configure_routes);
    }
}

fn bearer(role: &str) -> (String, String) {
    let token = JwtUtils::generate_token(Uuid::new_v4(), "tester", role, SECRET, 3600).unwrap();
    ("Authorization".to_string(), format!("Bearer {}", token))
}

fn brake_flow() -> Value {
    json!({
        "id": "flow_brake",
        "title": "制动失灵",
        "keyword": "制动",
        "steps": [
            { "id": "1", "type": "start", "title": "开始", "connections": ["2"] },
            { "id": "2", "type": "step", "title": "检查制动液", "imageUrl": "/api/emergency-flow/image/a.png", "connections": ["3"] },
            { "id": "3", "type": "end", "title": "结束" }
        ]
    })
}

#[actix_web::test]
async fn test_root_and_plain_health() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(App::new().configure(app_config(dir.path()))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/health").to_request(),
    )
    .await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn test_health_endpoints_without_dependencies() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(App::new().configure(app_config(dir.path()))).await;

    for (uri, status) in [
        ("/api/health", StatusCode::OK),
        ("/api/live", StatusCode::OK),
        ("/api/health/system", StatusCode::OK),
        ("/api/health/db", StatusCode::SERVICE_UNAVAILABLE),
        ("/api/health/gpt", StatusCode::SERVICE_UNAVAILABLE),
        ("/api/ready", StatusCode::SERVICE_UNAVAILABLE),
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), status, "{}", uri);
    }
}

#[actix_web::test]
async fn test_openapi_document_is_served() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(App::new().configure(app_config(dir.path()))).await;

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/openapi.json").to_request(),
    )
    .await;
    assert!(body["paths"]["/api/emergency-flow"].is_object());
}

#[actix_web::test]
async fn test_emergency_flow_crud() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(App::new().configure(app_config(dir.path()))).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/emergency-flow")
            .set_json(brake_flow())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let list: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/emergency-flow").to_request(),
    )
    .await;
    assert_eq!(list["success"], true);
    assert_eq!(list["total"], 1);
    assert_eq!(list["data"][0]["id"], "flow_brake");

    let detail: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/emergency-flow/flow_brake").to_request(),
    )
    .await;
    assert_eq!(detail["data"]["title"], "制动失灵");
    assert_eq!(
        detail["data"]["steps"][1]["imageUrl"],
        "/api/emergency-flow/image/a.png"
    );

    let renamed: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/emergency-flow/update-step-title")
            .set_json(json!({ "flowId": "flow_brake", "stepId": "2", "title": "检查制动管路" }))
            .to_request(),
    )
    .await;
    assert_eq!(renamed["data"]["steps"][1]["title"], "检查制动管路");

    let resp = test::call_service(
        &app,
        test::TestRequest::delete().uri("/api/emergency-flow/flow_brake").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/emergency-flow/flow_brake").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_emergency_flow_rejects_bad_input() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(App::new().configure(app_config(dir.path()))).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/emergency-flow/bad.id").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/emergency-flow/update-step-title")
            .set_json(json!({ "flowId": "flow_brake" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_validate_reports_cycle_and_fixes_steps() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(App::new().configure(app_config(dir.path()))).await;

    let cyclic = json!({
        "steps": [
            { "id": "a", "type": "start", "connections": ["b"] },
            { "id": "b", "type": "step", "connections": ["a"] }
        ]
    });
    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/emergency-flow/validate")
            .set_json(cyclic)
            .to_request(),
    )
    .await;
    assert_eq!(body["data"]["validation"]["isValid"], false);
    let errors = body["data"]["validation"]["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e == "流程中检测到循环引用"));

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/emergency-flow/validate")
            .set_json(json!({ "title": "空流程" }))
            .to_request(),
    )
    .await;
    assert_eq!(body["data"]["fixedData"]["steps"], json!([]));
}

#[actix_web::test]
async fn test_image_upload_and_serve() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(App::new().configure(app_config(dir.path()))).await;

    let boundary = "----assist-boundary";
    let payload = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"step.png\"\r\n\
         Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
        b = boundary
    );
    let uploaded: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/emergency-flow/upload-image")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(payload)
            .to_request(),
    )
    .await;
    assert_eq!(uploaded["success"], true);
    assert_eq!(uploaded["isDuplicate"], false);

    let image_url = uploaded["imageUrl"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/api/emergency-flow/image/emergency-flow-step"));

    let req = test::TestRequest::get().uri(&image_url).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
    let bytes = test::read_body(resp).await;
    assert_eq!(&bytes[..], b"PNGDATA");
}

#[actix_web::test]
async fn test_auth_guards() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(
        App::new()
            .wrap(JwtAuthMiddleware::new(SECRET))
            .configure(app_config(dir.path())),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/auth/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/users")
            .insert_header(bearer("employee"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/tech-support/cleanup-uploads")
            .insert_header(bearer("employee"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get().uri("/api/chats").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_admin_cleanup_uploads() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
    std::fs::write(dir.path().join("uploads/chunk.tmp"), b"12345").unwrap();

    let app = test::init_service(
        App::new()
            .wrap(JwtAuthMiddleware::new(SECRET))
            .configure(app_config(dir.path())),
    )
    .await;

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/tech-support/cleanup-uploads")
            .insert_header(bearer("admin"))
            .to_request(),
    )
    .await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["removedFiles"], 1);
    assert_eq!(body["data"]["freedBytes"], 5);
    assert!(!dir.path().join("uploads/chunk.tmp").exists());
}

#[actix_web::test]
async fn test_knowledge_data_files() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("knowledge-base/data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("engine.json"), r#"{"name":"engine"}"#).unwrap();

    let app = test::init_service(App::new().configure(app_config(dir.path()))).await;

    let list: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/knowledge").to_request(),
    )
    .await;
    assert_eq!(list["data"][0]["filename"], "engine.json");
    assert_eq!(list["data"][0]["path"], "data/engine.json");

    let file: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/knowledge/engine.json").to_request(),
    )
    .await;
    assert_eq!(file["data"]["name"], "engine");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/knowledge/missing.json").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/knowledge/notes.txt").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_troubleshooting_without_llm_uses_fallback() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(App::new().configure(app_config(dir.path()))).await;

    test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/emergency-flow")
            .set_json(brake_flow())
            .to_request(),
    )
    .await;

    let search: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/troubleshooting/search")
            .set_json(json!({ "query": "制动" }))
            .to_request(),
    )
    .await;
    assert_eq!(search["data"]["results"][0]["id"], "flow_brake");

    let start: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/troubleshooting/qa/start")
            .set_json(json!({ "problem": "发动机无法启动" }))
            .to_request(),
    )
    .await;
    assert_eq!(start["data"]["status"], "continue");
    assert_eq!(start["data"]["question"], "请描述发生的具体情况");
    assert_eq!(start["data"]["options"].as_array().unwrap().len(), 4);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/troubleshooting/qa/start")
            .set_json(json!({ "problem": " " }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
