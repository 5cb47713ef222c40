// 健康检查处理器

use std::sync::Arc;
use std::time::Instant;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use tracing::warn;
use utoipa::ToSchema;

use crate::db::DatabaseManager;
use crate::errors::AssistResult;
use crate::services::LlmClient;

const SERVICE_NAME: &str = "Emergency Assistance Backend";

/// 健康检查依赖的共享状态
pub struct HealthState {
    pub db: DatabaseConnection,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub environment: String,
    pub started_at: Instant,
}

impl HealthState {
    pub fn new(
        db: DatabaseConnection,
        llm: Option<Arc<dyn LlmClient>>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            db,
            llm,
            environment: environment.into(),
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    pub status: String,
    pub service: String,
    pub environment: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
    pub os: String,
    pub arch: String,
    pub pid: u32,
    pub database: String,
    pub llm_configured: bool,
    pub timestamp: DateTime<Utc>,
}

/// 服务信息
pub async fn root() -> AssistResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "documentation": "/api/docs/",
        "health": "/api/health",
        "timestamp": Utc::now(),
    })))
}

/// 不依赖任何组件的存活探针
pub async fn plain_health() -> AssistResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "timestamp": Utc::now() })))
}

/// 基本健康检查
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "服务健康", body = HealthResponse))
)]
pub async fn health_check(state: web::Data<HealthState>) -> AssistResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(HealthResponse {
        ok: true,
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        environment: state.environment.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    }))
}

/// 数据库连接检查
#[utoipa::path(
    get,
    path = "/api/health/db",
    tag = "Health",
    responses(
        (status = 200, description = "数据库已连接"),
        (status = 503, description = "数据库不可用")
    )
)]
pub async fn database_health(state: web::Data<HealthState>) -> AssistResult<HttpResponse> {
    match DatabaseManager::ping(&state.db).await {
        Ok(latency_ms) => Ok(HttpResponse::Ok().json(json!({
            "status": "healthy",
            "database": "connected",
            "latencyMs": latency_ms,
            "timestamp": Utc::now(),
        }))),
        Err(e) => Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "unhealthy",
            "database": "error",
            "error": e.to_string(),
            "timestamp": Utc::now(),
        }))),
    }
}

/// LLM 连接检查：未配置或调用失败时返回 503
#[utoipa::path(
    get,
    path = "/api/health/gpt",
    tag = "Health",
    responses(
        (status = 200, description = "LLM 可用"),
        (status = 503, description = "LLM 未配置或不可用")
    )
)]
pub async fn llm_health(state: web::Data<HealthState>) -> AssistResult<HttpResponse> {
    let Some(llm) = state.llm.as_ref() else {
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "unhealthy",
            "gpt": "not configured",
            "timestamp": Utc::now(),
        })));
    };

    match llm.chat("You are a health check.", "Health check", 16).await {
        Ok(reply) => Ok(HttpResponse::Ok().json(json!({
            "status": "healthy",
            "gpt": "connected",
            "model": llm.model(),
            "testResponse": reply.chars().take(100).collect::<String>(),
            "timestamp": Utc::now(),
        }))),
        Err(e) => {
            warn!(error = %e, "LLM 健康检查失败");
            Ok(HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "gpt": "error",
                "model": llm.model(),
                "error": e.to_string(),
                "timestamp": Utc::now(),
            })))
        }
    }
}

/// 系统信息
#[utoipa::path(
    get,
    path = "/api/health/system",
    tag = "Health",
    responses((status = 200, description = "系统信息", body = SystemInfo))
)]
pub async fn system_health(state: web::Data<HealthState>) -> AssistResult<HttpResponse> {
    let database = match DatabaseManager::ping(&state.db).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Ok(HttpResponse::Ok().json(SystemInfo {
        status: if database == "connected" { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment.clone(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        pid: std::process::id(),
        database: database.to_string(),
        llm_configured: state.llm.is_some(),
        timestamp: Utc::now(),
    }))
}

/// 就绪检查：数据库可用才算就绪
#[utoipa::path(
    get,
    path = "/api/ready",
    tag = "Health",
    responses(
        (status = 200, description = "服务就绪"),
        (status = 503, description = "服务未就绪")
    )
)]
pub async fn readiness_check(state: web::Data<HealthState>) -> AssistResult<HttpResponse> {
    if DatabaseManager::ping(&state.db).await.is_err() {
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "ready": false,
            "reason": "数据库连接不可用"
        })));
    }
    Ok(HttpResponse::Ok().json(json!({ "ready": true })))
}

/// 存活检查
#[utoipa::path(
    get,
    path = "/api/live",
    tag = "Health",
    responses((status = 200, description = "服务存活"))
)]
pub async fn liveness_check() -> AssistResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "alive": true,
        "timestamp": Utc::now()
    })))
}

pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/health/db", web::get().to(database_health))
        .route("/health/gpt", web::get().to(llm_health))
        .route("/health/system", web::get().to(system_health))
        .route("/ready", web::get().to(readiness_check))
        .route("/live", web::get().to(liveness_check));
}
