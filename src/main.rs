use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware::Condition, web, App, HttpServer};
use tracing::{info, warn};

use emergency_assist::api::handlers::HealthState;
use emergency_assist::api::middleware::JwtAuthMiddleware;
use emergency_assist::api::routes::configure_routes;
use emergency_assist::audit::{AuditLogger, AuditMiddleware, AuditRotator};
use emergency_assist::config::{AppConfig, ConfigLoader};
use emergency_assist::db::{DatabaseManager, MigrationManager};
use emergency_assist::errors::{RequestIdMiddleware, RequestLoggingMiddleware};
use emergency_assist::flow::{DbFlowStore, FileFlowStore, FlowImageStore, FlowStore};
use emergency_assist::logging::LoggingSetup;
use emergency_assist::services::{
    AuthService, AzureBlobUploader, BlobUploader, ChatService, DocumentService, KnowledgeBase,
    LlmClient, MaintenanceService, OpenAiChatClient, TroubleshootingQa,
};

const MAX_JSON_PAYLOAD: usize = 2 * 1024 * 1024;

fn io_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

fn build_cors(config: &AppConfig) -> Cors {
    let origins = &config.security.cors_origins;
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        cors.allow_any_origin()
    } else {
        origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 初始化配置
    let config = ConfigLoader::init()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

    // guard 持有到进程结束
    let _log_guard = LoggingSetup::init(&config.logging).map_err(io_error)?;

    info!("🚀 启动 Emergency Assist v{}", config.environment.version);

    // 数据库连接失败直接退出
    let database = DatabaseManager::connect(&config.database)
        .await
        .map_err(io_error)?;
    let db = database.connection();

    let migration_manager = MigrationManager::new(db.clone());
    migration_manager.init().await.map_err(io_error)?;
    match migration_manager.migrate().await {
        Ok(applied) if !applied.is_empty() => info!("应用了 {} 个数据库迁移", applied.len()),
        Ok(_) => {}
        Err(e) => warn!("数据库迁移检查失败: {}", e),
    }

    ConfigLoader::print_summary(config);

    // 知识库目录
    let knowledge_base = KnowledgeBase::new(config.storage.knowledge_base_dir());
    knowledge_base.ensure_layout().await.map_err(io_error)?;

    let flow_store: Arc<dyn FlowStore> = if config.storage.uses_database_flows() {
        Arc::new(DbFlowStore::new(db.clone()))
    } else {
        Arc::new(FileFlowStore::new(knowledge_base.troubleshooting_dir()))
    };
    info!(backend = flow_store.backend_name(), "流程存储已就绪");

    let llm: Option<Arc<dyn LlmClient>> = if config.ai.is_configured() {
        Some(Arc::new(OpenAiChatClient::new(&config.ai).map_err(io_error)?))
    } else {
        warn!("未配置 LLM，问答将使用默认提问");
        None
    };

    let uploader: Option<Arc<dyn BlobUploader>> = AzureBlobUploader::from_config(&config.blob)
        .map_err(io_error)?
        .map(|u| Arc::new(u) as Arc<dyn BlobUploader>);
    if uploader.is_none() {
        warn!("未配置 Blob 存储，日志归档只保留在本地");
    }

    // 审计日志：定时写出与轮转
    let audit_logger = Arc::new(AuditLogger::new(&config.audit));
    if config.audit.enabled {
        audit_logger
            .clone()
            .spawn_flush_task(Duration::from_millis(config.audit.flush_interval_ms));
        if config.audit.rotation_enabled {
            Arc::new(AuditRotator::new(
                audit_logger.clone(),
                &config.audit,
                uploader.clone(),
            ))
            .spawn();
        }
    }

    let mut maintenance = MaintenanceService::new(
        config.storage.uploads_paths.iter().map(PathBuf::from).collect(),
        &config.audit.log_dir,
        knowledge_base.log_backup_dir(),
        config.storage.log_backup_retention_months,
    )
    .with_excluded(config.audit.log_file());
    if let Some(uploader) = &uploader {
        maintenance = maintenance.with_uploader(uploader.clone(), &config.blob.knowledge_container);
    }

    let images = FlowImageStore::new(
        knowledge_base.root(),
        config.storage.allowed_image_extensions.clone(),
        config.storage.max_upload_bytes,
    );

    let health = web::Data::new(HealthState::new(
        db.clone(),
        llm.clone(),
        config.environment.name.clone(),
    ));
    let auth_service = web::Data::new(AuthService::new(db.clone(), &config.security));
    let documents = web::Data::new(DocumentService::new(db.clone()));
    let chats = web::Data::new(ChatService::new(db.clone(), knowledge_base.exports_dir()));
    let qa = web::Data::new(TroubleshootingQa::new(flow_store.clone(), llm));
    let flows: web::Data<dyn FlowStore> = web::Data::from(flow_store);
    let images = web::Data::new(images);
    let maintenance = web::Data::new(maintenance);
    let knowledge_base = web::Data::new(knowledge_base);

    info!("🌐 服务器启动地址: http://{}:{}", config.server.host, config.server.port);
    info!("📋 API 文档: http://{}:{}/api/docs/", config.server.host, config.server.port);

    let jwt_secret = config.security.jwt_secret.clone();
    let audit_enabled = config.audit.enabled;

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(MAX_JSON_PAYLOAD))
            .app_data(web::PayloadConfig::new(MAX_JSON_PAYLOAD))
            .app_data(health.clone())
            .app_data(auth_service.clone())
            .app_data(documents.clone())
            .app_data(chats.clone())
            .app_data(qa.clone())
            .app_data(flows.clone())
            .app_data(images.clone())
            .app_data(maintenance.clone())
            .app_data(knowledge_base.clone())
            .wrap(JwtAuthMiddleware::new(&jwt_secret))
            .wrap(Condition::new(
                audit_enabled,
                AuditMiddleware::new(audit_logger.clone()),
            ))
            .wrap(RequestLoggingMiddleware)
            .wrap(RequestIdMiddleware)
            .wrap(build_cors(config))
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(configure_routes)
    })
    .keep_alive(Duration::from_secs(config.server.keep_alive));

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind((config.server.host.clone(), config.server.port))?
        .run()
        .await
}
