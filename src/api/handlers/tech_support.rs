// 技术支持维护处理器（管理员）

use actix_web::{web, HttpResponse};

use crate::api::extractors::AdminExtractor;
use crate::api::responses::HttpResponseBuilder;
use crate::errors::AssistResult;
use crate::services::maintenance::{BackupReport, CleanupReport, MaintenanceService};

#[utoipa::path(
    post,
    path = "/api/tech-support/cleanup-uploads",
    tag = "Tech Support",
    responses(
        (status = 200, description = "清理结果", body = CleanupReport),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn cleanup_uploads(
    maintenance: web::Data<MaintenanceService>,
    _admin: AdminExtractor,
) -> AssistResult<HttpResponse> {
    let report = maintenance.cleanup_uploads().await?;
    HttpResponseBuilder::message(report, "上传目录清理完成")
}

#[utoipa::path(
    post,
    path = "/api/tech-support/cleanup-logs",
    tag = "Tech Support",
    responses(
        (status = 200, description = "备份结果", body = BackupReport),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn cleanup_logs(
    maintenance: web::Data<MaintenanceService>,
    _admin: AdminExtractor,
) -> AssistResult<HttpResponse> {
    let report = maintenance.backup_logs().await?;
    HttpResponseBuilder::message(report, "日志备份完成")
}

pub fn configure_tech_support_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tech-support")
            .route("/cleanup-uploads", web::post().to(cleanup_uploads))
            .route("/cleanup-logs", web::post().to(cleanup_logs)),
    );
}
