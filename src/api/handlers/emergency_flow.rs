// 应急流程处理器

use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use utoipa::ToSchema;

use crate::api::responses::HttpResponseBuilder;
use crate::errors::{AssistError, AssistResult};
use crate::flow::{
    auto_fix_flow_data, validate_flow_data, FlowDocument, FlowImageStore, FlowStore, FlowSummary,
    FlowValidation, UploadedImage,
};

/// 上传表单中图片字段的名称
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStepTitleRequest {
    pub flow_id: Option<String>,
    pub step_id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateFlowResponse {
    pub validation: FlowValidation,
    /// 校验失败时补齐 steps 后的文档
    #[schema(value_type = Object)]
    pub fixed_data: Value,
}

/// 流程列表：{ success, data, total, timestamp }
#[utoipa::path(
    get,
    path = "/api/emergency-flow",
    tag = "Emergency Flow",
    responses((status = 200, description = "流程摘要列表", body = [FlowSummary]))
)]
pub async fn list_flows(store: web::Data<dyn FlowStore>) -> AssistResult<HttpResponse> {
    let summaries: Vec<FlowSummary> = store
        .list()
        .await?
        .iter()
        .map(FlowDocument::summary)
        .collect();
    Ok(HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"))
        .json(json!({
            "success": true,
            "total": summaries.len(),
            "data": summaries,
            "timestamp": Utc::now(),
        })))
}

#[utoipa::path(
    get,
    path = "/api/emergency-flow/{id}",
    tag = "Emergency Flow",
    params(("id" = String, Path, description = "流程 ID")),
    responses(
        (status = 200, description = "流程详情", body = FlowDocument),
        (status = 404, description = "流程不存在")
    )
)]
pub async fn get_flow(
    store: web::Data<dyn FlowStore>,
    path: web::Path<String>,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(store.get(&path).await?)
}

#[utoipa::path(
    post,
    path = "/api/emergency-flow",
    tag = "Emergency Flow",
    request_body = FlowDocument,
    responses(
        (status = 201, description = "流程已创建", body = FlowDocument),
        (status = 400, description = "缺少标题或 ID 非法"),
        (status = 409, description = "ID 已存在")
    )
)]
pub async fn create_flow(
    store: web::Data<dyn FlowStore>,
    body: web::Json<FlowDocument>,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::created(store.create(body.into_inner()).await?)
}

#[utoipa::path(
    put,
    path = "/api/emergency-flow/{id}",
    tag = "Emergency Flow",
    params(("id" = String, Path, description = "流程 ID")),
    request_body = FlowDocument,
    responses(
        (status = 200, description = "流程已更新", body = FlowDocument),
        (status = 404, description = "流程不存在")
    )
)]
pub async fn update_flow(
    store: web::Data<dyn FlowStore>,
    path: web::Path<String>,
    body: web::Json<FlowDocument>,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(store.update(&path, body.into_inner()).await?)
}

#[utoipa::path(
    delete,
    path = "/api/emergency-flow/{id}",
    tag = "Emergency Flow",
    params(("id" = String, Path, description = "流程 ID")),
    responses(
        (status = 200, description = "流程已删除"),
        (status = 404, description = "流程不存在")
    )
)]
pub async fn delete_flow(
    store: web::Data<dyn FlowStore>,
    path: web::Path<String>,
) -> AssistResult<HttpResponse> {
    store.delete(&path).await?;
    HttpResponseBuilder::message(json!({ "id": path.into_inner() }), "流程已删除")
}

/// 校验流程文档并给出补齐后的版本
#[utoipa::path(
    post,
    path = "/api/emergency-flow/validate",
    tag = "Emergency Flow",
    responses((status = 200, description = "校验结果", body = ValidateFlowResponse))
)]
pub async fn validate_flow(body: web::Json<Value>) -> AssistResult<HttpResponse> {
    let document = body.into_inner();
    let validation = validate_flow_data(&document);
    let fixed_data = auto_fix_flow_data(&document);
    HttpResponseBuilder::ok(ValidateFlowResponse {
        validation,
        fixed_data,
    })
}

#[utoipa::path(
    post,
    path = "/api/emergency-flow/update-step-title",
    tag = "Emergency Flow",
    request_body = UpdateStepTitleRequest,
    responses(
        (status = 200, description = "步骤标题已更新", body = FlowDocument),
        (status = 400, description = "缺少参数"),
        (status = 404, description = "流程或步骤不存在")
    )
)]
pub async fn update_step_title(
    store: web::Data<dyn FlowStore>,
    body: web::Json<UpdateStepTitleRequest>,
) -> AssistResult<HttpResponse> {
    let request = body.into_inner();
    let (Some(flow_id), Some(step_id), Some(title)) = (
        request.flow_id.filter(|s| !s.is_empty()),
        request.step_id.filter(|s| !s.is_empty()),
        request.title.filter(|s| !s.trim().is_empty()),
    ) else {
        return Err(AssistError::validation("body", "flowId、stepId 和 title 均为必填"));
    };

    let document = store.update_step_title(&flow_id, &step_id, &title).await?;
    HttpResponseBuilder::ok(document)
}

/// 上传步骤图片（multipart 字段 image）
#[utoipa::path(
    post,
    path = "/api/emergency-flow/upload-image",
    tag = "Emergency Flow",
    responses(
        (status = 200, description = "上传成功", body = UploadedImage),
        (status = 400, description = "缺少文件、格式不支持或超过大小限制")
    )
)]
pub async fn upload_image(
    images: web::Data<FlowImageStore>,
    mut payload: Multipart,
) -> AssistResult<HttpResponse> {
    let multipart_error = |e: actix_multipart::MultipartError| {
        AssistError::file_processing(format!("读取上传内容失败: {}", e))
    };

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        if field.name() != IMAGE_FIELD {
            while field.try_next().await.map_err(multipart_error)?.is_some() {}
            continue;
        }

        let file_name = field
            .content_disposition()
            .get_filename()
            .unwrap_or_default()
            .to_string();
        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            if (data.len() + chunk.len()) as u64 > images.max_bytes() {
                return Err(AssistError::validation(
                    "image",
                    format!("文件大小不能超过 {} 字节", images.max_bytes()),
                ));
            }
            data.extend_from_slice(&chunk);
        }

        let uploaded = images.save(&file_name, &data).await?;
        info!(file = %uploaded.file_name, duplicate = uploaded.is_duplicate, "步骤图片已上传");
        return Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "imageUrl": uploaded.image_url,
            "fileName": uploaded.file_name,
            "isDuplicate": uploaded.is_duplicate,
        })));
    }

    Err(AssistError::validation(IMAGE_FIELD, "未提供图片文件"))
}

#[utoipa::path(
    get,
    path = "/api/emergency-flow/image/{file}",
    tag = "Emergency Flow",
    params(("file" = String, Path, description = "图片文件名")),
    responses(
        (status = 200, description = "图片内容"),
        (status = 404, description = "图片不存在")
    )
)]
pub async fn get_image(
    images: web::Data<FlowImageStore>,
    path: web::Path<String>,
) -> AssistResult<HttpResponse> {
    let (file, content_type) = images.resolve(&path).await?;
    let data = tokio::fs::read(&file).await?;
    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
        .body(data))
}

pub fn configure_emergency_flow_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/emergency-flow")
            .route("", web::get().to(list_flows))
            .route("", web::post().to(create_flow))
            .route("/validate", web::post().to(validate_flow))
            .route("/update-step-title", web::post().to(update_step_title))
            .route("/upload-image", web::post().to(upload_image))
            .route("/image/{file}", web::get().to(get_image))
            .route("/{id}", web::get().to(get_flow))
            .route("/{id}", web::put().to(update_flow))
            .route("/{id}", web::delete().to(delete_flow)),
    );
}
