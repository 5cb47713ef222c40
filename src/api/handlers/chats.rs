// 聊天记录处理器

use actix_web::{http::header, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::api::extractors::AuthExtractor;
use crate::api::responses::HttpResponseBuilder;
use crate::errors::AssistResult;
use crate::services::chat::{
    ChatInfo, ChatService, CreateChatRequest, ExportInfo, MessageInfo, SendMessageRequest,
};

#[utoipa::path(
    get,
    path = "/api/chats",
    tag = "Chat",
    responses((status = 200, description = "当前用户的会话", body = [ChatInfo]))
)]
pub async fn list_chats(
    chats: web::Data<ChatService>,
    auth: AuthExtractor,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(chats.list_chats(&auth).await?)
}

#[utoipa::path(
    post,
    path = "/api/chats",
    tag = "Chat",
    request_body = CreateChatRequest,
    responses((status = 201, description = "会话已创建", body = ChatInfo))
)]
pub async fn create_chat(
    chats: web::Data<ChatService>,
    auth: AuthExtractor,
    body: web::Json<CreateChatRequest>,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::created(chats.create_chat(&auth, body.into_inner()).await?)
}

#[utoipa::path(
    get,
    path = "/api/chats/{id}",
    tag = "Chat",
    params(("id" = Uuid, Path, description = "会话 ID")),
    responses(
        (status = 200, description = "会话", body = ChatInfo),
        (status = 403, description = "无权访问"),
        (status = 404, description = "会话不存在")
    )
)]
pub async fn get_chat(
    chats: web::Data<ChatService>,
    auth: AuthExtractor,
    path: web::Path<Uuid>,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(chats.get_chat(&auth, path.into_inner()).await?)
}

#[utoipa::path(
    delete,
    path = "/api/chats/{id}",
    tag = "Chat",
    params(("id" = Uuid, Path, description = "会话 ID")),
    responses(
        (status = 200, description = "会话已删除"),
        (status = 403, description = "无权访问"),
        (status = 404, description = "会话不存在")
    )
)]
pub async fn delete_chat(
    chats: web::Data<ChatService>,
    auth: AuthExtractor,
    path: web::Path<Uuid>,
) -> AssistResult<HttpResponse> {
    chats.delete_chat(&auth, path.into_inner()).await?;
    HttpResponseBuilder::done("会话已删除")
}

#[utoipa::path(
    get,
    path = "/api/chats/{id}/messages",
    tag = "Chat",
    params(("id" = Uuid, Path, description = "会话 ID")),
    responses((status = 200, description = "消息列表（按时间升序）", body = [MessageInfo]))
)]
pub async fn list_messages(
    chats: web::Data<ChatService>,
    auth: AuthExtractor,
    path: web::Path<Uuid>,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(chats.list_messages(&auth, path.into_inner()).await?)
}

#[utoipa::path(
    post,
    path = "/api/chats/{id}/messages",
    tag = "Chat",
    params(("id" = Uuid, Path, description = "会话 ID")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "消息已保存", body = MessageInfo),
        (status = 400, description = "消息为空")
    )
)]
pub async fn add_message(
    chats: web::Data<ChatService>,
    auth: AuthExtractor,
    path: web::Path<Uuid>,
    body: web::Json<SendMessageRequest>,
) -> AssistResult<HttpResponse> {
    let message = chats
        .add_message(&auth, path.into_inner(), body.into_inner())
        .await?;
    HttpResponseBuilder::created(message)
}

#[utoipa::path(
    post,
    path = "/api/chats/{id}/export",
    tag = "Chat",
    params(("id" = Uuid, Path, description = "会话 ID")),
    responses((status = 200, description = "导出完成", body = ExportInfo))
)]
pub async fn export_chat(
    chats: web::Data<ChatService>,
    auth: AuthExtractor,
    path: web::Path<Uuid>,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(chats.export_chat(&auth, path.into_inner()).await?)
}

#[utoipa::path(
    get,
    path = "/api/chats/{id}/last-export",
    tag = "Chat",
    params(("id" = Uuid, Path, description = "会话 ID")),
    responses((status = 200, description = "最近一次导出，没有时为 null", body = ExportInfo))
)]
pub async fn last_export(
    chats: web::Data<ChatService>,
    auth: AuthExtractor,
    path: web::Path<Uuid>,
) -> AssistResult<HttpResponse> {
    let export = chats.last_export(&auth, path.into_inner()).await?;
    HttpResponseBuilder::ok(json!({ "lastExport": export }))
}

#[utoipa::path(
    get,
    path = "/api/chats/{id}/export.csv",
    tag = "Chat",
    params(("id" = Uuid, Path, description = "会话 ID")),
    responses((status = 200, description = "CSV 文件", content_type = "text/csv"))
)]
pub async fn export_csv(
    chats: web::Data<ChatService>,
    auth: AuthExtractor,
    path: web::Path<Uuid>,
) -> AssistResult<HttpResponse> {
    let (file_name, csv) = chats.export_csv(&auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ))
        .body(csv))
}

pub fn configure_chat_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/chats")
            .route("", web::get().to(list_chats))
            .route("", web::post().to(create_chat))
            .route("/{id}", web::get().to(get_chat))
            .route("/{id}", web::delete().to(delete_chat))
            .route("/{id}/messages", web::get().to(list_messages))
            .route("/{id}/messages", web::post().to(add_message))
            .route("/{id}/export", web::post().to(export_chat))
            .route("/{id}/last-export", web::get().to(last_export))
            .route("/{id}/export.csv", web::get().to(export_csv)),
    );
}
