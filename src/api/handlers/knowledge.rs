// 知识库处理器：data 目录文件与数据库文档

use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::api::extractors::{AuthExtractor, PaginationExtractor};
use crate::api::responses::HttpResponseBuilder;
use crate::errors::AssistResult;
use crate::services::knowledge::{
    CreateDocumentRequest, DataFileInfo, DocumentInfo, DocumentService, KnowledgeBase,
};

#[utoipa::path(
    get,
    path = "/api/knowledge",
    tag = "Knowledge",
    responses((status = 200, description = "data 目录下的 JSON 文件", body = [DataFileInfo]))
)]
pub async fn list_data_files(kb: web::Data<KnowledgeBase>) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(kb.list_data_files().await?)
}

#[utoipa::path(
    get,
    path = "/api/knowledge/{filename}",
    tag = "Knowledge",
    params(("filename" = String, Path, description = "JSON 文件名")),
    responses(
        (status = 200, description = "文件内容"),
        (status = 400, description = "文件名非法"),
        (status = 404, description = "文件不存在")
    )
)]
pub async fn read_data_file(
    kb: web::Data<KnowledgeBase>,
    path: web::Path<String>,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(kb.read_data_file(&path).await?)
}

#[utoipa::path(
    get,
    path = "/api/knowledge/documents",
    tag = "Knowledge",
    params(
        ("page" = Option<u64>, Query, description = "页码，从 1 开始"),
        ("page_size" = Option<u64>, Query, description = "每页数量，最大 100")
    ),
    responses((status = 200, description = "文档分页列表"))
)]
pub async fn list_documents(
    documents: web::Data<DocumentService>,
    _auth: AuthExtractor,
    pagination: PaginationExtractor,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(documents.list(&pagination.0).await?)
}

#[utoipa::path(
    post,
    path = "/api/knowledge/documents",
    tag = "Knowledge",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "文档已创建", body = DocumentInfo),
        (status = 400, description = "标题或内容为空")
    )
)]
pub async fn create_document(
    documents: web::Data<DocumentService>,
    auth: AuthExtractor,
    body: web::Json<CreateDocumentRequest>,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::created(documents.create(auth.user_id, body.into_inner()).await?)
}

#[utoipa::path(
    get,
    path = "/api/knowledge/documents/{id}",
    tag = "Knowledge",
    params(("id" = Uuid, Path, description = "文档 ID")),
    responses(
        (status = 200, description = "文档详情", body = DocumentInfo),
        (status = 404, description = "文档不存在")
    )
)]
pub async fn get_document(
    documents: web::Data<DocumentService>,
    _auth: AuthExtractor,
    path: web::Path<Uuid>,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(documents.get(path.into_inner()).await?)
}

#[utoipa::path(
    delete,
    path = "/api/knowledge/documents/{id}",
    tag = "Knowledge",
    params(("id" = Uuid, Path, description = "文档 ID")),
    responses(
        (status = 200, description = "文档已删除"),
        (status = 404, description = "文档不存在")
    )
)]
pub async fn delete_document(
    documents: web::Data<DocumentService>,
    _auth: AuthExtractor,
    path: web::Path<Uuid>,
) -> AssistResult<HttpResponse> {
    documents.delete(path.into_inner()).await?;
    HttpResponseBuilder::done("文档已删除")
}

pub fn configure_knowledge_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/knowledge")
            .route("", web::get().to(list_data_files))
            .route("/documents", web::get().to(list_documents))
            .route("/documents", web::post().to(create_document))
            .route("/documents/{id}", web::get().to(get_document))
            .route("/documents/{id}", web::delete().to(delete_document))
            .route("/{filename}", web::get().to(read_data_file)),
    );
}
