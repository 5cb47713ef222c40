// API 路由定义
// 定义所有 API 端点的路由配置

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers::{
    self, auth, chats, emergency_flow, health, knowledge, tech_support, troubleshooting,
};

/// API 文档聚合
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Emergency Assist API",
        description = "应急维修辅助系统 API 接口文档",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        health::health_check,
        health::database_health,
        health::llm_health,
        health::system_health,
        health::readiness_check,
        health::liveness_check,
        auth::login,
        auth::me,
        auth::logout,
        auth::register,
        auth::list_users,
        auth::delete_user,
        knowledge::list_data_files,
        knowledge::read_data_file,
        knowledge::list_documents,
        knowledge::create_document,
        knowledge::get_document,
        knowledge::delete_document,
        emergency_flow::list_flows,
        emergency_flow::get_flow,
        emergency_flow::create_flow,
        emergency_flow::update_flow,
        emergency_flow::delete_flow,
        emergency_flow::validate_flow,
        emergency_flow::update_step_title,
        emergency_flow::upload_image,
        emergency_flow::get_image,
        troubleshooting::search_flows,
        troubleshooting::start_qa,
        troubleshooting::answer_qa,
        troubleshooting::generate_solution,
        chats::list_chats,
        chats::create_chat,
        chats::get_chat,
        chats::delete_chat,
        chats::list_messages,
        chats::add_message,
        chats::export_chat,
        chats::last_export,
        chats::export_csv,
        tech_support::cleanup_uploads,
        tech_support::cleanup_logs,
    ),
    components(schemas(
        health::HealthResponse,
        health::SystemInfo,
        crate::services::auth::LoginRequest,
        crate::services::auth::LoginResponse,
        crate::services::auth::RegisterRequest,
        crate::services::auth::UserInfo,
        crate::services::knowledge::DataFileInfo,
        crate::services::knowledge::CreateDocumentRequest,
        crate::services::knowledge::DocumentInfo,
        crate::flow::FlowDocument,
        crate::flow::FlowStep,
        crate::flow::StepOption,
        crate::flow::FlowSummary,
        crate::flow::FlowValidation,
        crate::flow::UploadedImage,
        emergency_flow::UpdateStepTitleRequest,
        emergency_flow::ValidateFlowResponse,
        troubleshooting::SearchRequest,
        troubleshooting::StartQaRequest,
        troubleshooting::AnswerQaRequest,
        troubleshooting::SolutionRequest,
        crate::services::troubleshooting::QaAnswer,
        crate::services::troubleshooting::QaStatus,
        crate::services::troubleshooting::QaResponse,
        crate::services::chat::ChatInfo,
        crate::services::chat::MessageInfo,
        crate::services::chat::MediaInfo,
        crate::services::chat::CreateChatRequest,
        crate::services::chat::SendMessageRequest,
        crate::services::chat::ExportInfo,
        crate::services::maintenance::CleanupReport,
        crate::services::maintenance::CleanupDetail,
        crate::services::maintenance::BackupReport,
        crate::services::maintenance::BackupEntry,
    )),
    tags(
        (name = "Health", description = "健康检查相关接口"),
        (name = "Auth", description = "认证相关接口"),
        (name = "User", description = "用户管理相关接口"),
        (name = "Knowledge", description = "知识库相关接口"),
        (name = "Emergency Flow", description = "应急流程相关接口"),
        (name = "Troubleshooting", description = "故障排查问答相关接口"),
        (name = "Chat", description = "聊天记录相关接口"),
        (name = "Tech Support", description = "技术支持维护接口"),
    )
)]
pub struct ApiDoc;

/// 配置全部路由：根路径、/health、/api 以及 Swagger UI
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health::root))
        .route("/health", web::get().to(health::plain_health))
        .service(
            SwaggerUi::new("/api/docs/{_:.*}").url("/api/openapi.json", ApiDoc::openapi()),
        )
        .service(
            web::scope("/api")
                .configure(handlers::configure_health_routes)
                .configure(handlers::configure_auth_routes)
                .configure(handlers::configure_knowledge_routes)
                .configure(handlers::configure_emergency_flow_routes)
                .configure(handlers::configure_troubleshooting_routes)
                .configure(handlers::configure_chat_routes)
                .configure(handlers::configure_tech_support_routes),
        );
}
