// 故障排查处理器：流程搜索与问答

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::responses::HttpResponseBuilder;
use crate::errors::{AssistError, AssistResult};
use crate::flow::{FlowDocument, FlowStore, FlowSummary};
use crate::services::troubleshooting::{QaAnswer, QaResponse, TroubleshootingQa};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartQaRequest {
    pub problem: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerQaRequest {
    pub problem: String,
    #[serde(default)]
    pub previous_answers: Vec<QaAnswer>,
    pub current_answer: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SolutionRequest {
    pub problem: String,
    #[serde(default)]
    pub answers: Vec<QaAnswer>,
}

fn require(field: &str, value: &str) -> AssistResult<()> {
    if value.trim().is_empty() {
        return Err(AssistError::validation(field, format!("{} 不能为空", field)));
    }
    Ok(())
}

/// 按标题、描述、关键字搜索流程
#[utoipa::path(
    post,
    path = "/api/troubleshooting/search",
    tag = "Troubleshooting",
    request_body = SearchRequest,
    responses((status = 200, description = "匹配的流程", body = [FlowSummary]))
)]
pub async fn search_flows(
    store: web::Data<dyn FlowStore>,
    body: web::Json<SearchRequest>,
) -> AssistResult<HttpResponse> {
    let results: Vec<FlowSummary> = store
        .search(body.query.trim())
        .await?
        .iter()
        .map(FlowDocument::summary)
        .collect();
    HttpResponseBuilder::ok(json!({ "query": body.query, "results": results }))
}

#[utoipa::path(
    post,
    path = "/api/troubleshooting/qa/start",
    tag = "Troubleshooting",
    request_body = StartQaRequest,
    responses((status = 200, description = "第一个问题", body = QaResponse))
)]
pub async fn start_qa(
    qa: web::Data<TroubleshootingQa>,
    body: web::Json<StartQaRequest>,
) -> AssistResult<HttpResponse> {
    require("problem", &body.problem)?;
    HttpResponseBuilder::ok(qa.start(&body.problem).await)
}

#[utoipa::path(
    post,
    path = "/api/troubleshooting/qa/answer",
    tag = "Troubleshooting",
    request_body = AnswerQaRequest,
    responses((status = 200, description = "下一个问题、解决方案或紧急处理", body = QaResponse))
)]
pub async fn answer_qa(
    qa: web::Data<TroubleshootingQa>,
    body: web::Json<AnswerQaRequest>,
) -> AssistResult<HttpResponse> {
    require("problem", &body.problem)?;
    require("currentAnswer", &body.current_answer)?;
    let response = qa
        .process_answer(&body.problem, &body.previous_answers, &body.current_answer)
        .await;
    HttpResponseBuilder::ok(response)
}

#[utoipa::path(
    post,
    path = "/api/troubleshooting/qa/solution",
    tag = "Troubleshooting",
    request_body = SolutionRequest,
    responses((status = 200, description = "解决方案文本"))
)]
pub async fn generate_solution(
    qa: web::Data<TroubleshootingQa>,
    body: web::Json<SolutionRequest>,
) -> AssistResult<HttpResponse> {
    require("problem", &body.problem)?;
    let solution = qa.generate_solution(&body.problem, &body.answers).await;
    HttpResponseBuilder::ok(json!({ "solution": solution }))
}

pub fn configure_troubleshooting_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/troubleshooting")
            .route("/search", web::post().to(search_flows))
            .route("/qa/start", web::post().to(start_qa))
            .route("/qa/answer", web::post().to(answer_qa))
            .route("/qa/solution", web::post().to(generate_solution)),
    );
}
