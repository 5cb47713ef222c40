// 错误处理系统测试

#[cfg(test)]
mod tests {
    use crate::errors::{AssistError, ErrorResponse, RequestId, RequestIdMiddleware};
    use actix_web::{web, App, HttpResponse};

    #[test]
    fn test_error_creation() {
        let error = AssistError::validation("username", "用户名不能为空");
        assert_eq!(error.error_code(), "VALIDATION_ERROR");
        assert_eq!(error.status_code(), 400);
        assert!(error.is_client_error());
        assert!(!error.is_server_error());
    }

    #[test]
    fn test_database_error() {
        let error = AssistError::database_with_code("连接失败", "23505");
        assert_eq!(error.error_code(), "DATABASE_ERROR");
        assert_eq!(error.status_code(), 500);
        assert!(error.is_server_error());
    }

    #[test]
    fn test_llm_error() {
        let error = AssistError::llm_with_model("模型不可用", "gpt-4");
        assert_eq!(error.error_code(), "LLM_ERROR");
        assert_eq!(error.status_code(), 502);

        let response = ErrorResponse::from_error(&error);
        assert_eq!(response.error.details.unwrap()["model"], "gpt-4");
    }

    #[test]
    fn test_error_logging() {
        assert!(!AssistError::validation("field", "message").should_log());
        assert!(!AssistError::not_found("流程").should_log());
        assert!(!AssistError::authentication("令牌缺失").should_log());
        assert!(AssistError::internal("something went wrong").should_log());
    }

    #[test]
    fn test_error_response_creation() {
        let error = AssistError::validation("title", "标题不能为空");
        let response = ErrorResponse::from_error(&error);

        assert!(!response.success);
        assert_eq!(response.status(), 400);
        assert_eq!(response.error.code, "VALIDATION_ERROR");
        assert!(response.error.message.contains("标题不能为空"));
        assert_eq!(response.error.details.unwrap()["field"], "title");
    }

    #[test]
    fn test_error_response_with_request_id() {
        let error = AssistError::internal("测试错误");
        let response = ErrorResponse::from_error(&error).with_request_id("req-123");
        assert_eq!(response.request_id.as_deref(), Some("req-123"));

        let http = response.into_http_response();
        assert_eq!(http.status().as_u16(), 500);
        assert_eq!(http.headers().get("X-Request-ID").unwrap(), "req-123");
    }

    #[test]
    fn test_common_error_conversion() {
        let common_error = emergency_assist_common::CommonError::validation("测试验证错误");
        let error: AssistError = common_error.into();
        assert_eq!(error.error_code(), "VALIDATION_ERROR");

        let common_error = emergency_assist_common::CommonError::new("SOMETHING", "x");
        let error: AssistError = common_error.into();
        assert_eq!(error.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_io_error_conversion() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "文件未找到");
        assert_eq!(AssistError::from(not_found).status_code(), 404);

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "拒绝");
        assert_eq!(AssistError::from(denied).status_code(), 403);

        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "超时");
        assert_eq!(AssistError::from(timed_out).status_code(), 408);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: AssistError = json_error.into();
        assert_eq!(error.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_uuid_error_conversion() {
        let uuid_error = uuid::Uuid::parse_str("invalid-uuid").unwrap_err();
        let error: AssistError = uuid_error.into();
        assert_eq!(error.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_timeout_error() {
        let error = AssistError::timeout("数据库查询");
        assert_eq!(error.status_code(), 408);

        let response = ErrorResponse::from_error(&error);
        assert_eq!(response.error.details.unwrap()["operation"], "数据库查询");
    }

    #[test]
    fn test_service_unavailable_is_logged() {
        let error = AssistError::service_unavailable("LLM 服务繁忙");
        assert_eq!(error.status_code(), 503);
        assert_eq!(error.error_code(), "SERVICE_UNAVAILABLE");
        assert!(error.should_log());
    }

    #[actix_web::test]
    async fn test_request_id_is_echoed() {
        let app = actix_web::test::init_service(
            App::new()
                .wrap(RequestIdMiddleware)
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = actix_web::test::TestRequest::get()
            .uri("/")
            .insert_header(("x-request-id", "abc-123"))
            .to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert_eq!(resp.headers().get("x-request-id").unwrap(), "abc-123");

        let req = actix_web::test::TestRequest::get().uri("/").to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        let generated = resp.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert_eq!(generated.len(), 36);
    }

    #[test]
    fn test_request_id_generate_is_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }
}
