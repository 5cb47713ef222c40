// 日志系统测试

#[cfg(test)]
mod tests {
    use crate::errors::RequestId;
    use crate::logging::{LoggingSetup, RequestContext};
    use actix_web::HttpMessage;

    #[test]
    fn test_cli_config() {
        let config = LoggingSetup::cli_config();
        assert_eq!(config.format, "compact");
        assert!(!config.file_enabled);
    }

    #[test]
    fn test_env_filter_falls_back_on_invalid_level() {
        // 无效的指令不会导致 panic
        let filter = LoggingSetup::env_filter("not=a=level");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_context_prefers_forwarded_ip() {
        let req = actix_web::test::TestRequest::get()
            .uri("/api/health")
            .insert_header(("x-forwarded-for", "10.0.0.1, 172.16.0.1"))
            .insert_header(("user-agent", "curl/8.0"))
            .peer_addr("192.168.1.5:4000".parse().unwrap())
            .to_http_request();

        let ctx = RequestContext::from_http_request(&req);
        assert_eq!(ctx.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(ctx.method, "GET");
        assert_eq!(ctx.path, "/api/health");
    }

    #[test]
    fn test_context_falls_back_to_peer_addr() {
        let req = actix_web::test::TestRequest::get()
            .peer_addr("192.168.1.5:4000".parse().unwrap())
            .to_http_request();

        let ctx = RequestContext::from_http_request(&req);
        assert_eq!(ctx.ip_address.as_deref(), Some("192.168.1.5"));
    }

    #[test]
    fn test_context_ids() {
        let req = actix_web::test::TestRequest::get()
            .insert_header(("x-request-id", "req-1"))
            .to_http_request();
        let ctx = RequestContext::from_http_request(&req);
        assert_eq!(ctx.request_id, "req-1");
        assert_eq!(ctx.correlation_id, "req-1");

        let req = actix_web::test::TestRequest::get()
            .insert_header(("x-correlation-id", "corr-9"))
            .to_http_request();
        req.extensions_mut().insert(RequestId("from-ext".to_string()));
        let ctx = RequestContext::from_http_request(&req);
        assert_eq!(ctx.request_id, "from-ext");
        assert_eq!(ctx.correlation_id, "corr-9");
    }
}
