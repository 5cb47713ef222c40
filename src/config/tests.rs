// 配置系统测试

#[cfg(test)]
mod tests {
    use crate::config::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.ai.model, "gpt-4");
        assert_eq!(config.audit.flush_interval_ms, 2000);
        assert_eq!(config.audit.rotate_max_bytes, 5_000_000);
        assert_eq!(config.audit.rotate_interval_secs, 300);
        assert_eq!(config.storage.log_backup_retention_months, 6);
        // 令牌有效期以秒计
        assert_eq!(config.security.jwt_expiration, 86400);
        assert!(!config.blob.is_configured());
        assert!(!config.ai.is_configured());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = AppConfig::default();

        config.server.port = 0;
        assert!(config.validate().is_err());

        config.server.port = 8080;
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        config.database.max_connections = 10;
        config.ai.temperature = 3.0;
        assert!(config.validate().is_err());

        config.ai.temperature = 0.1;
        config.storage.flow_backend = "redis".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_all_collects_every_error() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        config.security.jwt_secret = "short".to_string();
        config.audit.flush_interval_ms = 0;

        let errors = ConfigValidator::validate_all(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_environment_methods() {
        let mut config = AppConfig::default();

        config.environment.name = "development".to_string();
        assert!(config.is_development());
        assert!(!config.is_production());
        assert!(!config.is_test());

        config.environment.name = "production".to_string();
        assert!(config.is_production());

        config.environment.name = "test".to_string();
        assert!(config.is_test());
    }

    #[test]
    fn test_config_validator_security() {
        let mut security_config = SecurityConfig {
            jwt_secret: "a".repeat(32),
            jwt_expiration: 3600,
            bcrypt_cost: 10,
            cors_origins: vec!["*".to_string()],
        };

        assert!(ConfigValidator::validate_security(&security_config).is_ok());

        security_config.jwt_secret = "short".to_string();
        assert!(ConfigValidator::validate_security(&security_config).is_err());

        security_config.jwt_secret = "a".repeat(32);
        security_config.bcrypt_cost = 50;
        assert!(ConfigValidator::validate_security(&security_config).is_err());

        security_config.bcrypt_cost = 10;
        security_config.jwt_expiration = 86400 * 30;
        assert!(ConfigValidator::validate_security(&security_config).is_ok());
        security_config.jwt_expiration = 86400 * 30 + 1;
        assert!(ConfigValidator::validate_security(&security_config).is_err());
    }

    #[test]
    fn test_config_validator_blob() {
        let mut blob = AppConfig::default().blob;
        assert!(ConfigValidator::validate_blob(&blob).is_ok());

        blob.account_url = Some("not a url".to_string());
        assert!(ConfigValidator::validate_blob(&blob).is_err());

        blob.account_url = Some("https://acct.blob.core.windows.net".to_string());
        assert!(ConfigValidator::validate_blob(&blob).is_ok());
        assert!(blob.is_configured());
    }

    #[test]
    fn test_audit_path_prefix_resolution() {
        let mut audit = AppConfig::default().audit;
        assert_eq!(audit.resolved_path_prefix(), "");

        audit.container = "knowledge".to_string();
        assert_eq!(audit.resolved_path_prefix(), "userlog/");

        audit.path_prefix = Some("archive/audit".to_string());
        assert_eq!(audit.resolved_path_prefix(), "archive/audit/");

        audit.path_prefix = Some("logs/".to_string());
        assert_eq!(audit.resolved_path_prefix(), "logs/");
    }
}
