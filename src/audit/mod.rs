// 审计日志模块
// 请求审计记录、定时写出与日志轮转

pub mod logger;
pub mod middleware;
pub mod rotator;

#[cfg(test)]
mod tests;

pub use logger::{mask_value, AuditEntry, AuditLogger};
pub use middleware::AuditMiddleware;
pub use rotator::{AuditRotator, RotationOutcome};
