// API 处理器模块
// 包含所有 API 端点的处理逻辑

pub mod auth;
pub mod chats;
pub mod emergency_flow;
pub mod health;
pub mod knowledge;
pub mod tech_support;
pub mod troubleshooting;

#[cfg(test)]
mod tests;

pub use auth::configure_auth_routes;
pub use chats::configure_chat_routes;
pub use emergency_flow::configure_emergency_flow_routes;
pub use health::{configure_health_routes, HealthState};
pub use knowledge::configure_knowledge_routes;
pub use tech_support::configure_tech_support_routes;
pub use troubleshooting::configure_troubleshooting_routes;
