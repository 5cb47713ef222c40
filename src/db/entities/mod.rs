// 数据库实体模块
// 包含所有 SeaORM 实体定义

pub mod user;

// 聊天记录
pub mod chat;
pub mod message;
pub mod media;
pub mod chat_export;

// 知识库与故障排查流程
pub mod document;
pub mod emergency_flow;

pub mod prelude;
pub use prelude::*;
