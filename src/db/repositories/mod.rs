// 数据库仓储模块
// 提供数据访问层的抽象

pub mod user;
pub mod chat;
pub mod document;
pub mod emergency_flow;

pub use user::{NewUser, UserRepository};
pub use chat::{ChatExportRepository, ChatRepository, MessageWithMedia, NewMedia};
pub use document::DocumentRepository;
pub use emergency_flow::EmergencyFlowRepository;
