// 服务层模块
// 包含所有业务逻辑服务

pub mod auth;
pub mod blob;
pub mod chat;
pub mod chunker;
pub mod knowledge;
pub mod llm;
pub mod maintenance;
pub mod troubleshooting;

pub use auth::*;
pub use blob::{upload_with_retry, AzureBlobUploader, BlobUploader};
pub use chat::*;
pub use chunker::{ChunkerConfig, TextChunk, TextChunker};
pub use knowledge::*;
pub use llm::{LlmClient, OpenAiChatClient};
pub use maintenance::{BackupReport, CleanupReport, MaintenanceService};
pub use troubleshooting::*;
