// 实体预导入模块
// 提供便捷的实体导入

pub use super::chat::{ActiveModel as ChatActiveModel, Entity as Chat, Model as ChatModel};
pub use super::chat_export::{
    ActiveModel as ChatExportActiveModel, Entity as ChatExport, Model as ChatExportModel,
};
pub use super::document::{
    ActiveModel as DocumentActiveModel, Entity as Document, Model as DocumentModel,
};
pub use super::emergency_flow::{
    ActiveModel as EmergencyFlowActiveModel, Entity as EmergencyFlow, Model as EmergencyFlowModel,
};
pub use super::media::{ActiveModel as MediaActiveModel, Entity as Media, Model as MediaModel};
pub use super::message::{
    ActiveModel as MessageActiveModel, Entity as Message, Model as MessageModel,
};
pub use super::user::{ActiveModel as UserActiveModel, Entity as User, Model as UserModel, UserRole};
