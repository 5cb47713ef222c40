// 应急流程模块
// 流程数据模型、结构校验、存储后端与步骤图片

pub mod images;
pub mod model;
pub mod store;
pub mod validator;


pub use images::{FlowImageStore, UploadedImage};
pub use model::*;
pub use store::{validate_flow_id, DbFlowStore, FileFlowStore, FlowStore};
pub use validator::{auto_fix_flow_data, detect_cycle, validate_flow, validate_flow_data};
