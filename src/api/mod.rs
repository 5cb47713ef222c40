// API 模块
// 统一导出所有 API 相关组件

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod routes;

pub use extractors::*;
pub use responses::HttpResponseBuilder;
pub use routes::{configure_routes, ApiDoc};
