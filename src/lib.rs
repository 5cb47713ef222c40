// Emergency Assist 库
// 导出主要模块供服务入口、CLI 工具与测试使用

pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod errors;
pub mod flow;
pub mod logging;
pub mod services;
