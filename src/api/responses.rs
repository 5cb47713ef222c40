// 统一响应构建
// 成功响应使用 { success, data, message, error, timestamp, request_id } 信封，
// 失败响应由 AssistError 的 ResponseError 实现生成

use actix_web::HttpResponse;
use emergency_assist_common::ApiResponse;
use serde::Serialize;

use crate::errors::AssistResult;

pub struct HttpResponseBuilder;

impl HttpResponseBuilder {
    /// 200 成功响应
    pub fn ok<T: Serialize>(data: T) -> AssistResult<HttpResponse> {
        Ok(HttpResponse::Ok().json(ApiResponse::success(data)))
    }

    /// 201 创建成功响应
    pub fn created<T: Serialize>(data: T) -> AssistResult<HttpResponse> {
        Ok(HttpResponse::Created().json(ApiResponse::success(data)))
    }

    /// 带提示信息的成功响应
    pub fn message<T: Serialize>(
        data: T,
        message: impl Into<String>,
    ) -> AssistResult<HttpResponse> {
        Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(data, message)))
    }

    /// 只带提示信息的成功响应
    pub fn done(message: impl Into<String>) -> AssistResult<HttpResponse> {
        Self::message(serde_json::Value::Null, message)
    }
}
