// 认证与用户管理处理器

use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::api::extractors::{AdminExtractor, AuthExtractor};
use crate::api::responses::HttpResponseBuilder;
use crate::errors::AssistResult;
use crate::services::auth::{AuthService, LoginRequest, LoginResponse, RegisterRequest, UserInfo};

/// 登录；成功时直接返回 { success, user, token }
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = LoginResponse),
        (status = 400, description = "缺少用户名或密码"),
        (status = 401, description = "用户名或密码错误")
    )
)]
pub async fn login(
    service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> AssistResult<HttpResponse> {
    let response = service.login(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// 当前用户
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "当前用户", body = UserInfo),
        (status = 401, description = "未登录")
    )
)]
pub async fn me(
    service: web::Data<AuthService>,
    auth: AuthExtractor,
) -> AssistResult<HttpResponse> {
    let user = service.current_user(auth.user_id).await?;
    HttpResponseBuilder::ok(user)
}

/// 令牌无状态，登出只做确认
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "已登出"))
)]
pub async fn logout() -> AssistResult<HttpResponse> {
    HttpResponseBuilder::done("已登出")
}

/// 创建用户（管理员）
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "用户已创建", body = UserInfo),
        (status = 403, description = "需要管理员权限"),
        (status = 409, description = "用户名已存在")
    )
)]
pub async fn register(
    service: web::Data<AuthService>,
    _admin: AdminExtractor,
    request: web::Json<RegisterRequest>,
) -> AssistResult<HttpResponse> {
    let user = service.register(request.into_inner()).await?;
    HttpResponseBuilder::created(user)
}

/// 用户列表（管理员）
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "User",
    responses((status = 200, description = "用户列表", body = [UserInfo]))
)]
pub async fn list_users(
    service: web::Data<AuthService>,
    _admin: AdminExtractor,
) -> AssistResult<HttpResponse> {
    HttpResponseBuilder::ok(service.list_users().await?)
}

/// 删除用户（管理员，不能删除自己）
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "User",
    params(("id" = Uuid, Path, description = "用户 ID")),
    responses(
        (status = 200, description = "已删除"),
        (status = 400, description = "不能删除自己"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn delete_user(
    service: web::Data<AuthService>,
    admin: AdminExtractor,
    path: web::Path<Uuid>,
) -> AssistResult<HttpResponse> {
    service.delete_user(admin.user_id, path.into_inner()).await?;
    HttpResponseBuilder::done("用户已删除")
}

pub fn configure_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login", web::post().to(login))
            .route("/me", web::get().to(me))
            .route("/logout", web::post().to(logout))
            .route("/register", web::post().to(register)),
    )
    .service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("/{id}", web::delete().to(delete_user)),
    );
}
