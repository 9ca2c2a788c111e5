use actix_web::web;

use crate::{
    database::QueryHelper,
    models::{ApiResponse, ErrorResponse, LoginRequest, SignupRequest, SuccessResponse},
    services::user_service,
};

#[utoipa::path(
    post,
    path = "/user/signup",
    tag = "User",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = SuccessResponse),
        (status = 400, description = "Invalid signup payload", body = ErrorResponse),
        (status = 409, description = "Username already exists", body = ErrorResponse),
        (status = 404, description = "Signup failed", body = ErrorResponse)
    )
)]
pub async fn signup(db: web::Data<QueryHelper>, request: web::Json<SignupRequest>) -> ApiResponse {
    log::info!("📝 POST /user/signup - username: {}", request.username);
    user_service::signup(&db, request.into_inner()).await
}

#[utoipa::path(
    post,
    path = "/user/login",
    tag = "User",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SuccessResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(db: web::Data<QueryHelper>, request: web::Json<LoginRequest>) -> ApiResponse {
    log::info!("🔐 POST /user/login - username: {}", request.username);
    user_service::login(&db, request.into_inner()).await
}

#[utoipa::path(
    get,
    path = "/user/all_users",
    tag = "User",
    responses(
        (status = 200, description = "Users retrieved", body = SuccessResponse),
        (status = 404, description = "No users found", body = ErrorResponse)
    )
)]
pub async fn all_users(db: web::Data<QueryHelper>) -> ApiResponse {
    log::info!("👥 GET /user/all_users");
    user_service::list_users(&db).await
}

#[utoipa::path(
    delete,
    path = "/user/delete_user/{username}",
    tag = "User",
    params(("username" = String, Path, description = "Account to remove")),
    responses(
        (status = 200, description = "User deleted", body = SuccessResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn delete_user(db: web::Data<QueryHelper>, path: web::Path<String>) -> ApiResponse {
    let username = path.into_inner();
    log::info!("🗑️  DELETE /user/delete_user/{}", username);
    user_service::delete_user(&db, &username).await
}
