use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storyboard Service API",
        version = "1.0.0",
        description = "API for the AI storyboard backend.\n\n**Features:**\n- Account signup, login, listing and removal\n- Story to video generation with per-user history\n- Health monitoring and metrics",
        contact(
            name = "Storyboard Service Team",
            email = "support@storyboard-service.com"
        )
    ),
    paths(
        // Health & Metrics
        crate::api::health::root,
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,

        // Users
        crate::api::users::signup,
        crate::api::users::login,
        crate::api::users::all_users,
        crate::api::users::delete_user,

        // Storyboards
        crate::api::storyboards::generate,
        crate::api::storyboards::get_storyboards,
    ),
    components(
        schemas(
            crate::api::health::RootResponse,
            crate::api::health::HealthResponse,
            crate::models::SignupRequest,
            crate::models::LoginRequest,
            crate::models::GenerateStoryboardRequest,
            crate::models::Storyboard,
            crate::models::SuccessResponse,
            crate::models::PaginatedSuccessResponse,
            crate::models::Pagination,
            crate::models::ErrorResponse,
            crate::models::ErrorDetail,
        )
    ),
    tags(
        (name = "Health", description = "Health check and system metrics endpoints for monitoring service status."),
        (name = "User", description = "Account management. Passwords are compared as stored and never echoed back."),
        (name = "Storyboard", description = "Story to video generation and per-user storyboard history."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/",
            "/health",
            "/user/signup",
            "/user/delete_user/{username}",
            "/storyboard/get_storyboards",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
