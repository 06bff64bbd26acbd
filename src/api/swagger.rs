use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Member Portal API",
        version = "1.0.0",
        description = "Member directory, authentication and quiz-to-avatar API.\n\n**Authentication:** protected endpoints expect a JWT Bearer token from `/auth/login` or `/auth/signup`.\n\n**Errors:** every failure returns `{\"success\": false, \"error\": \"...\"}`."
    ),
    paths(
        // Auth
        crate::api::auth::signup,
        crate::api::auth::login,
        crate::api::auth::verify,
        crate::api::auth::moderation,
        crate::api::auth::admin,
        crate::api::auth::request_password_reset,
        crate::api::auth::confirm_password_reset,

        // Users
        crate::api::users::list_users,
        crate::api::users::search_users,
        crate::api::users::update_user,
        crate::api::users::delete_user,
        crate::api::users::preview_import,
        crate::api::users::import_users,
        crate::api::users::update_image,

        // Quiz
        crate::api::cla::get_config,
        crate::api::cla::update_config,
        crate::api::cla::submit_answers,
        crate::api::cla::get_results,

        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            // Auth
            crate::services::auth_service::SignupRequest,
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::ResetPasswordRequest,
            crate::services::auth_service::ResetPasswordConfirmRequest,
            crate::services::auth_service::AuthResponse,
            crate::services::auth_service::SessionUser,
            crate::api::auth::VerifyResponse,
            crate::api::auth::MessageResponse,

            // Users
            crate::models::Role,
            crate::models::PublicUser,
            crate::models::UserPatch,
            crate::models::DirectoryPage,
            crate::api::users::UserResponse,
            crate::api::users::DirectoryResponse,
            crate::api::users::ImportResponse,
            crate::api::users::PreviewResponse,
            crate::services::import_service::FieldKey,
            crate::services::import_service::ColumnMapping,
            crate::services::import_service::ImportRow,
            crate::services::import_service::ImportUser,
            crate::services::import_service::ImportReport,
            crate::services::import_service::ImportPreviewRequest,
            crate::services::import_service::ImportPreview,

            // Quiz
            crate::models::ClaOption,
            crate::models::ClaQuestion,
            crate::models::ClaConfigView,
            crate::models::ClaResponseView,
            crate::models::UpdateClaConfigRequest,
            crate::models::SubmitAnswersRequest,
            crate::api::cla::ConfigResponse,
            crate::api::cla::SubmitResponse,
            crate::api::cla::ResultsResponse,

            // Health
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Signup, login, token verification, role probes and password reset."),
        (name = "Users", description = "Member directory for moderators and admins: paging, search, edits and bulk import."),
        (name = "Quiz", description = "Quiz configuration, answer submission and generated avatars."),
        (name = "Health", description = "Liveness and database connectivity."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token returned by /auth/login"))
                        .build()
                ),
            );
        }
    }
}
