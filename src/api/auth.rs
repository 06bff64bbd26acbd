use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::middleware::auth::bearer_token;
use crate::services::auth_service::{
    AuthResponse, LoginRequest, ResetPasswordConfirmRequest, ResetPasswordRequest, SessionUser,
    SignupRequest,
};
use crate::services::AuthService;
use crate::utils::error::AppError;

#[derive(Serialize, utoipa::ToSchema)]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(flatten)]
    pub user: SessionUser,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input or captcha"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    req: HttpRequest,
    service: web::Data<AuthService>,
    request: web::Json<SignupRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("📝 POST /auth/signup - email: {}", request.email);

    let remote_ip = req.connection_info().realip_remote_addr().map(str::to_string);
    let response = service.signup(&request, remote_ip.as_deref()).await?;

    log::info!("✅ Signup successful: {}", response.user.email);
    Ok(HttpResponse::Created().json(response))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "Unknown email"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔐 POST /auth/login - email: {}", request.email);

    match service.login(&request).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", request.email);
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/auth/verify",
    tag = "Auth",
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Invalid or expired token")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn verify(req: HttpRequest, service: web::Data<AuthService>) -> Result<HttpResponse, AppError> {
    log::info!("✓ GET /auth/verify");

    let token = bearer_token(req.headers()).ok_or_else(|| AppError::auth("Missing authorization token"))?;
    let user = service.verify(token).await?;

    Ok(HttpResponse::Ok().json(VerifyResponse { success: true, user }))
}

#[utoipa::path(
    get,
    path = "/auth/moderation",
    tag = "Auth",
    responses(
        (status = 200, description = "Caller is a moderator or admin", body = MessageResponse),
        (status = 401, description = "You shall not pass!")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn moderation() -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse::ok("Access granted to moderators and admin users"))
}

#[utoipa::path(
    get,
    path = "/auth/admin",
    tag = "Auth",
    responses(
        (status = 200, description = "Caller is an admin", body = MessageResponse),
        (status = 401, description = "You shall not pass!")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn admin() -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse::ok("Access granted to admin users"))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Reset email sent", body = MessageResponse),
        (status = 404, description = "Unknown email"),
        (status = 502, description = "Mail provider failed")
    )
)]
pub async fn request_password_reset(
    service: web::Data<AuthService>,
    request: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔑 POST /auth/reset-password - email: {}", request.email);

    service.request_password_reset(&request.email).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Email sent")))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password/{token}",
    tag = "Auth",
    params(
        ("token" = String, Path, description = "Token from the reset email")
    ),
    request_body = ResetPasswordConfirmRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Weak password"),
        (status = 401, description = "Invalid or expired token")
    )
)]
pub async fn confirm_password_reset(
    service: web::Data<AuthService>,
    token: web::Path<String>,
    request: web::Json<ResetPasswordConfirmRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔑 POST /auth/reset-password/{{token}}");

    service.confirm_password_reset(&token, &request.password).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Password reset successfully")))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{bearer, test_app, TestContext};
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    fn signup_body(email: &str) -> Value {
        json!({
            "email": email,
            "password": "Passw0rd",
            "firstName": "jane",
            "lastName": "doe",
            "recaptchaToken": "ok"
        })
    }

    #[actix_web::test]
    async fn test_signup_then_verify() {
        let ctx = TestContext::new();
        let app = test::init_service(test_app(&ctx)).await;

        let req = test::TestRequest::post()
            .uri("/auth/signup")
            .set_json(signup_body("jane@example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let token = body["authToken"].as_str().unwrap().to_string();
        assert_eq!(body["user"]["firstName"], "Jane");
        assert!(body["user"].get("password").is_none());

        let req = test::TestRequest::get()
            .uri("/auth/verify")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["email"], "jane@example.com");
        assert!(body.get("role").is_none());
    }

    #[actix_web::test]
    async fn test_signup_errors_use_envelope() {
        let ctx = TestContext::new();
        let app = test::init_service(test_app(&ctx)).await;

        let mut body = signup_body("jane@example.com");
        body["password"] = json!("weak");
        let req = test::TestRequest::post().uri("/auth/signup").set_json(body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Password must"));

        let req = test::TestRequest::post()
            .uri("/auth/signup")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_duplicate_signup_conflicts() {
        let ctx = TestContext::new();
        let app = test::init_service(test_app(&ctx)).await;

        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let req = test::TestRequest::post()
                .uri("/auth/signup")
                .set_json(signup_body("jane@example.com"))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), expected);
        }
    }

    #[actix_web::test]
    async fn test_login_status_codes() {
        let ctx = TestContext::new();
        let app = test::init_service(test_app(&ctx)).await;
        let req = test::TestRequest::post()
            .uri("/auth/signup")
            .set_json(signup_body("jane@example.com"))
            .to_request();
        test::call_service(&app, req).await;

        let cases = [
            (json!({"email": "jane@example.com", "password": "Passw0rd"}), StatusCode::OK),
            (json!({"email": "jane@example.com", "password": "Nope1234"}), StatusCode::UNAUTHORIZED),
            (json!({"email": "ghost@example.com", "password": "Passw0rd"}), StatusCode::NOT_FOUND),
            (json!({"email": "", "password": ""}), StatusCode::BAD_REQUEST),
        ];
        for (body, expected) in cases {
            let req = test::TestRequest::post().uri("/auth/login").set_json(body).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), expected);
        }
    }

    #[actix_web::test]
    async fn test_role_probes() {
        let ctx = TestContext::new();
        let app = test::init_service(test_app(&ctx)).await;
        let moderator = ctx.token_for("mod@example.com", crate::models::Role::Moderator).await;

        let req = test::TestRequest::get()
            .uri("/auth/moderation")
            .insert_header(bearer(&moderator))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/auth/admin")
            .insert_header(bearer(&moderator))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "You shall not pass!");

        let req = test::TestRequest::get().uri("/auth/admin").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_password_reset_flow() {
        let ctx = TestContext::new();
        let app = test::init_service(test_app(&ctx)).await;
        let req = test::TestRequest::post()
            .uri("/auth/signup")
            .set_json(signup_body("jane@example.com"))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/auth/reset-password")
            .set_json(json!({"email": "jane@example.com"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let token = ctx.mailer.last_token();

        for expected in [StatusCode::OK, StatusCode::UNAUTHORIZED] {
            let req = test::TestRequest::post()
                .uri(&format!("/auth/reset-password/{}", token))
                .set_json(json!({"password": "N3wPassword"}))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), expected);
        }
    }
}
