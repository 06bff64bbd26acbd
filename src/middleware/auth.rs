use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderMap},
    web, Error, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::models::Role;
use crate::services::token_service::{Claims, TokenKind, TokenSigner, INVALID_TOKEN_MESSAGE};
use crate::utils::error::AppError;

pub const FORBIDDEN_MESSAGE: &str = "You shall not pass!";

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(req: &ServiceRequest) -> Result<Claims, AppError> {
    let signer = req
        .app_data::<web::Data<TokenSigner>>()
        .ok_or_else(|| AppError::Internal("Token signer is not registered".to_string()))?;

    let token = bearer_token(req.headers()).ok_or_else(|| AppError::auth("Missing authorization token"))?;
    signer.verify(token, TokenKind::Access)
}

/// Claims inserted by [`AuthMiddleware`], if any.
pub fn request_claims(req: &HttpRequest) -> Option<Claims> {
    req.extensions().get::<Claims>().cloned()
}

/// Like [`request_claims`] but for routes behind the required middleware.
pub fn require_claims(req: &HttpRequest) -> Result<Claims, AppError> {
    request_claims(req).ok_or_else(|| AppError::auth(INVALID_TOKEN_MESSAGE))
}

/// In-handler role check for resources that mix public and gated methods.
pub fn require_role(req: &HttpRequest, roles: &[Role]) -> Result<Claims, AppError> {
    let claims = require_claims(req)?;
    if !claims.has_role(roles) {
        return Err(AppError::auth(FORBIDDEN_MESSAGE));
    }
    Ok(claims)
}

/// Verifies the bearer token and stores its [`Claims`] in the request
/// extensions. In optional mode a missing or bad token just leaves the
/// request anonymous.
#[derive(Clone, Copy)]
pub struct AuthMiddleware {
    optional: bool,
}

impl AuthMiddleware {
    pub fn required() -> Self {
        Self { optional: false }
    }

    pub fn optional() -> Self {
        Self { optional: true }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            optional: self.optional,
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    optional: bool,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authenticate(&req) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
            }
            Err(e) if !self.optional => {
                log::debug!("🔒 Rejected {} {}: {}", req.method(), req.path(), e);
                let (request, _) = req.into_parts();
                let response = actix_web::ResponseError::error_response(&e).map_into_right_body();
                return Box::pin(async move { Ok(ServiceResponse::new(request, response)) });
            }
            Err(_) => {}
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Lets the request through only if the verified claims carry one of the
/// given roles. Must sit inside [`AuthMiddleware`].
#[derive(Clone)]
pub struct RequireRole {
    roles: Rc<Vec<Role>>,
}

impl RequireRole {
    pub fn any(roles: &[Role]) -> Self {
        Self {
            roles: Rc::new(roles.to_vec()),
        }
    }

    pub fn staff() -> Self {
        Self::any(&[Role::Moderator, Role::Admin])
    }

    pub fn admin() -> Self {
        Self::any(&[Role::Admin])
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireRoleService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRoleService {
            service,
            roles: Rc::clone(&self.roles),
        }))
    }
}

pub struct RequireRoleService<S> {
    service: S,
    roles: Rc<Vec<Role>>,
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let allowed = req
            .extensions()
            .get::<Claims>()
            .map(|claims| claims.has_role(&self.roles));

        let rejection = match allowed {
            Some(true) => None,
            Some(false) => Some(AppError::auth(FORBIDDEN_MESSAGE)),
            None => Some(AppError::auth(INVALID_TOKEN_MESSAGE)),
        };

        if let Some(e) = rejection {
            log::warn!("⛔ {} {} denied: {}", req.method(), req.path(), e);
            let (request, _) = req.into_parts();
            let response = actix_web::ResponseError::error_response(&e).map_into_right_body();
            return Box::pin(async move { Ok(ServiceResponse::new(request, response)) });
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::services::token_service::test_signer;
    use actix_web::{http::StatusCode, test, App, HttpResponse};
    use mongodb::bson::oid::ObjectId;

    async fn whoami(req: HttpRequest) -> HttpResponse {
        match request_claims(&req) {
            Some(claims) => HttpResponse::Ok().body(claims.sub),
            None => HttpResponse::Ok().body("anonymous"),
        }
    }

    fn token_for(role: Role) -> String {
        let mut user = User::new(
            "a@b.co".into(),
            "hash".into(),
            "A".into(),
            "B".into(),
            role,
            None,
        );
        user.id = Some(ObjectId::new());
        test_signer().issue_access(&user).unwrap()
    }

    #[actix_web::test]
    async fn test_required_auth_rejects_missing_token() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_signer()))
                .service(
                    web::resource("/me")
                        .wrap(AuthMiddleware::required())
                        .route(web::get().to(whoami)),
                ),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token_for(Role::User))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_reset_token_is_not_an_access_token() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_signer()))
                .service(
                    web::resource("/me")
                        .wrap(AuthMiddleware::required())
                        .route(web::get().to(whoami)),
                ),
        )
        .await;

        let reset = test_signer().issue_reset(&ObjectId::new()).unwrap();
        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", reset)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_optional_auth_allows_anonymous() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_signer()))
                .service(
                    web::resource("/me")
                        .wrap(AuthMiddleware::optional())
                        .route(web::get().to(whoami)),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((header::AUTHORIZATION, "Bearer garbage"))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "anonymous");
    }

    #[actix_web::test]
    async fn test_role_gate() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_signer()))
                .service(
                    web::resource("/admin")
                        .wrap(RequireRole::admin())
                        .wrap(AuthMiddleware::required())
                        .route(web::get().to(whoami)),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token_for(Role::Moderator))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], FORBIDDEN_MESSAGE);

        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token_for(Role::Admin))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
