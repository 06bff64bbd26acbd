use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::middleware::auth::{request_claims, require_role};
use crate::models::{
    ClaConfigView, ClaResponseView, Role, SubmitAnswersRequest, UpdateClaConfigRequest,
};
use crate::services::ClaService;
use crate::utils::error::AppError;

#[derive(Serialize, utoipa::ToSchema)]
pub struct ConfigResponse {
    pub success: bool,
    pub config: ClaConfigView,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    pub success: bool,
    pub response: ClaResponseView,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ResultsResponse {
    pub success: bool,
    pub count: usize,
    pub results: Vec<ClaResponseView>,
}

#[utoipa::path(
    get,
    path = "/cla/config",
    tag = "Quiz",
    responses(
        (status = 200, description = "Current quiz; the security code is only shown to admins", body = ConfigResponse),
        (status = 404, description = "No quiz configured yet")
    )
)]
pub async fn get_config(req: HttpRequest, service: web::Data<ClaService>) -> Result<HttpResponse, AppError> {
    let is_admin = request_claims(&req).map_or(false, |c| c.has_role(&[Role::Admin]));
    log::info!("🧩 GET /cla/config - admin: {}", is_admin);

    let config = service.get_config(is_admin).await?;
    Ok(HttpResponse::Ok().json(ConfigResponse { success: true, config }))
}

#[utoipa::path(
    post,
    path = "/cla/config",
    tag = "Quiz",
    request_body = UpdateClaConfigRequest,
    responses(
        (status = 200, description = "Quiz saved", body = ConfigResponse),
        (status = 400, description = "Not 5 questions of 4 options, or missing code/template"),
        (status = 401, description = "Admins only")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_config(
    req: HttpRequest,
    service: web::Data<ClaService>,
    request: web::Json<UpdateClaConfigRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🧩 POST /cla/config");
    require_role(&req, &[Role::Admin])?;

    let config = service.update_config(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ConfigResponse { success: true, config }))
}

#[utoipa::path(
    post,
    path = "/cla/submit",
    tag = "Quiz",
    request_body = SubmitAnswersRequest,
    responses(
        (status = 200, description = "Avatar generated and stored", body = SubmitResponse),
        (status = 400, description = "Wrong number of answers"),
        (status = 401, description = "Wrong security code"),
        (status = 404, description = "No quiz configured yet"),
        (status = 502, description = "Image generation or storage failed")
    )
)]
pub async fn submit_answers(
    service: web::Data<ClaService>,
    request: web::Json<SubmitAnswersRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🧩 POST /cla/submit - name: {}", request.name);

    let response = service.submit_answers(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(SubmitResponse { success: true, response }))
}

#[utoipa::path(
    get,
    path = "/cla/results",
    tag = "Quiz",
    responses(
        (status = 200, description = "All submissions, newest first", body = ResultsResponse),
        (status = 401, description = "Admins only")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_results(service: web::Data<ClaService>) -> Result<HttpResponse, AppError> {
    log::info!("🧩 GET /cla/results");

    let results = service.get_results().await?;
    Ok(HttpResponse::Ok().json(ResultsResponse {
        success: true,
        count: results.len(),
        results,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{bearer, test_app, TestContext};
    use crate::models::Role;
    use crate::services::cla_service::tests::questions;
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    fn config_body() -> Value {
        json!({
            "securityCode": "4242",
            "questions": questions(),
            "promptTemplate": "{{ name }} {{ answer1 }} {{ answer5 }}"
        })
    }

    #[actix_web::test]
    async fn test_config_visibility() {
        let ctx = TestContext::new();
        let app = test::init_service(test_app(&ctx)).await;
        let admin = ctx.token_for("boss@example.com", Role::Admin).await;
        let user = ctx.token_for("ann@example.com", Role::User).await;

        let req = test::TestRequest::get().uri("/cla/config").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/cla/config")
            .insert_header(bearer(&user))
            .set_json(config_body())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/cla/config")
            .insert_header(bearer(&admin))
            .set_json(config_body())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/cla/config").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["config"].get("securityCode").is_none());

        let req = test::TestRequest::get()
            .uri("/cla/config")
            .insert_header(bearer(&admin))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["config"]["securityCode"], "4242");
    }

    #[actix_web::test]
    async fn test_submit_and_results() {
        let ctx = TestContext::new();
        let app = test::init_service(test_app(&ctx)).await;
        let admin = ctx.token_for("boss@example.com", Role::Admin).await;

        let req = test::TestRequest::post()
            .uri("/cla/config")
            .insert_header(bearer(&admin))
            .set_json(config_body())
            .to_request();
        test::call_service(&app, req).await;

        let submission = |code: &str| {
            json!({
                "name": "Ada",
                "gender": "female",
                "securityCode": code,
                "answers": ["a", "b", "c", "d", "zzz"]
            })
        };

        let req = test::TestRequest::post()
            .uri("/cla/submit")
            .set_json(submission("nope"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/cla/submit")
            .set_json(submission("4242"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["response"]["renderedPrompt"], "Ada Q1-A unknown answer");

        let req = test::TestRequest::get().uri("/cla/results").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/cla/results")
            .insert_header(bearer(&admin))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
    }
}
