pub mod auth;
pub mod cla;
pub mod health;
pub mod swagger;
pub mod users;

use actix_web::{error, web};
use std::sync::Arc;

use crate::middleware::{AuthMiddleware, LoginRateLimit, LoginRateLimiter, RequireRole};
use crate::utils::error::AppError;

/// Registers every route. Services are expected as `web::Data` on the app.
pub fn routes(cfg: &mut web::ServiceConfig, login_limiter: Arc<LoginRateLimiter>) {
    // Malformed bodies and query strings use the same error envelope
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::Validation(format!("Invalid JSON body: {}", err)))
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::Validation(format!("Invalid query string: {}", err)))
    }))
    .route("/health", web::get().to(health::health_check))
    .service(
        web::scope("/auth")
            .route("/signup", web::post().to(auth::signup))
            .service(
                web::resource("/login")
                    .wrap(LoginRateLimit::new(login_limiter))
                    .route(web::post().to(auth::login)),
            )
            .route("/verify", web::get().to(auth::verify))
            .service(
                web::resource("/moderation")
                    .wrap(RequireRole::staff())
                    .wrap(AuthMiddleware::required())
                    .route(web::get().to(auth::moderation)),
            )
            .service(
                web::resource("/admin")
                    .wrap(RequireRole::admin())
                    .wrap(AuthMiddleware::required())
                    .route(web::get().to(auth::admin)),
            )
            .route("/reset-password", web::post().to(auth::request_password_reset))
            .route("/reset-password/{token}", web::post().to(auth::confirm_password_reset)),
    )
    .service(
        web::scope("/users")
            .wrap(AuthMiddleware::required())
            .service(
                web::resource("/all")
                    .wrap(RequireRole::staff())
                    .route(web::get().to(users::list_users)),
            )
            .service(
                web::resource("/search")
                    .wrap(RequireRole::staff())
                    .route(web::get().to(users::search_users)),
            )
            .service(
                web::resource("/update/{id}")
                    .wrap(RequireRole::staff())
                    .route(web::put().to(users::update_user)),
            )
            .service(
                web::resource("/delete/{id}")
                    .wrap(RequireRole::staff())
                    .route(web::delete().to(users::delete_user)),
            )
            .service(
                web::resource("/import/preview")
                    .wrap(RequireRole::staff())
                    .route(web::post().to(users::preview_import)),
            )
            .service(
                web::resource("/import")
                    .wrap(RequireRole::staff())
                    .route(web::post().to(users::import_users)),
            )
            // Self or admin, checked in the handler
            .route("/update-image/{userId}", web::put().to(users::update_image)),
    )
    .service(
        web::scope("/cla")
            .service(
                web::resource("/config")
                    .wrap(AuthMiddleware::optional())
                    .route(web::get().to(cla::get_config))
                    .route(web::post().to(cla::update_config)),
            )
            .route("/submit", web::post().to(cla::submit_answers))
            .service(
                web::resource("/results")
                    .wrap(RequireRole::admin())
                    .wrap(AuthMiddleware::required())
                    .route(web::get().to(cla::get_results)),
            ),
    );
}
