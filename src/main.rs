mod api;
mod config;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::database::{ClaStore, MongoClaStore, MongoUserStore, UserStore};
use crate::middleware::LoginRateLimiter;
use crate::services::blob_service::{AzureBlobStorage, BlobStorage, DisabledBlobStorage};
use crate::services::captcha_service::{CaptchaVerifier, PresenceOnlyCaptcha, RecaptchaVerifier};
use crate::services::image_service::{DisabledImageGenerator, ImageGenerator, OpenAiImageGenerator};
use crate::services::mail_service::{LogMailer, Mailer, MailjetMailer};
use crate::services::{AuthService, ClaService, DirectoryService, ImportService, TokenSigner};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        log::error!("❌ Invalid configuration: {}", e);
        std::process::exit(1);
    });

    log::info!("🚀 Starting Member Portal...");

    // Initialize MongoDB connection
    let db = database::MongoDB::new(&config.database_url)
        .await
        .expect("Failed to connect to MongoDB");

    log::info!("✅ MongoDB connected successfully");

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .expect("Failed to build HTTP client");

    let users: Arc<dyn UserStore> = Arc::new(MongoUserStore::new(&db));
    let cla_store: Arc<dyn ClaStore> = Arc::new(MongoClaStore::new(&db));

    let mailer: Arc<dyn Mailer> = match &config.mailjet {
        Some(settings) => Arc::new(MailjetMailer::new(http.clone(), settings.clone())),
        None => {
            log::warn!("⚠️  MAILJET_API_KEY not set, reset emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let captcha: Arc<dyn CaptchaVerifier> = match &config.recaptcha_secret {
        Some(secret) => Arc::new(RecaptchaVerifier::new(http.clone(), secret.clone())),
        None => {
            log::warn!("⚠️  RECAPTCHA_SECRET not set, only captcha presence is checked");
            Arc::new(PresenceOnlyCaptcha)
        }
    };

    let blobs: Arc<dyn BlobStorage> = match &config.azure_blob {
        Some(settings) => Arc::new(AzureBlobStorage::new(http.clone(), settings.clone())),
        None => {
            log::warn!("⚠️  AZURE_STORAGE_ACCOUNT_URL not set, image uploads are disabled");
            Arc::new(DisabledBlobStorage)
        }
    };

    let images: Arc<dyn ImageGenerator> = match &config.openai {
        Some(settings) => Arc::new(OpenAiImageGenerator::new(http.clone(), settings.clone())),
        None => {
            log::warn!("⚠️  OPENAI_API_KEY not set, avatar generation is disabled");
            Arc::new(DisabledImageGenerator)
        }
    };

    let signer = TokenSigner::new(&config.jwt);

    let db_data = web::Data::new(db);
    let signer_data = web::Data::new(signer.clone());
    let auth_data = web::Data::new(AuthService::new(
        users.clone(),
        signer,
        mailer,
        captcha,
        config.admin_emails.clone(),
        config.frontend_origin.clone(),
    ));
    let directory_data = web::Data::new(DirectoryService::new(users.clone(), blobs.clone()));
    let import_data = web::Data::new(ImportService::new(
        users,
        config.default_import_password.clone(),
    ));
    let cla_data = web::Data::new(ClaService::new(cla_store, images, blobs));
    let login_limiter = Arc::new(LoginRateLimiter::new(&config.login_rate_limit));

    let host = config.host.clone();
    let port = config.port.clone();
    let frontend_origin = config.frontend_origin.clone();

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("🔓 CORS origin: {}", frontend_origin);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();
        let limiter = login_limiter.clone();

        App::new()
            .app_data(db_data.clone())
            .app_data(signer_data.clone())
            .app_data(auth_data.clone())
            .app_data(directory_data.clone())
            .app_data(import_data.clone())
            .app_data(cla_data.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            .configure(move |cfg| api::routes(cfg, limiter))
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
