use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use serde::Serialize;

use crate::middleware::auth::{require_claims, FORBIDDEN_MESSAGE};
use crate::models::{DirectoryPage, DirectoryParams, PublicUser, Role, UserPatch};
use crate::services::directory_service::ImageUpload;
use crate::services::import_service::{ImportPreview, ImportPreviewRequest, ImportReport, ImportUser};
use crate::services::{DirectoryService, ImportService};
use crate::utils::error::AppError;

const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub success: bool,
    pub user: PublicUser,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DirectoryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: DirectoryPage,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ImportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: ImportReport,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PreviewResponse {
    pub success: bool,
    #[serde(flatten)]
    pub preview: ImportPreview,
}

#[utoipa::path(
    get,
    path = "/users/all",
    tag = "Users",
    params(DirectoryParams),
    responses(
        (status = 200, description = "One page of users", body = DirectoryResponse),
        (status = 400, description = "Invalid paging or sort parameters"),
        (status = 401, description = "Not signed in or not staff")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    service: web::Data<DirectoryService>,
    params: web::Query<DirectoryParams>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "👥 GET /users/all - page: {:?}, limit: {:?}, sort: {:?}",
        params.page,
        params.limit,
        params.sort_by
    );

    let page = service.list(&params).await?;
    Ok(HttpResponse::Ok().json(DirectoryResponse { success: true, page }))
}

#[utoipa::path(
    get,
    path = "/users/search",
    tag = "Users",
    params(DirectoryParams),
    responses(
        (status = 200, description = "Matching users", body = DirectoryResponse),
        (status = 400, description = "Invalid paging or sort parameters"),
        (status = 401, description = "Not signed in or not staff")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn search_users(
    service: web::Data<DirectoryService>,
    params: web::Query<DirectoryParams>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔍 GET /users/search - query: {:?}", params.query);

    let page = service.search(&params).await?;
    Ok(HttpResponse::Ok().json(DirectoryResponse { success: true, page }))
}

#[utoipa::path(
    put,
    path = "/users/update/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User id")
    ),
    request_body = UserPatch,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid id or fields"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already in use")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_user(
    service: web::Data<DirectoryService>,
    id: web::Path<String>,
    patch: web::Json<UserPatch>,
) -> Result<HttpResponse, AppError> {
    log::info!("✏️  PUT /users/update/{}", id);

    let user = service.update(&id, &patch).await?;
    Ok(HttpResponse::Ok().json(UserResponse { success: true, user }))
}

#[utoipa::path(
    delete,
    path = "/users/delete/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_user(
    service: web::Data<DirectoryService>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    log::info!("🗑️  DELETE /users/delete/{}", id);

    service.delete(&id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "User deleted"
    })))
}

#[utoipa::path(
    post,
    path = "/users/import/preview",
    tag = "Users",
    request_body = ImportPreviewRequest,
    responses(
        (status = 200, description = "Suggested mapping and parsed rows", body = PreviewResponse),
        (status = 400, description = "Fewer than two lines or unknown column")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn preview_import(
    service: web::Data<ImportService>,
    request: web::Json<ImportPreviewRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("📋 POST /users/import/preview - {} bytes", request.input.len());

    let preview = service.preview(&request)?;
    Ok(HttpResponse::Ok().json(PreviewResponse { success: true, preview }))
}

#[utoipa::path(
    post,
    path = "/users/import",
    tag = "Users",
    request_body = Vec<ImportUser>,
    responses(
        (status = 200, description = "Import report with created users and row errors", body = ImportResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn import_users(
    service: web::Data<ImportService>,
    rows: web::Json<Vec<ImportUser>>,
) -> Result<HttpResponse, AppError> {
    log::info!("📥 POST /users/import - {} rows", rows.len());

    let report = service.import(rows.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ImportResponse { success: true, report }))
}

/// Reads the `image` field, or the first file field, from the form.
async fn read_image(mut payload: Multipart) -> Result<ImageUpload, AppError> {
    let bad_form = |e: actix_multipart::MultipartError| AppError::Validation(format!("Invalid upload: {}", e));

    while let Some(mut field) = payload.try_next().await.map_err(bad_form)? {
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let is_image_field = field.name() == Some("image");

        if !is_image_field && filename.is_none() {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(bad_form)? {
            if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(AppError::validation("Image is too large"));
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(ImageUpload {
            bytes,
            filename,
            content_type,
        });
    }

    Err(AppError::validation("No image uploaded"))
}

#[utoipa::path(
    put,
    path = "/users/update-image/{userId}",
    tag = "Users",
    params(
        ("userId" = String, Path, description = "User id")
    ),
    request_body(content_type = "multipart/form-data", description = "Form with an `image` file field"),
    responses(
        (status = 200, description = "Image stored", body = UserResponse),
        (status = 400, description = "No file uploaded"),
        (status = 401, description = "Not the user and not an admin"),
        (status = 502, description = "Storage failed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_image(
    req: HttpRequest,
    service: web::Data<DirectoryService>,
    user_id: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    log::info!("🖼️  PUT /users/update-image/{}", user_id);

    let claims = require_claims(&req)?;
    if claims.sub != user_id.as_str() && !claims.has_role(&[Role::Admin]) {
        log::warn!("⛔ User {} tried to change the image of {}", claims.sub, user_id);
        return Err(AppError::auth(FORBIDDEN_MESSAGE));
    }

    let upload = read_image(payload).await?;
    let user = service.update_image(&user_id, upload).await?;
    Ok(HttpResponse::Ok().json(UserResponse { success: true, user }))
}
