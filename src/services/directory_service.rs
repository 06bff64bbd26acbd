use mongodb::bson::oid::ObjectId;
use std::sync::Arc;

use crate::database::UserStore;
use crate::models::{
    DirectoryPage, DirectoryParams, DirectoryQuery, PublicUser, Role, SortField, SortOrder,
    UserChanges, UserPatch, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::services::blob_service::{profile_blob_name, BlobStorage, PROFILES_CONTAINER};
use crate::utils::error::AppError;
use crate::utils::validation::{capitalize_words, is_valid_email, normalize_email};

/// Uploaded profile picture, as read from the multipart body.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: String,
}

pub fn total_pages(total_items: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_items.div_ceil(page_size)
}

/// Turns raw query parameters into a store query, applying defaults and limits.
pub fn build_query(params: &DirectoryParams, search: Option<&str>) -> Result<(DirectoryQuery, u64), AppError> {
    let page = params.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::validation("Page must be at least 1"));
    }

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit < 1 || limit > MAX_PAGE_SIZE {
        return Err(AppError::Validation(format!(
            "Limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let sort = match params.sort_by.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => SortField::parse(name).ok_or_else(|| AppError::validation("Invalid sort field"))?,
        None => SortField::LastName,
    };

    let order = params
        .order
        .as_deref()
        .map(SortOrder::parse)
        .unwrap_or(SortOrder::Asc);

    let query = DirectoryQuery {
        search: search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
        sort,
        order,
        skip: (page - 1).saturating_mul(limit),
        limit,
    };

    Ok((query, page))
}

pub fn parse_user_id(id: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id.trim()).map_err(|_| AppError::validation("Invalid user id"))
}

/// Validates a dashboard patch. Blank strings are treated as absent.
pub fn validate_patch(patch: &UserPatch) -> Result<UserChanges, AppError> {
    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    let email = match present(&patch.email) {
        Some(raw) => {
            let email = normalize_email(raw);
            if !is_valid_email(&email) {
                return Err(AppError::validation("Provide a valid email address."));
            }
            Some(email)
        }
        None => None,
    };

    let role = match present(&patch.role) {
        Some(raw) => Some(
            Role::parse(&raw.to_lowercase())
                .ok_or_else(|| AppError::Validation(format!("Invalid role: {}", raw)))?,
        ),
        None => None,
    };

    let changes = UserChanges {
        first_name: present(&patch.first_name).map(|v| capitalize_words(&v.to_lowercase())),
        last_name: present(&patch.last_name).map(|v| capitalize_words(&v.to_lowercase())),
        email,
        role,
        image: present(&patch.image).map(str::to_string),
    };

    if changes.is_empty() {
        return Err(AppError::validation("Nothing to update"));
    }

    Ok(changes)
}

pub struct DirectoryService {
    users: Arc<dyn UserStore>,
    blobs: Arc<dyn BlobStorage>,
}

impl DirectoryService {
    pub fn new(users: Arc<dyn UserStore>, blobs: Arc<dyn BlobStorage>) -> Self {
        Self { users, blobs }
    }

    async fn page(&self, query: DirectoryQuery, page: u64) -> Result<DirectoryPage, AppError> {
        let page_size = query.limit;
        let (users, total_items) = self.users.query(&query).await?;

        Ok(DirectoryPage {
            items: users.into_iter().map(PublicUser::from).collect(),
            current_page: page,
            total_pages: total_pages(total_items, page_size),
            total_items,
        })
    }

    pub async fn list(&self, params: &DirectoryParams) -> Result<DirectoryPage, AppError> {
        let (query, page) = build_query(params, None)?;
        self.page(query, page).await
    }

    pub async fn search(&self, params: &DirectoryParams) -> Result<DirectoryPage, AppError> {
        let (query, page) = build_query(params, params.query.as_deref())?;
        self.page(query, page).await
    }

    pub async fn update(&self, id: &str, patch: &UserPatch) -> Result<PublicUser, AppError> {
        let id = parse_user_id(id)?;
        let changes = validate_patch(patch)?;

        let user = self
            .users
            .update(id, &changes)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        log::info!("✏️  User {} updated", id);
        Ok(PublicUser::from(user))
    }

    pub async fn update_image(&self, id: &str, upload: ImageUpload) -> Result<PublicUser, AppError> {
        let id = parse_user_id(id)?;
        if upload.bytes.is_empty() {
            return Err(AppError::validation("No image uploaded"));
        }

        if self.users.find_by_id(id).await?.is_none() {
            return Err(AppError::not_found("User not found"));
        }

        let name = profile_blob_name(upload.filename.as_deref());
        let url = self
            .blobs
            .upload(PROFILES_CONTAINER, &name, upload.bytes, &upload.content_type)
            .await?;

        let changes = UserChanges {
            image: Some(url),
            ..Default::default()
        };
        let user = self
            .users
            .update(id, &changes)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        log::info!("🖼️  Profile image updated for user {}", id);
        Ok(PublicUser::from(user))
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let id = parse_user_id(id)?;
        if !self.users.delete(id).await? {
            return Err(AppError::not_found("User not found"));
        }
        log::info!("🗑️  User {} deleted", id);
        Ok(())
    }
}
