// ==================== BLOB STORAGE ====================
// Profile pictures and generated avatars go to Azure Blob Storage through the
// REST "Put Blob" call, authorized by an account SAS token.

use async_trait::async_trait;

use crate::config::AzureBlobSettings;
use crate::utils::error::AppError;

pub const PROFILES_CONTAINER: &str = "profiles";
pub const AVATARS_CONTAINER: &str = "avatars";

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores the bytes and returns the public URL of the blob.
    async fn upload(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError>;

    /// Removes a blob. A blob that is already gone is not an error.
    async fn delete(&self, container: &str, name: &str) -> Result<(), AppError>;
}

pub struct AzureBlobStorage {
    client: reqwest::Client,
    settings: AzureBlobSettings,
}

impl AzureBlobStorage {
    pub fn new(client: reqwest::Client, settings: AzureBlobSettings) -> Self {
        Self { client, settings }
    }

    pub fn blob_url(&self, container: &str, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.settings.account_url,
            container,
            urlencoding::encode(name)
        )
    }
}

#[async_trait]
impl BlobStorage for AzureBlobStorage {
    async fn upload(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        let url = self.blob_url(container, name);
        let size = bytes.len();

        let response = self
            .client
            .put(format!("{}?{}", url, self.settings.sas_token))
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", "2021-08-06")
            .header("x-ms-blob-content-type", content_type)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Blob upload failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Blob storage error: {}",
                response.status()
            )));
        }

        log::info!("☁️  Uploaded {}/{} ({} bytes)", container, name, size);
        Ok(url)
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), AppError> {
        let url = self.blob_url(container, name);

        let response = self
            .client
            .delete(format!("{}?{}", url, self.settings.sas_token))
            .header("x-ms-version", "2021-08-06")
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Blob delete failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::Upstream(format!("Blob storage error: {}", status)));
        }

        log::info!("🗑️  Deleted {}/{}", container, name);
        Ok(())
    }
}

/// Used when storage is not configured; every upload fails cleanly.
pub struct DisabledBlobStorage;

#[async_trait]
impl BlobStorage for DisabledBlobStorage {
    async fn upload(
        &self,
        _container: &str,
        _name: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, AppError> {
        Err(AppError::Upstream("Blob storage is not configured".to_string()))
    }

    async fn delete(&self, _container: &str, _name: &str) -> Result<(), AppError> {
        Ok(())
    }
}

/// Blob name for an uploaded profile picture, keeping the original extension.
pub fn profile_blob_name(original_filename: Option<&str>) -> String {
    let extension = original_filename
        .and_then(|f| std::path::Path::new(f).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    format!("profile-{}{}", uuid::Uuid::new_v4(), extension)
}

pub fn avatar_blob_name() -> String {
    format!("avatar-{}.png", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_blob_name_keeps_extension() {
        let name = profile_blob_name(Some("me.JPG"));
        assert!(name.starts_with("profile-"));
        assert!(name.ends_with(".jpg"));
    }

    #[test]
    fn test_profile_blob_name_drops_odd_extensions() {
        assert!(!profile_blob_name(Some("evil.p/h?p")).contains('?'));
        let plain = profile_blob_name(None);
        assert_eq!(plain.len(), "profile-".len() + 36);
    }

    #[test]
    fn test_blob_url_excludes_sas() {
        let storage = AzureBlobStorage::new(
            reqwest::Client::new(),
            AzureBlobSettings {
                account_url: "https://acct.blob.core.windows.net".into(),
                sas_token: "sv=2022&sig=secret".into(),
            },
        );
        let url = storage.blob_url(AVATARS_CONTAINER, "avatar-1.png");
        assert_eq!(url, "https://acct.blob.core.windows.net/avatars/avatar-1.png");
    }
}
