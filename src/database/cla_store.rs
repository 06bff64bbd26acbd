use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Collection;

use super::MongoDB;
use crate::models::{ClaConfig, ClaResponse, CLA_CONFIGS_COLLECTION, CLA_RESPONSES_COLLECTION};
use crate::utils::error::AppError;

#[async_trait]
pub trait ClaStore: Send + Sync {
    async fn get_config(&self) -> Result<Option<ClaConfig>, AppError>;

    /// Upserts the singleton; keeps the original id and creation time.
    async fn save_config(&self, config: ClaConfig) -> Result<ClaConfig, AppError>;

    async fn insert_response(&self, response: ClaResponse) -> Result<ClaResponse, AppError>;

    /// Newest first.
    async fn list_responses(&self) -> Result<Vec<ClaResponse>, AppError>;
}

pub struct MongoClaStore {
    configs: Collection<ClaConfig>,
    responses: Collection<ClaResponse>,
}

impl MongoClaStore {
    pub fn new(db: &MongoDB) -> Self {
        Self {
            configs: db.collection::<ClaConfig>(CLA_CONFIGS_COLLECTION),
            responses: db.collection::<ClaResponse>(CLA_RESPONSES_COLLECTION),
        }
    }
}

#[async_trait]
impl ClaStore for MongoClaStore {
    async fn get_config(&self) -> Result<Option<ClaConfig>, AppError> {
        // Oldest document wins if a second one was ever written by hand
        Ok(self.configs.find_one(doc! {}).sort(doc! { "createdAt": 1 }).await?)
    }

    async fn save_config(&self, mut config: ClaConfig) -> Result<ClaConfig, AppError> {
        match self.get_config().await? {
            Some(existing) => {
                config.id = existing.id;
                config.created_at = existing.created_at;
                self.configs
                    .replace_one(doc! { "_id": existing.id }, &config)
                    .await?;
            }
            None => {
                let result = self.configs.insert_one(&config).await?;
                config.id = result.inserted_id.as_object_id();
            }
        }
        Ok(config)
    }

    async fn insert_response(&self, mut response: ClaResponse) -> Result<ClaResponse, AppError> {
        let result = self.responses.insert_one(&response).await?;
        response.id = result.inserted_id.as_object_id();
        Ok(response)
    }

    async fn list_responses(&self) -> Result<Vec<ClaResponse>, AppError> {
        Ok(self
            .responses
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await?
            .try_collect()
            .await?)
    }
}
