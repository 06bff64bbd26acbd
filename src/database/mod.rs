use mongodb::{Client, Collection, Database};
use std::error::Error;

use crate::models::{CLA_RESPONSES_COLLECTION, USERS_COLLECTION};

pub mod cla_store;
#[cfg(test)]
pub mod memory;
pub mod user_store;

pub use cla_store::{ClaStore, MongoClaStore};
pub use user_store::{MongoUserStore, UserStore};

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        // Database name comes from the URI path, e.g. mongodb://host/member_portal
        let db_name = uri
            .split('/')
            .last()
            .and_then(|s| s.split('?').next())
            .filter(|s| !s.is_empty() && !s.contains(':') && !s.contains('@'))
            .unwrap_or("member_portal");

        let db = client.database(db_name);

        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the stores rely on. The unique email index is
    /// what turns concurrent duplicate signups into a conflict.
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        log::info!("🔧 Creating database indexes...");

        let users = self.collection::<mongodb::bson::Document>(USERS_COLLECTION);

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        // A failure here means existing duplicates; startup must not continue
        // without the uniqueness guarantee.
        users.create_index(email_index).await?;
        log::info!("   ✅ Index ready: users(email) unique");

        let name_index = IndexModel::builder()
            .keys(doc! { "lastName": 1, "firstName": 1 })
            .build();

        match users.create_index(name_index).await {
            Ok(_) => log::info!("   ✅ Index ready: users(lastName, firstName)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let responses = self.collection::<mongodb::bson::Document>(CLA_RESPONSES_COLLECTION);

        let created_index = IndexModel::builder()
            .keys(doc! { "createdAt": -1 })
            .build();

        match responses.create_index(created_index).await {
            Ok(_) => log::info!("   ✅ Index ready: cla_responses(createdAt)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub async fn health_check(&self) -> bool {
        self.db.list_collection_names().await.is_ok()
    }
}
