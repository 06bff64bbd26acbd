// ==================== USER STORE ====================
// Persistence of `users` documents. Services depend on the `UserStore` trait;
// `MongoUserStore` is the production implementation.

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use std::collections::HashSet;

use super::MongoDB;
use crate::models::{DirectoryQuery, User, UserChanges, USERS_COLLECTION};
use crate::utils::error::{is_duplicate_key, AppError};

/// Outcome of one row of a bulk insert.
pub type InsertOutcome = Result<User, AppError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, AppError>;

    /// Fails with `Conflict` when the email is already taken.
    async fn insert(&self, user: User) -> Result<User, AppError>;

    /// Unordered bulk insert. One outcome per input, in input order; a
    /// duplicate email only fails its own row.
    async fn insert_many(&self, users: Vec<User>) -> Result<Vec<InsertOutcome>, AppError>;

    /// Subset of `emails` already present in the store.
    async fn existing_emails(&self, emails: &[String]) -> Result<HashSet<String>, AppError>;

    /// Returns the updated user, or `None` when no user has this id.
    async fn update(&self, id: ObjectId, changes: &UserChanges) -> Result<Option<User>, AppError>;

    async fn delete(&self, id: ObjectId) -> Result<bool, AppError>;

    /// One page of users plus the total number of matches.
    async fn query(&self, query: &DirectoryQuery) -> Result<(Vec<User>, u64), AppError>;

    /// Records an issued reset token digest as unused.
    async fn push_reset_token(&self, id: ObjectId, digest: &str) -> Result<bool, AppError>;

    /// Sets the password and marks the token used, only if the token was
    /// issued to this user and is still unused. Returns whether it applied.
    async fn consume_reset_token(
        &self,
        id: ObjectId,
        digest: &str,
        password_hash: &str,
    ) -> Result<bool, AppError>;
}

pub struct MongoUserStore {
    collection: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: &MongoDB) -> Self {
        Self {
            collection: db.collection::<User>(USERS_COLLECTION),
        }
    }
}

/// Filter for a directory search; `None` matches every user.
pub fn search_filter(search: Option<&str>) -> Document {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => {
            let pattern = regex::escape(text);
            doc! {
                "$or": [
                    { "firstName": { "$regex": &pattern, "$options": "i" } },
                    { "lastName": { "$regex": &pattern, "$options": "i" } },
                    { "email": { "$regex": &pattern, "$options": "i" } },
                ]
            }
        }
        None => doc! {},
    }
}

fn changes_to_set(changes: &UserChanges) -> Document {
    let mut set = doc! { "updatedAt": BsonDateTime::now() };
    if let Some(v) = &changes.first_name {
        set.insert("firstName", v);
    }
    if let Some(v) = &changes.last_name {
        set.insert("lastName", v);
    }
    if let Some(v) = &changes.email {
        set.insert("email", v);
    }
    if let Some(v) = changes.role {
        set.insert("role", v.as_str());
    }
    if let Some(v) = &changes.image {
        set.insert("image", v);
    }
    set
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.collection.find_one(doc! { "email": email }).await?)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn insert(&self, mut user: User) -> Result<User, AppError> {
        let result = self.collection.insert_one(&user).await?;
        user.id = result.inserted_id.as_object_id();
        Ok(user)
    }

    async fn insert_many(&self, mut users: Vec<User>) -> Result<Vec<InsertOutcome>, AppError> {
        if users.is_empty() {
            return Ok(Vec::new());
        }

        // Ids are assigned up front so rows that landed are known even when
        // the batch reports partial failure.
        for user in users.iter_mut() {
            user.id = Some(ObjectId::new());
        }

        match self.collection.insert_many(&users).ordered(false).await {
            Ok(_) => Ok(users.into_iter().map(Ok).collect()),
            Err(e) => {
                use mongodb::error::ErrorKind;

                let write_errors: Vec<(usize, i32, String)> = match e.kind.as_ref() {
                    ErrorKind::InsertMany(failure) if failure.write_concern_error.is_none() => {
                        failure
                            .write_errors
                            .iter()
                            .flatten()
                            .map(|w| (w.index, w.code, w.message.clone()))
                            .collect()
                    }
                    _ => return Err(e.into()),
                };

                log::warn!("⚠️  Bulk insert: {} rows rejected by the store", write_errors.len());

                Ok(users
                    .into_iter()
                    .enumerate()
                    .map(|(index, user)| {
                        match write_errors.iter().find(|(i, _, _)| *i == index) {
                            Some((_, 11000, _)) => Err(AppError::Conflict(format!(
                                "Email already in database : {}",
                                user.email
                            ))),
                            Some((_, _, message)) => Err(AppError::Database(message.clone())),
                            None => Ok(user),
                        }
                    })
                    .collect())
            }
        }
    }

    async fn existing_emails(&self, emails: &[String]) -> Result<HashSet<String>, AppError> {
        if emails.is_empty() {
            return Ok(HashSet::new());
        }

        let raw = self.collection.clone_with_type::<Document>();
        let docs: Vec<Document> = raw
            .find(doc! { "email": { "$in": emails } })
            .projection(doc! { "email": 1, "_id": 0 })
            .await?
            .try_collect()
            .await?;

        Ok(docs
            .into_iter()
            .filter_map(|d| d.get_str("email").ok().map(str::to_string))
            .collect())
    }

    async fn update(&self, id: ObjectId, changes: &UserChanges) -> Result<Option<User>, AppError> {
        self.collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": changes_to_set(changes) })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Conflict("Email already in use.".to_string())
                } else {
                    e.into()
                }
            })
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, AppError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn query(&self, query: &DirectoryQuery) -> Result<(Vec<User>, u64), AppError> {
        let filter = search_filter(query.search.as_deref());
        let direction = query.order.as_i32();

        let total = self.collection.count_documents(filter.clone()).await?;
        if query.is_past_end(total) {
            return Ok((Vec::new(), total));
        }

        // _id breaks ties so pages stay stable
        let mut sort = Document::new();
        sort.insert(query.sort.field_name(), direction);
        sort.insert("_id", direction);

        let users: Vec<User> = self
            .collection
            .find(filter)
            .sort(sort)
            .skip(query.skip)
            .limit(query.limit as i64)
            .await?
            .try_collect()
            .await?;

        Ok((users, total))
    }

    async fn push_reset_token(&self, id: ObjectId, digest: &str) -> Result<bool, AppError> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$push": { "passwordResetTokens": { "token": digest, "isUsed": false } },
                    "$set": { "updatedAt": BsonDateTime::now() },
                },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn consume_reset_token(
        &self,
        id: ObjectId,
        digest: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        // Single conditional update: concurrent confirmations of the same
        // token cannot both match an unused entry.
        let result = self
            .collection
            .update_one(
                doc! {
                    "_id": id,
                    "passwordResetTokens": { "$elemMatch": { "token": digest, "isUsed": false } },
                },
                doc! {
                    "$set": {
                        "passwordResetTokens.$.isUsed": true,
                        "password": password_hash,
                        "updatedAt": BsonDateTime::now(),
                    }
                },
            )
            .await?;
        Ok(result.modified_count == 1)
    }
}
