// In-memory stores used by service and handler tests.

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use std::collections::HashSet;
use std::sync::Mutex;

use super::cla_store::ClaStore;
use super::user_store::{InsertOutcome, UserStore};
use crate::models::{
    ClaConfig, ClaResponse, DirectoryQuery, PasswordResetToken, SortField, SortOrder, User,
    UserChanges,
};
use crate::utils::error::AppError;

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }

    fn matches(user: &User, needle: &str) -> bool {
        [&user.first_name, &user.last_name, &user.email]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }

    fn compare(a: &User, b: &User, field: SortField) -> std::cmp::Ordering {
        let primary = match field {
            SortField::LastName => a.last_name.cmp(&b.last_name),
            SortField::FirstName => a.first_name.cmp(&b.first_name),
            SortField::Email => a.email.cmp(&b.email),
            SortField::Role => a.role.as_str().cmp(b.role.as_str()),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, AppError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == Some(id)).cloned())
    }

    async fn insert(&self, mut user: User) -> Result<User, AppError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("User already exists.".to_string()));
        }
        user.id = Some(ObjectId::new());
        users.push(user.clone());
        Ok(user)
    }

    async fn insert_many(&self, users: Vec<User>) -> Result<Vec<InsertOutcome>, AppError> {
        let mut outcomes = Vec::with_capacity(users.len());
        for user in users {
            let email = user.email.clone();
            outcomes.push(self.insert(user).await.map_err(|_| {
                AppError::Conflict(format!("Email already in database : {}", email))
            }));
        }
        Ok(outcomes)
    }

    async fn existing_emails(&self, emails: &[String]) -> Result<HashSet<String>, AppError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .filter(|u| emails.contains(&u.email))
            .map(|u| u.email.clone())
            .collect())
    }

    async fn update(&self, id: ObjectId, changes: &UserChanges) -> Result<Option<User>, AppError> {
        let mut users = self.users.lock().unwrap();
        if let Some(email) = &changes.email {
            if users.iter().any(|u| &u.email == email && u.id != Some(id)) {
                return Err(AppError::Conflict("Email already in use.".to_string()));
            }
        }
        Ok(users.iter_mut().find(|u| u.id == Some(id)).map(|user| {
            changes.apply_to(user);
            user.clone()
        }))
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, AppError> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != Some(id));
        Ok(users.len() != before)
    }

    async fn query(&self, query: &DirectoryQuery) -> Result<(Vec<User>, u64), AppError> {
        let users = self.users.lock().unwrap();
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut matched: Vec<User> = users
            .iter()
            .filter(|u| needle.as_deref().map_or(true, |n| Self::matches(u, n)))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ord = Self::compare(a, b, query.sort);
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matched.len() as u64;
        if query.is_past_end(total) {
            return Ok((Vec::new(), total));
        }
        let page = matched
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit as usize)
            .collect();

        Ok((page, total))
    }

    async fn push_reset_token(&self, id: ObjectId, digest: &str) -> Result<bool, AppError> {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| u.id == Some(id)) {
            Some(user) => {
                user.password_reset_tokens.push(PasswordResetToken {
                    token: digest.to_string(),
                    is_used: false,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn consume_reset_token(
        &self,
        id: ObjectId,
        digest: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == Some(id)) else {
            return Ok(false);
        };
        let Some(entry) = user
            .password_reset_tokens
            .iter_mut()
            .find(|t| t.token == digest && !t.is_used)
        else {
            return Ok(false);
        };
        entry.is_used = true;
        user.password = password_hash.to_string();
        user.updated_at = BsonDateTime::now();
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemoryClaStore {
    config: Mutex<Option<ClaConfig>>,
    responses: Mutex<Vec<ClaResponse>>,
}

impl MemoryClaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response_count(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl ClaStore for MemoryClaStore {
    async fn get_config(&self) -> Result<Option<ClaConfig>, AppError> {
        Ok(self.config.lock().unwrap().clone())
    }

    async fn save_config(&self, mut config: ClaConfig) -> Result<ClaConfig, AppError> {
        let mut slot = self.config.lock().unwrap();
        if let Some(existing) = slot.as_ref() {
            config.id = existing.id;
            config.created_at = existing.created_at;
        } else {
            config.id = Some(ObjectId::new());
        }
        *slot = Some(config.clone());
        Ok(config)
    }

    async fn insert_response(&self, mut response: ClaResponse) -> Result<ClaResponse, AppError> {
        response.id = Some(ObjectId::new());
        self.responses.lock().unwrap().push(response.clone());
        Ok(response)
    }

    async fn list_responses(&self) -> Result<Vec<ClaResponse>, AppError> {
        let mut responses = self.responses.lock().unwrap().clone();
        responses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(responses)
    }
}
