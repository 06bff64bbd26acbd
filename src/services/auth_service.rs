use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::database::UserStore;
use crate::models::{Role, User};
use crate::services::captcha_service::CaptchaVerifier;
use crate::services::mail_service::Mailer;
use crate::services::token_service::{token_digest, TokenKind, TokenSigner, INVALID_TOKEN_MESSAGE};
use crate::utils::error::AppError;
use crate::utils::validation::{
    capitalize_words, is_strong_password, is_valid_email, normalize_email,
    PASSWORD_POLICY_MESSAGE,
};

pub const BCRYPT_COST: u32 = 10;

// Request/Response structures
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub image: Option<String>,
    #[serde(default, alias = "recaptchaToken")]
    pub captcha_token: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct ResetPasswordConfirmRequest {
    #[serde(default)]
    pub password: String,
}

/// Public user fields returned by signup, login and verify.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl SessionUser {
    /// `role` is only exposed for moderators and admins unless `always_role`.
    fn from_user(user: &User, always_role: bool) -> Self {
        Self {
            id: user.id_hex(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            image: user.image.clone(),
            role: (always_role || user.role.is_privileged()).then_some(user.role),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub auth_token: String,
    pub user: SessionUser,
}

pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("Hash task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verify task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password verification error: {}", e)))
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenSigner,
    mailer: Arc<dyn Mailer>,
    captcha: Arc<dyn CaptchaVerifier>,
    admin_emails: Vec<String>,
    frontend_origin: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: TokenSigner,
        mailer: Arc<dyn Mailer>,
        captcha: Arc<dyn CaptchaVerifier>,
        admin_emails: Vec<String>,
        frontend_origin: String,
    ) -> Self {
        Self {
            users,
            tokens,
            mailer,
            captcha,
            admin_emails,
            frontend_origin,
        }
    }

    pub fn tokens(&self) -> &TokenSigner {
        &self.tokens
    }

    fn initial_role(&self, email: &str) -> Role {
        if self.admin_emails.iter().any(|a| a == email) {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub async fn signup(
        &self,
        request: &SignupRequest,
        remote_ip: Option<&str>,
    ) -> Result<AuthResponse, AppError> {
        let captcha_token = request
            .captcha_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::validation("Captcha required"))?;

        if request.email.trim().is_empty()
            || request.password.is_empty()
            || request.first_name.trim().is_empty()
            || request.last_name.trim().is_empty()
        {
            return Err(AppError::validation("Provide email, password and name"));
        }

        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(AppError::validation("Provide a valid email address."));
        }

        if !is_strong_password(&request.password) {
            return Err(AppError::validation(PASSWORD_POLICY_MESSAGE));
        }

        if !self.captcha.verify(captcha_token, remote_ip).await? {
            return Err(AppError::validation("Captcha verification failed"));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User already exists.".to_string()));
        }

        let role = self.initial_role(&email);
        let password_hash = hash_password(request.password.clone()).await?;

        let image = request
            .image
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let user = self
            .users
            .insert(User::new(
                email,
                password_hash,
                capitalize_words(request.first_name.trim()),
                capitalize_words(request.last_name.trim()),
                role,
                image,
            ))
            .await?;

        log::info!("✅ User registered: {} (role: {})", user.email, user.role);

        Ok(AuthResponse {
            success: true,
            auth_token: self.tokens.issue_access(&user)?,
            user: SessionUser::from_user(&user, true),
        })
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AppError> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(AppError::validation("Provide email and password."));
        }

        let email = normalize_email(&request.email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::not_found("User not found."))?;

        if !verify_password(request.password.clone(), user.password.clone()).await? {
            return Err(AppError::auth("Unable to authenticate the user"));
        }

        Ok(AuthResponse {
            success: true,
            auth_token: self.tokens.issue_access(&user)?,
            user: SessionUser::from_user(&user, false),
        })
    }

    /// Resolves a bearer token to the user as currently persisted.
    pub async fn verify(&self, token: &str) -> Result<SessionUser, AppError> {
        let claims = self.tokens.verify(token, TokenKind::Access)?;
        let user = self
            .users
            .find_by_id(claims.user_id()?)
            .await?
            .ok_or_else(|| AppError::auth(INVALID_TOKEN_MESSAGE))?;

        Ok(SessionUser::from_user(&user, false))
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AppError::validation("Provide an email address."));
        }

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::not_found("User doesn't exist"))?;
        let user_id = user
            .id
            .ok_or_else(|| AppError::Internal("Stored user without id".to_string()))?;

        let token = self.tokens.issue_reset(&user_id)?;
        self.users.push_reset_token(user_id, &token_digest(&token)).await?;

        let reset_link = format!("{}/reset-password/{}", self.frontend_origin, token);
        self.mailer
            .send_password_reset(&user.email, &user.first_name, &reset_link)
            .await?;

        log::info!("🔑 Password reset issued for user {}", user_id);
        Ok(())
    }

    /// At most one confirmation succeeds per issued token.
    pub async fn confirm_password_reset(&self, token: &str, password: &str) -> Result<(), AppError> {
        if !is_strong_password(password) {
            return Err(AppError::validation(PASSWORD_POLICY_MESSAGE));
        }

        let claims = self.tokens.verify(token, TokenKind::PasswordReset)?;
        let user_id: ObjectId = claims.user_id()?;

        let password_hash = hash_password(password.to_string()).await?;
        let consumed = self
            .users
            .consume_reset_token(user_id, &token_digest(token), &password_hash)
            .await?;

        if !consumed {
            log::warn!("❌ Reset token rejected for user {} (unknown or used)", user_id);
            return Err(AppError::auth(INVALID_TOKEN_MESSAGE));
        }

        log::info!("✅ Password reset for user {}", user_id);
        Ok(())
    }
}
