use async_trait::async_trait;
use serde::Deserialize;

use crate::utils::error::AppError;

const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Checks the captcha token sent with a signup. Presence is validated by the
/// auth service before this is called.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<bool, AppError>;
}

/// Accepts any non-empty token. Used when no reCAPTCHA secret is configured.
pub struct PresenceOnlyCaptcha;

#[async_trait]
impl CaptchaVerifier for PresenceOnlyCaptcha {
    async fn verify(&self, token: &str, _remote_ip: Option<&str>) -> Result<bool, AppError> {
        Ok(!token.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: String,
}

impl RecaptchaVerifier {
    pub fn new(client: reqwest::Client, secret: String) -> Self {
        Self { client, secret }
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<bool, AppError> {
        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(RECAPTCHA_VERIFY_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("reCAPTCHA request failed: {}", e)))?;

        let body: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse reCAPTCHA response: {}", e)))?;

        if !body.success {
            log::warn!("🤖 Captcha rejected: {:?}", body.error_codes);
        }

        Ok(body.success)
    }
}
