use async_trait::async_trait;
use serde::Serialize;

use crate::config::MailjetSettings;
use crate::utils::error::AppError;

const MAILJET_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";

/// Transactional email used by the password reset flow.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(
        &self,
        to: &str,
        first_name: &str,
        reset_link: &str,
    ) -> Result<(), AppError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MailjetAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MailjetMessage<'a> {
    from: MailjetAddress<'a>,
    to: Vec<MailjetAddress<'a>>,
    subject: &'a str,
    #[serde(rename = "HTMLPart")]
    html_part: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MailjetRequest<'a> {
    messages: Vec<MailjetMessage<'a>>,
}

pub fn reset_email_html(first_name: &str, reset_link: &str) -> String {
    format!(
        "<h3>Hello {}!</h3>\
         <p>Follow the link below to reset your password</p>\
         <p><a href=\"{}\">Reset my password</a></p>\
         <p>This link expires in 1 hour</p>",
        first_name, reset_link
    )
}

pub struct MailjetMailer {
    client: reqwest::Client,
    settings: MailjetSettings,
}

impl MailjetMailer {
    pub fn new(client: reqwest::Client, settings: MailjetSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl Mailer for MailjetMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        first_name: &str,
        reset_link: &str,
    ) -> Result<(), AppError> {
        let body = MailjetRequest {
            messages: vec![MailjetMessage {
                from: MailjetAddress {
                    email: &self.settings.sender_email,
                    name: Some(&self.settings.sender_name),
                },
                to: vec![MailjetAddress { email: to, name: None }],
                subject: "Password Reset",
                html_part: reset_email_html(first_name, reset_link),
            }],
        };

        let response = self
            .client
            .post(MAILJET_SEND_URL)
            .basic_auth(&self.settings.api_key, Some(&self.settings.secret_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Mailjet request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Mailjet API error: {}",
                response.status()
            )));
        }

        log::info!("📧 Password reset email sent");
        Ok(())
    }
}

/// Used when no Mailjet key is configured: the link only goes to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        _first_name: &str,
        reset_link: &str,
    ) -> Result<(), AppError> {
        log::warn!(
            "📧 Mailer not configured; password reset link for {}: {}",
            to,
            reset_link
        );
        Ok(())
    }
}
