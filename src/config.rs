use std::env;

use crate::utils::validation::is_strong_password;

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct MailjetSettings {
    pub api_key: String,
    pub secret_key: String,
    pub sender_email: String,
    pub sender_name: String,
}

#[derive(Debug, Clone)]
pub struct AzureBlobSettings {
    /// e.g. https://myaccount.blob.core.windows.net
    pub account_url: String,
    /// SAS query string without the leading '?'
    pub sas_token: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub image_model: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub max_attempts: u32,
    pub window_secs: u64,
    /// Upper bound on tracked clients.
    pub max_clients: u64,
    /// Key on `Forwarded`/`X-Forwarded-For` instead of the socket peer.
    /// Only safe behind a proxy that overwrites those headers.
    pub trust_forwarded: bool,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: String,
    pub database_url: String,
    pub jwt: JwtSettings,
    pub admin_emails: Vec<String>,
    pub frontend_origin: String,
    pub default_import_password: String,
    pub recaptcha_secret: Option<String>,
    pub mailjet: Option<MailjetSettings>,
    pub azure_blob: Option<AzureBlobSettings>,
    pub openai: Option<OpenAiSettings>,
    pub login_rate_limit: RateLimitSettings,
}

fn required(name: &str) -> Result<String, String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(format!("{} must be set", name)),
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn with_default(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

/// Comma-separated allow-list, normalized the same way signup normalizes emails.
pub fn parse_admin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

pub fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let default_import_password = required("DEFAULT_IMPORT_PASSWORD")?;
        if !is_strong_password(&default_import_password) {
            return Err("DEFAULT_IMPORT_PASSWORD does not satisfy the password policy".to_string());
        }

        let mailjet = optional("MAILJET_API_KEY").map(|api_key| MailjetSettings {
            api_key,
            secret_key: with_default("MAILJET_SECRET_KEY", ""),
            sender_email: with_default("MAILJET_SENDER", "no-reply@localhost"),
            sender_name: with_default("MAILJET_NAME", "Member Portal"),
        });

        let azure_blob = optional("AZURE_STORAGE_ACCOUNT_URL").map(|account_url| AzureBlobSettings {
            account_url: account_url.trim_end_matches('/').to_string(),
            sas_token: with_default("AZURE_STORAGE_SAS_TOKEN", "")
                .trim_start_matches('?')
                .to_string(),
        });

        let openai = optional("OPENAI_API_KEY").map(|api_key| OpenAiSettings {
            api_key,
            image_model: with_default("OPENAI_IMAGE_MODEL", "dall-e-3"),
        });

        let login_rate_limit = RateLimitSettings {
            max_attempts: with_default("LOGIN_RATE_LIMIT_MAX", "5")
                .parse()
                .map_err(|e| format!("LOGIN_RATE_LIMIT_MAX: {}", e))?,
            window_secs: with_default("LOGIN_RATE_LIMIT_WINDOW_SECS", "900")
                .parse()
                .map_err(|e| format!("LOGIN_RATE_LIMIT_WINDOW_SECS: {}", e))?,
            max_clients: with_default("LOGIN_RATE_LIMIT_MAX_CLIENTS", "100000")
                .parse()
                .map_err(|e| format!("LOGIN_RATE_LIMIT_MAX_CLIENTS: {}", e))?,
            trust_forwarded: parse_flag(&with_default("TRUST_PROXY_HEADERS", "false")),
        };

        Ok(Self {
            host: with_default("HOST", "0.0.0.0"),
            port: with_default("PORT", "5005"),
            database_url: required("DATABASE_URL")?,
            jwt: JwtSettings {
                secret: required("TOKEN_SECRET")?,
                issuer: with_default("JWT_ISSUER", "member-portal"),
                audience: with_default("JWT_AUDIENCE", "member-portal-web"),
            },
            admin_emails: parse_admin_list(&with_default("ADMINS", "")),
            frontend_origin: with_default("FRONTEND_ORIGIN", "http://localhost:5173")
                .trim_end_matches('/')
                .to_string(),
            default_import_password,
            recaptcha_secret: optional("RECAPTCHA_SECRET"),
            mailjet,
            azure_blob,
            openai,
            login_rate_limit,
        })
    }
}
