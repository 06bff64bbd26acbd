use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use super::user::format_timestamp;

pub const CLA_CONFIGS_COLLECTION: &str = "cla_configs";
pub const CLA_RESPONSES_COLLECTION: &str = "cla_responses";

pub const QUESTION_COUNT: usize = 5;
pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ClaOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ClaQuestion {
    #[serde(alias = "questionText")]
    pub text: String,
    pub options: Vec<ClaOption>,
}

/// Quiz configuration singleton (collection `cla_configs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaConfig {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub security_code: String,
    pub questions: Vec<ClaQuestion>,
    pub prompt_template: String,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

/// One quiz submission (collection `cla_responses`). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaResponse {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub gender: String,
    pub security_code_used: String,
    pub answers: Vec<String>,
    pub rendered_prompt: String,
    pub image_url: String,
    pub created_at: BsonDateTime,
}

// ==================== REQUEST/RESPONSE MODELS ====================

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClaConfigRequest {
    #[serde(alias = "code")]
    pub security_code: String,
    pub questions: Vec<ClaQuestion>,
    pub prompt_template: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswersRequest {
    pub name: String,
    pub gender: String,
    #[serde(alias = "code")]
    pub security_code: String,
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaConfigView {
    /// Only present for admin callers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_code: Option<String>,
    pub questions: Vec<ClaQuestion>,
    pub prompt_template: String,
    pub updated_at: String,
}

impl ClaConfigView {
    pub fn from_config(config: &ClaConfig, include_code: bool) -> Self {
        Self {
            security_code: include_code.then(|| config.security_code.clone()),
            questions: config.questions.clone(),
            prompt_template: config.prompt_template.clone(),
            updated_at: format_timestamp(&config.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaResponseView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub gender: String,
    pub answers: Vec<String>,
    pub rendered_prompt: String,
    pub image_url: String,
    pub created_at: String,
}

impl From<&ClaResponse> for ClaResponseView {
    fn from(r: &ClaResponse) -> Self {
        Self {
            id: r.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: r.name.clone(),
            gender: r.gender.clone(),
            answers: r.answers.clone(),
            rendered_prompt: r.rendered_prompt.clone(),
            image_url: r.image_url.clone(),
            created_at: format_timestamp(&r.created_at),
        }
    }
}
