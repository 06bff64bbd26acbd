use lazy_static::lazy_static;
use mongodb::bson::DateTime as BsonDateTime;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::Arc;

use crate::database::ClaStore;
use crate::models::{
    ClaConfig, ClaConfigView, ClaQuestion, ClaResponse, ClaResponseView, SubmitAnswersRequest,
    UpdateClaConfigRequest, OPTIONS_PER_QUESTION, QUESTION_COUNT,
};
use crate::services::blob_service::{avatar_blob_name, BlobStorage, AVATARS_CONTAINER};
use crate::services::image_service::ImageGenerator;
use crate::utils::error::AppError;

pub const UNKNOWN_ANSWER: &str = "unknown answer";

lazy_static! {
    static ref TEMPLATE_VAR: Regex = Regex::new(r"\{\{(.*?)\}\}").unwrap();
}

/// Replaces `{{ key }}` placeholders. Unknown keys render as "".
pub fn render_prompt(template: &str, vars: &HashMap<String, String>) -> String {
    TEMPLATE_VAR
        .replace_all(template, |caps: &Captures| {
            vars.get(caps[1].trim()).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Label of the option whose value matches each answer, per question.
pub fn map_answers(questions: &[ClaQuestion], answers: &[String]) -> Vec<String> {
    answers
        .iter()
        .enumerate()
        .map(|(index, answer)| {
            questions
                .get(index)
                .and_then(|q| q.options.iter().find(|o| &o.value == answer))
                .map(|o| o.label.clone())
                .unwrap_or_else(|| UNKNOWN_ANSWER.to_string())
        })
        .collect()
}

pub fn prompt_vars(name: &str, gender: &str, labels: &[String]) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("name".to_string(), name.to_string());
    vars.insert("gender".to_string(), gender.to_string());
    for (index, label) in labels.iter().enumerate() {
        vars.insert(format!("answer{}", index + 1), label.clone());
    }
    vars
}

fn validate_config(request: &UpdateClaConfigRequest) -> Result<(), AppError> {
    if request.security_code.trim().is_empty() {
        return Err(AppError::validation("Security code is required"));
    }
    if request.prompt_template.trim().is_empty() {
        return Err(AppError::validation("Prompt template is required"));
    }
    if request.questions.len() != QUESTION_COUNT {
        return Err(AppError::Validation(format!(
            "Exactly {} questions are required",
            QUESTION_COUNT
        )));
    }
    if let Some(position) = request
        .questions
        .iter()
        .position(|q| q.options.len() != OPTIONS_PER_QUESTION)
    {
        return Err(AppError::Validation(format!(
            "Question {} must have exactly {} options",
            position + 1,
            OPTIONS_PER_QUESTION
        )));
    }
    Ok(())
}

pub struct ClaService {
    store: Arc<dyn ClaStore>,
    images: Arc<dyn ImageGenerator>,
    blobs: Arc<dyn BlobStorage>,
}

impl ClaService {
    pub fn new(
        store: Arc<dyn ClaStore>,
        images: Arc<dyn ImageGenerator>,
        blobs: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            store,
            images,
            blobs,
        }
    }

    async fn load_config(&self) -> Result<ClaConfig, AppError> {
        self.store
            .get_config()
            .await?
            .ok_or_else(|| AppError::not_found("No configuration found"))
    }

    pub async fn get_config(&self, include_code: bool) -> Result<ClaConfigView, AppError> {
        let config = self.load_config().await?;
        Ok(ClaConfigView::from_config(&config, include_code))
    }

    pub async fn update_config(&self, request: UpdateClaConfigRequest) -> Result<ClaConfigView, AppError> {
        validate_config(&request)?;

        let now = BsonDateTime::now();
        let saved = self
            .store
            .save_config(ClaConfig {
                id: None,
                security_code: request.security_code.trim().to_string(),
                questions: request.questions,
                prompt_template: request.prompt_template,
                created_at: now,
                updated_at: now,
            })
            .await?;

        log::info!("🧩 Quiz configuration updated");
        Ok(ClaConfigView::from_config(&saved, true))
    }

    /// Nothing is persisted unless the image was generated and stored.
    pub async fn submit_answers(&self, request: SubmitAnswersRequest) -> Result<ClaResponseView, AppError> {
        let config = self.load_config().await?;

        if request.security_code.trim() != config.security_code.trim() {
            log::warn!("❌ Quiz submission with wrong security code");
            return Err(AppError::auth("Invalid security code"));
        }

        if request.answers.len() != QUESTION_COUNT {
            return Err(AppError::Validation(format!(
                "Exactly {} answers are required",
                QUESTION_COUNT
            )));
        }

        let labels = map_answers(&config.questions, &request.answers);
        let prompt = render_prompt(
            &config.prompt_template,
            &prompt_vars(&request.name, &request.gender, &labels),
        );

        let image = self.images.generate(&prompt).await?;
        let blob_name = avatar_blob_name();
        let image_url = self
            .blobs
            .upload(
                AVATARS_CONTAINER,
                &blob_name,
                image.bytes,
                &image.content_type,
            )
            .await?;

        let inserted = self
            .store
            .insert_response(ClaResponse {
                id: None,
                name: request.name,
                gender: request.gender,
                security_code_used: config.security_code,
                answers: request.answers,
                rendered_prompt: prompt,
                image_url,
                created_at: BsonDateTime::now(),
            })
            .await;

        let response = match inserted {
            Ok(response) => response,
            Err(e) => {
                // The upload has no record pointing at it any more
                if let Err(cleanup) = self.blobs.delete(AVATARS_CONTAINER, &blob_name).await {
                    log::warn!("⚠️  Orphaned avatar {}: {}", blob_name, cleanup);
                }
                return Err(e);
            }
        };

        log::info!("🎨 Avatar generated for {}", response.name);
        Ok(ClaResponseView::from(&response))
    }

    pub async fn get_results(&self) -> Result<Vec<ClaResponseView>, AppError> {
        let responses = self.store.list_responses().await?;
        Ok(responses.iter().map(ClaResponseView::from).collect())
    }
}
