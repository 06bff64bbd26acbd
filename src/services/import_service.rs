// ==================== USER IMPORT ====================
// Spreadsheet paste -> column mapping -> preview -> bulk insert.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::database::UserStore;
use crate::models::{PublicUser, Role, User};
use crate::services::auth_service::hash_password;
use crate::utils::error::AppError;
use crate::utils::validation::{capitalize_words, is_valid_import_email};

pub const IMPORT_COMPLETE_MESSAGE: &str = "Users imported successfully";
pub const IMPORT_PARTIAL_MESSAGE: &str =
    "Users partially imported. The following users haven't been added :";

/// Target of one pasted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    LastName,
    FirstName,
    Email,
    Role,
    Ignore,
}

impl FieldKey {
    /// Suggested target for a header that is already trimmed and lower-cased.
    pub fn from_header(header: &str) -> FieldKey {
        match header {
            "nom" | "lastname" | "last name" => FieldKey::LastName,
            "prenom" | "prénom" | "firstname" | "first name" => FieldKey::FirstName,
            "email" | "e-mail" | "mail" => FieldKey::Email,
            "role" | "rôle" => FieldKey::Role,
            _ => FieldKey::Ignore,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ColumnMapping {
    pub header: String,
    pub field: FieldKey,
}

/// One data line after mapping. `line` counts from the header line (= 1).
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub line: usize,
    /// Cells as pasted, in column order
    pub raw_values: Vec<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    #[serde(skip)]
    pub password: String,
    pub has_error: bool,
    pub errors: Vec<String>,
}

impl ImportRow {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Row accepted by `POST /users/import`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportUser {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub role: Option<String>,
}

impl From<&ImportRow> for ImportUser {
    fn from(row: &ImportRow) -> Self {
        Self {
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            email: row.email.clone(),
            role: Some(row.role.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ImportReport {
    pub message: String,
    pub created: Vec<PublicUser>,
    pub errors: Vec<String>,
}

/// Body of `POST /users/import/preview`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct ImportPreviewRequest {
    #[serde(default)]
    pub input: String,
    /// Header -> field overrides of the suggested mapping
    pub mapping: Option<HashMap<String, FieldKey>>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub mapping: Vec<ColumnMapping>,
    pub rows: Vec<ImportRow>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MappingStep {
    pub headers: Vec<String>,
    pub mapping: Vec<FieldKey>,
    lines: Vec<String>,
}

impl MappingStep {
    pub fn columns(&self) -> Vec<ColumnMapping> {
        self.headers
            .iter()
            .zip(&self.mapping)
            .map(|(header, field)| ColumnMapping {
                header: header.clone(),
                field: *field,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PreviewStep {
    pub mapping: MappingStep,
    pub rows: Vec<ImportRow>,
}

impl PreviewStep {
    pub fn errors(&self) -> Vec<String> {
        self.rows.iter().flat_map(|r| r.errors.iter().cloned()).collect()
    }
}

#[derive(Debug, Clone)]
pub enum ImportState {
    Input,
    Mapping(MappingStep),
    Preview(PreviewStep),
    Done(ImportReport),
}

pub struct ImportSession {
    default_password: String,
    state: ImportState,
}

fn map_line(line: &str, line_number: usize, step: &MappingStep, default_password: &str) -> ImportRow {
    let values: Vec<&str> = line.split('\t').collect();
    let mut row = ImportRow {
        line: line_number,
        raw_values: values.iter().map(|v| v.to_string()).collect(),
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
        role: Role::User.as_str().to_string(),
        password: default_password.to_string(),
        has_error: false,
        errors: Vec::new(),
    };

    let mut role_value = None;
    let mut email_value = None;

    for (index, field) in step.mapping.iter().enumerate() {
        let value = values.get(index).map(|v| v.trim()).unwrap_or("");
        match field {
            FieldKey::FirstName => row.first_name = capitalize_words(&value.to_lowercase()),
            FieldKey::LastName => row.last_name = capitalize_words(&value.to_lowercase()),
            FieldKey::Email => email_value = Some(value.to_lowercase()),
            FieldKey::Role => role_value = Some(value.to_lowercase()),
            FieldKey::Ignore => {}
        }
    }

    if let Some(role) = role_value {
        if Role::parse(&role).is_none() {
            row.errors
                .push(format!("Invalid role on line {} : {}", line_number, role));
        }
        row.role = role;
    }

    match email_value.filter(|e| !e.is_empty()) {
        Some(email) => {
            if !is_valid_import_email(&email) {
                row.errors
                    .push(format!("Invalid email on line {} : {}", line_number, email));
            }
            row.email = email;
        }
        None => row
            .errors
            .push(format!("Missing email on line {}", line_number)),
    }

    row.has_error = !row.errors.is_empty();
    row
}

impl ImportSession {
    pub fn new(default_password: impl Into<String>) -> Self {
        Self {
            default_password: default_password.into(),
            state: ImportState::Input,
        }
    }

    pub fn state(&self) -> &ImportState {
        &self.state
    }

    /// Input -> Mapping. On error the session stays where it was.
    pub fn parse(&mut self, raw: &str) -> Result<MappingStep, AppError> {
        let lines: Vec<String> = raw
            .trim()
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();

        if lines.len() < 2 {
            return Err(AppError::validation(
                "Incorrect format: paste a header line and at least one row",
            ));
        }

        let headers: Vec<String> = lines[0]
            .split('\t')
            .map(|h| h.trim().to_lowercase())
            .collect();
        let mapping = headers.iter().map(|h| FieldKey::from_header(h)).collect();

        let step = MappingStep {
            headers,
            mapping,
            lines: lines[1..].to_vec(),
        };
        self.state = ImportState::Mapping(step.clone());
        Ok(step)
    }

    /// Mapping -> Preview. Can be called again from Preview with another mapping.
    pub fn apply_mapping(
        &mut self,
        overrides: Option<&HashMap<String, FieldKey>>,
    ) -> Result<PreviewStep, AppError> {
        let mut step = match &self.state {
            ImportState::Mapping(step) => step.clone(),
            ImportState::Preview(preview) => preview.mapping.clone(),
            _ => return Err(AppError::validation("Nothing to map: parse the input first")),
        };

        if let Some(overrides) = overrides {
            for (header, field) in overrides {
                let header = header.trim().to_lowercase();
                if !step.headers.contains(&header) {
                    return Err(AppError::Validation(format!("Unknown column: {}", header)));
                }
                for (index, h) in step.headers.iter().enumerate() {
                    if *h == header {
                        step.mapping[index] = *field;
                    }
                }
            }
        }

        let rows = step
            .lines
            .iter()
            .enumerate()
            .map(|(index, line)| map_line(line, index + 2, &step, &self.default_password))
            .collect();

        let preview = PreviewStep { mapping: step, rows };
        self.state = ImportState::Preview(preview.clone());
        Ok(preview)
    }

    /// Preview -> Done. Only rows without errors are sent to the store.
    pub async fn submit(&mut self, store: &dyn UserStore) -> Result<ImportReport, AppError> {
        let preview = match &self.state {
            ImportState::Preview(preview) => preview,
            _ => return Err(AppError::validation("Nothing to import: preview the rows first")),
        };

        let rows: Vec<ImportUser> = preview
            .rows
            .iter()
            .filter(|r| r.is_valid())
            .map(ImportUser::from)
            .collect();
        let mut errors = preview.errors();

        let mut report = import_users(store, rows, &self.default_password).await?;
        if !errors.is_empty() {
            errors.append(&mut report.errors);
            report.errors = errors;
            report.message = IMPORT_PARTIAL_MESSAGE.to_string();
        }
        self.state = ImportState::Done(report.clone());
        Ok(report)
    }
}

/// Store-side import: re-validates, drops duplicates, hashes the default
/// password once and bulk-inserts whatever is left.
pub async fn import_users(
    store: &dyn UserStore,
    rows: Vec<ImportUser>,
    default_password: &str,
) -> Result<ImportReport, AppError> {
    let mut errors = Vec::new();
    let mut candidates = Vec::new();
    let mut seen = HashSet::new();

    for row in rows {
        let email = row.email.trim().to_lowercase();
        if email.is_empty() {
            errors.push("Missing email".to_string());
            continue;
        }
        if !is_valid_import_email(&email) {
            errors.push(format!("Invalid email : {}", email));
            continue;
        }

        let role = match row.role.as_deref().map(|r| r.trim().to_lowercase()) {
            None => Role::User,
            Some(r) if r.is_empty() => Role::User,
            Some(r) => match Role::parse(&r) {
                Some(role) => role,
                None => {
                    errors.push(format!("Invalid role : {}", r));
                    continue;
                }
            },
        };

        if !seen.insert(email.clone()) {
            errors.push(format!("Email already in database : {}", email));
            continue;
        }

        candidates.push((email, role, row.first_name, row.last_name));
    }

    let emails: Vec<String> = candidates.iter().map(|(e, ..)| e.clone()).collect();
    let existing = store.existing_emails(&emails).await?;

    let mut users = Vec::new();
    if candidates.iter().any(|(e, ..)| !existing.contains(e)) {
        let password_hash = hash_password(default_password.to_string()).await?;

        for (email, role, first_name, last_name) in candidates {
            if existing.contains(&email) {
                errors.push(format!("Email already in database : {}", email));
                continue;
            }
            users.push(User::new(
                email,
                password_hash.clone(),
                capitalize_words(&first_name.trim().to_lowercase()),
                capitalize_words(&last_name.trim().to_lowercase()),
                role,
                None,
            ));
        }
    } else {
        for (email, ..) in candidates {
            errors.push(format!("Email already in database : {}", email));
        }
    }

    let emails: Vec<String> = users.iter().map(|u| u.email.clone()).collect();
    let mut created = Vec::new();

    for (outcome, email) in store.insert_many(users).await?.into_iter().zip(emails) {
        match outcome {
            Ok(user) => created.push(PublicUser::from(user)),
            Err(AppError::Conflict(msg)) => errors.push(msg),
            Err(e) => {
                log::error!("❌ Import of {} failed: {}", email, e);
                errors.push(format!("Failed to import {} : {}", email, e.public_message()));
            }
        }
    }

    log::info!(
        "📥 Import finished: {} created, {} rejected",
        created.len(),
        errors.len()
    );

    let message = if errors.is_empty() {
        IMPORT_COMPLETE_MESSAGE
    } else {
        IMPORT_PARTIAL_MESSAGE
    };

    Ok(ImportReport {
        message: message.to_string(),
        created,
        errors,
    })
}

pub struct ImportService {
    users: Arc<dyn UserStore>,
    default_password: String,
}

impl ImportService {
    pub fn new(users: Arc<dyn UserStore>, default_password: String) -> Self {
        Self {
            users,
            default_password,
        }
    }

    pub fn preview(&self, request: &ImportPreviewRequest) -> Result<ImportPreview, AppError> {
        let mut session = ImportSession::new(self.default_password.clone());
        session.parse(&request.input)?;
        let preview = session.apply_mapping(request.mapping.as_ref())?;

        Ok(ImportPreview {
            mapping: preview.mapping.columns(),
            errors: preview.errors(),
            headers: preview.mapping.headers,
            rows: preview.rows,
        })
    }

    pub async fn import(&self, rows: Vec<ImportUser>) -> Result<ImportReport, AppError> {
        import_users(self.users.as_ref(), rows, &self.default_password).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryUserStore;

    const PASSWORD: &str = "Import3dPass";

    fn mapped(raw: &str) -> PreviewStep {
        let mut session = ImportSession::new(PASSWORD);
        session.parse(raw).unwrap();
        session.apply_mapping(None).unwrap()
    }

    #[test]
    fn test_header_synonyms() {
        assert_eq!(FieldKey::from_header("nom"), FieldKey::LastName);
        assert_eq!(FieldKey::from_header("last name"), FieldKey::LastName);
        assert_eq!(FieldKey::from_header("prénom"), FieldKey::FirstName);
        assert_eq!(FieldKey::from_header("firstname"), FieldKey::FirstName);
        assert_eq!(FieldKey::from_header("e-mail"), FieldKey::Email);
        assert_eq!(FieldKey::from_header("mail"), FieldKey::Email);
        assert_eq!(FieldKey::from_header("rôle"), FieldKey::Role);
        assert_eq!(FieldKey::from_header("phone"), FieldKey::Ignore);
    }

    #[test]
    fn test_parse_requires_header_and_row() {
        let mut session = ImportSession::new(PASSWORD);
        assert!(matches!(session.parse("email"), Err(AppError::Validation(_))));
        assert!(matches!(session.state(), ImportState::Input));

        let step = session.parse("Nom\tPrénom\tE-mail\tPhone\r\nDOE\tjane\tJ@X.io\t555").unwrap();
        assert_eq!(step.headers, vec!["nom", "prénom", "e-mail", "phone"]);
        assert_eq!(
            step.mapping,
            vec![FieldKey::LastName, FieldKey::FirstName, FieldKey::Email, FieldKey::Ignore]
        );
    }

    #[test]
    fn test_mapping_normalizes_rows() {
        let preview = mapped("nom\tprenom\temail\trole\nDU PONT\tjEAN-marc\tJM@Example.COM\tModerator");
        let row = &preview.rows[0];
        assert_eq!(row.line, 2);
        assert_eq!(row.last_name, "Du Pont");
        assert_eq!(row.first_name, "Jean-Marc");
        assert_eq!(row.email, "jm@example.com");
        assert_eq!(row.role, "moderator");
        assert_eq!(row.password, PASSWORD);
        assert!(row.is_valid());
    }

    #[test]
    fn test_row_errors_are_independent() {
        let preview = mapped(
            "email\trole\nok@example.com\tuser\nnot-an-email\tuser\nbad@example.com\tboss\n\tadmin",
        );
        assert!(preview.rows[0].is_valid());
        assert_eq!(preview.rows[1].errors, vec!["Invalid email on line 3 : not-an-email"]);
        assert_eq!(preview.rows[2].errors, vec!["Invalid role on line 4 : boss"]);
        assert_eq!(preview.rows[3].errors, vec!["Missing email on line 5"]);
        assert_eq!(preview.errors().len(), 3);
    }

    #[test]
    fn test_rows_keep_raw_cells() {
        let preview = mapped("email\tnom\nNOT-AN-EMAIL\t Doe ");
        let row = &preview.rows[0];
        assert_eq!(row.raw_values, vec!["NOT-AN-EMAIL", " Doe "]);
        assert!(row.has_error);

        let json = serde_json::to_value(row).unwrap();
        assert_eq!(json["rawValues"][0], "NOT-AN-EMAIL");
        assert_eq!(json["hasError"], true);
        assert!(json.get("password").is_none());
    }

    #[tokio::test]
    async fn test_clean_submit_is_complete() {
        let store = MemoryUserStore::new();
        let mut session = ImportSession::new(PASSWORD);
        session.parse("email\none@example.com\ntwo@example.com").unwrap();
        session.apply_mapping(None).unwrap();

        let report = session.submit(&store).await.unwrap();
        assert_eq!(report.created.len(), 2);
        assert!(report.errors.is_empty());
        assert_eq!(report.message, IMPORT_COMPLETE_MESSAGE);
    }

    #[test]
    fn test_missing_trailing_cells_are_empty() {
        let preview = mapped("email\tnom\tprenom\na@b.co");
        assert_eq!(preview.rows[0].last_name, "");
        assert_eq!(preview.rows[0].first_name, "");
        assert!(preview.rows[0].is_valid());
    }

    #[test]
    fn test_apply_mapping_is_idempotent() {
        let mut session = ImportSession::new(PASSWORD);
        session.parse("col a\tcol b\nx@y.io\tSmith").unwrap();

        let overrides = HashMap::from([
            ("col a".to_string(), FieldKey::Email),
            ("COL B".to_string(), FieldKey::LastName),
        ]);
        let first = session.apply_mapping(Some(&overrides)).unwrap().rows;
        let second = session.apply_mapping(Some(&overrides)).unwrap().rows;
        assert_eq!(first, second);
        assert_eq!(first[0].email, "x@y.io");
        assert_eq!(first[0].last_name, "Smith");
    }

    #[test]
    fn test_unknown_override_rejected() {
        let mut session = ImportSession::new(PASSWORD);
        session.parse("email\nx@y.io").unwrap();
        let overrides = HashMap::from([("phone".to_string(), FieldKey::Email)]);
        assert!(matches!(
            session.apply_mapping(Some(&overrides)),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_imports_only_valid_rows() {
        let store = MemoryUserStore::new();
        let mut session = ImportSession::new(PASSWORD);
        session
            .parse("email\tprenom\tnom\ngood@example.com\tann\tlee\nnot-an-email\tbob\tray")
            .unwrap();
        session.apply_mapping(None).unwrap();

        let report = session.submit(&store).await.unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].first_name, "Ann");
        assert_eq!(report.errors, vec!["Invalid email on line 3 : not-an-email"]);
        assert_eq!(report.message, IMPORT_PARTIAL_MESSAGE);
        assert_eq!(store.count(), 1);

        let stored = &store.all()[0];
        assert_ne!(stored.password, PASSWORD);
        assert!(bcrypt::verify(PASSWORD, &stored.password).unwrap());
        assert!(matches!(session.state(), ImportState::Done(_)));
    }

    #[tokio::test]
    async fn test_import_reports_duplicates() {
        let store = MemoryUserStore::new();
        store
            .insert(User::new(
                "taken@example.com".into(),
                "hash".into(),
                "T".into(),
                "T".into(),
                Role::User,
                None,
            ))
            .await
            .unwrap();

        let row = |email: &str| ImportUser {
            email: email.to_string(),
            first_name: "a".into(),
            last_name: "b".into(),
            role: None,
        };
        let report = import_users(
            &store,
            vec![row("new@example.com"), row("TAKEN@example.com"), row("new@example.com")],
            PASSWORD,
        )
        .await
        .unwrap();

        assert_eq!(report.created.len(), 1);
        assert_eq!(
            report.errors,
            vec![
                "Email already in database : new@example.com",
                "Email already in database : taken@example.com",
            ]
        );
        assert_eq!(report.message, IMPORT_PARTIAL_MESSAGE);
        assert_eq!(store.count(), 2);
    }

    #[tokio::test]
    async fn test_import_revalidates_rows() {
        let store = MemoryUserStore::new();
        let report = import_users(
            &store,
            vec![
                ImportUser {
                    email: "x@y".into(),
                    ..Default::default()
                },
                ImportUser {
                    email: "ok@y.io".into(),
                    role: Some("superuser".into()),
                    ..Default::default()
                },
            ],
            PASSWORD,
        )
        .await
        .unwrap();
        assert!(report.created.is_empty());
        assert_eq!(report.errors.len(), 2);
        assert_eq!(store.count(), 0);
    }
}
