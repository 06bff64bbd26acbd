use serde::{Deserialize, Serialize};

use super::user::PublicUser;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    LastName,
    FirstName,
    Email,
    Role,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn parse(value: &str) -> Option<SortField> {
        match value {
            "lastName" => Some(SortField::LastName),
            "firstName" => Some(SortField::FirstName),
            "email" => Some(SortField::Email),
            "role" => Some(SortField::Role),
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            _ => None,
        }
    }

    /// Document field name in the `users` collection.
    pub fn field_name(&self) -> &'static str {
        match self {
            SortField::LastName => "lastName",
            SortField::FirstName => "firstName",
            SortField::Email => "email",
            SortField::Role => "role",
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than "desc" sorts ascending.
    pub fn parse(value: &str) -> SortOrder {
        if value.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

/// Store-level query. `search` is the raw text typed by the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryQuery {
    pub search: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub skip: u64,
    pub limit: u64,
}

impl DirectoryQuery {
    /// True when the page starts after the last match, or further than the
    /// driver's signed skip can express.
    pub fn is_past_end(&self, total: u64) -> bool {
        self.skip >= total || self.skip > i64::MAX as u64
    }
}

/// Query string accepted by `/users/all` and `/users/search`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DirectoryParams {
    /// Case-insensitive text matched against names and email (search only)
    pub query: Option<String>,
    /// 1-based page number
    pub page: Option<u64>,
    /// Page size, 1..=100
    pub limit: Option<u64>,
    /// lastName, firstName, email, role, createdAt or updatedAt
    pub sort_by: Option<String>,
    /// asc or desc
    pub order: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryPage {
    pub items: Vec<PublicUser>,
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
}
