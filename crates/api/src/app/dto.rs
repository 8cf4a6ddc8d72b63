use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_auth::{CredentialRecord, Role};
use warden_core::SubjectId;

use crate::context::SecurityContext;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: String,
}

#[derive(Deserialize, Default)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl PageQuery {
    pub const DEFAULT_PAGE_SIZE: usize = 10;
    pub const MAX_PAGE_SIZE: usize = 100;

    /// `(page, page_size)`: 1-based page, size defaulted and capped.
    pub fn resolve(self) -> (usize, usize) {
        let page = self.page.filter(|p| *p > 0).unwrap_or(1);
        let size = self
            .page_size
            .filter(|s| *s > 0)
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .min(Self::MAX_PAGE_SIZE);
        (page, size)
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub id: SubjectId,
    pub username: String,
    pub role: Role,
}

impl From<CredentialRecord> for UserInfo {
    fn from(record: CredentialRecord) -> Self {
        Self {
            id: record.subject_id,
            username: record.username,
            role: record.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub role: Role,
}

impl From<&SecurityContext> for MeResponse {
    fn from(ctx: &SecurityContext) -> Self {
        Self {
            subject_id: ctx.subject_id(),
            subject_name: ctx.subject_name().to_string(),
            role: ctx.role().clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub rules: usize,
}
