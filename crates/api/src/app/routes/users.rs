use axum::extract::{Path, State};

use warden_auth::Role;
use warden_core::SubjectId;

use crate::app::AppState;
use crate::app::dto::{CreateUserRequest, PageQuery, UpdateUserRequest, UserInfo};
use crate::app::errors::ApiError;
use crate::app::extract::{JsonBody, QueryParams};
use crate::app::response::{ApiResult, Page, ok};

pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Page<UserInfo>> {
    let (page, page_size) = query.resolve();
    let (records, total) = state.users.list(page, page_size);
    ok(Page {
        list: records.into_iter().map(UserInfo::from).collect(),
        total,
        page,
        page_size,
    })
}

pub async fn create(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> ApiResult<UserInfo> {
    let username = req.username.trim().to_string();
    let role = req.role.trim().to_string();
    if username.is_empty() || role.is_empty() || req.password.is_empty() {
        tracing::warn!("create user with empty fields");
        return Err(ApiError::BadRequest("invalid request parameters"));
    }

    let hash = hash_password(&state, req.password).await?;
    let record = state
        .users
        .create(&username, hash, Role::new(role))
        .map_err(|err| {
            tracing::warn!(error = %err, username = %username, "create user rejected");
            ApiError::from(err)
        })?;

    tracing::info!(subject_id = %record.subject_id, username = %record.username, role = %record.role, "user created");
    ok(record.into())
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<UserInfo> {
    let id = parse_id(&id)?;
    ok(state.users.get(id)?.into())
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> ApiResult<UserInfo> {
    let id = parse_id(&id)?;
    let password = req.password.filter(|p| !p.is_empty());
    let role = req
        .role
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .map(Role::new);
    if password.is_none() && role.is_none() {
        tracing::warn!(subject_id = %id, "update user without changes");
        return Err(ApiError::BadRequest("invalid request parameters"));
    }

    let hash = match password {
        Some(password) => Some(hash_password(&state, password).await?),
        None => None,
    };
    let record = state.users.update(id, hash, role)?;

    tracing::info!(subject_id = %record.subject_id, role = %record.role, "user updated");
    ok(record.into())
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<UserInfo> {
    let id = parse_id(&id)?;
    let record = state.users.delete(id)?;
    tracing::info!(subject_id = %record.subject_id, username = %record.username, "user deleted");
    ok(record.into())
}

fn parse_id(raw: &str) -> Result<SubjectId, ApiError> {
    raw.parse::<SubjectId>().map_err(|err| {
        tracing::warn!(error = %err, "malformed subject id");
        ApiError::from(err)
    })
}

async fn hash_password(state: &AppState, password: String) -> Result<String, ApiError> {
    let hasher = state.credentials.hasher().clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "password hashing task failed");
            ApiError::Internal
        })?
        .map_err(|err| {
            tracing::error!(error = %err, "password hashing failed");
            ApiError::Internal
        })
}
