//! HTTP application wiring: shared state, the router and the middleware
//! chain around it.
//!
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: `ApiError` and its envelope mapping
//! - `extract.rs`: extractors with envelope rejections
//! - `response.rs`: `Envelope<T>` and `Page<T>`

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use tower::ServiceBuilder;

use warden_auth::{
    Argon2PasswordHasher, CredentialVerifier, PasswordHashError, PasswordHasher, Role,
    SharedTokenCodec, TokenCodec, TokenVerifier,
};
use warden_infra::{FilePolicySource, InMemoryCredentialStore};
use warden_policy::{Enforcer, Model, PolicyEngine};

use crate::config::Settings;
use crate::middleware::{access_log, authn, authz, cors, recovery};

pub mod dto;
pub mod errors;
pub mod extract;
pub mod response;
pub mod routes;

/// Dependencies shared by every request. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Issues tokens on login; swapped when the signing settings change.
    pub tokens: Arc<SharedTokenCodec>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub credentials: Arc<CredentialVerifier>,
    pub users: Arc<InMemoryCredentialStore>,
    pub enforcer: Arc<dyn Enforcer>,
}

impl AppState {
    pub fn new(
        tokens: Arc<SharedTokenCodec>,
        users: Arc<InMemoryCredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        enforcer: Arc<dyn Enforcer>,
    ) -> Result<Self, PasswordHashError> {
        let credentials = CredentialVerifier::new(users.clone(), hasher)?;
        Ok(Self {
            verifier: tokens.clone(),
            tokens,
            credentials: Arc::new(credentials),
            users,
            enforcer,
        })
    }

    /// Composition root. Every failure here is fatal at startup.
    pub async fn build(settings: &Settings) -> anyhow::Result<Self> {
        let codec = TokenCodec::new(settings.jwt.secret.as_bytes(), settings.token_ttl())
            .context("invalid token settings")?;
        let hasher: Arc<dyn PasswordHasher> = Arc::new(
            Argon2PasswordHasher::new(settings.password).context("invalid password hashing cost")?,
        );

        let users = Arc::new(InMemoryCredentialStore::new());
        let bootstrap = &settings.bootstrap;
        match (&bootstrap.admin_username, &bootstrap.admin_password) {
            (Some(username), Some(password)) => {
                users
                    .seed_admin(
                        hasher.as_ref(),
                        username,
                        password,
                        Role::new(bootstrap.admin_role.clone()),
                    )
                    .context("seeding bootstrap admin")?;
            }
            _ => tracing::info!("no bootstrap admin configured"),
        }

        let model = match &settings.policy.model_path {
            Some(path) => Model::from_file(path)
                .await
                .with_context(|| format!("loading policy model from {}", path.display()))?,
            None => Model::default_rbac().await.context("compiling default policy model")?,
        };
        let rules_path = &settings.policy.rules_path;
        let engine = PolicyEngine::load(model, Arc::new(FilePolicySource::new(rules_path.clone())))
            .await
            .with_context(|| format!("loading policy rules from {}", rules_path.display()))?;

        Self::new(
            Arc::new(SharedTokenCodec::new(codec)),
            users,
            hasher,
            Arc::new(engine),
        )
        .context("preparing credential verifier")
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn router(state: AppState) -> Router {
    router_with(state, Router::new())
}

/// Like [`router`], with `extra` mounted behind authentication and
/// authorization next to the built-in protected routes.
pub fn router_with(state: AppState, extra: Router<AppState>) -> Router {
    let protected = routes::protected_router().merge(extra).layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(state.clone(), authn::authenticate))
            .layer(from_fn_with_state(state.clone(), authz::authorize)),
    );

    Router::new()
        .merge(routes::public_router())
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(access_log::log_access))
                .layer(from_fn(recovery::recover))
                .layer(from_fn(cors::cors)),
        )
        .with_state(state)
}
