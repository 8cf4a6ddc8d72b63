use warden_auth::{IdentityClaims, Role};
use warden_core::SubjectId;

/// Security context for a request (authenticated identity + role).
///
/// Inserted into the request extensions by the authentication stage and read
/// by authorization and handlers. Never shared across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    subject_id: SubjectId,
    subject_name: String,
    role: Role,
}

impl SecurityContext {
    pub fn new(subject_id: SubjectId, subject_name: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id,
            subject_name: subject_name.into(),
            role,
        }
    }

    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    pub fn role(&self) -> &Role {
        &self.role
    }
}

impl From<IdentityClaims> for SecurityContext {
    fn from(claims: IdentityClaims) -> Self {
        Self::new(claims.sub, claims.name, claims.role)
    }
}
