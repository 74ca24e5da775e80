use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("subject already exists")]
    Conflict,
    #[error("rejected by identity service: {0}")]
    Rejected(String),
    #[error("subject not found")]
    NotFound,
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
    #[error("identity service error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct NewSubject {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Credential and OAuth verification, owned by the user service.
#[async_trait::async_trait]
pub trait IdentityBridge: Send + Sync {
    async fn create_subject(&self, subject: &NewSubject) -> Result<Subject, IdentityError>;

    /// `identifier` is an email or a username. `None` covers both unknown
    /// subjects and wrong passwords.
    async fn verify_credentials(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Option<Subject>, IdentityError>;

    /// Subjects the identity may sign in as. A subject is created when none
    /// match, so the result is never empty on success.
    async fn resolve_oauth_identity(
        &self,
        identity: &OAuthIdentity,
    ) -> Result<Vec<Subject>, IdentityError>;
}

/// Lookups against the domain services.
#[async_trait::async_trait]
pub trait SubjectDirectory: Send + Sync {
    async fn find_subject(&self, subject_id: SubjectId) -> Result<Option<Subject>, IdentityError>;

    async fn link_oauth_identity(
        &self,
        subject_id: SubjectId,
        identity: &OAuthIdentity,
    ) -> Result<Subject, IdentityError>;
}
