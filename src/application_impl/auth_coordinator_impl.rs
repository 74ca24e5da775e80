use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_LINK_TTL: Duration = Duration::from_secs(300);

/// Why a refresh was refused. Only ever logged; callers see `InvalidRefreshToken`.
#[derive(Debug)]
enum RefreshFailure {
    Rejected(&'static str),
    SubjectGone,
    Fault { step: &'static str, error: String },
}

fn fault<E: Display>(step: &'static str) -> impl FnOnce(E) -> RefreshFailure {
    move |e| RefreshFailure::Fault {
        step,
        error: e.to_string(),
    }
}

pub struct RealAuthCoordinator {
    token_issuer: Arc<dyn TokenIssuer>,
    session_store: Arc<dyn SessionStore>,
    revocation_store: Arc<dyn RevocationStore>,
    link_session_store: Arc<dyn LinkSessionStore>,
    identity_bridge: Arc<dyn IdentityBridge>,
    subject_directory: Arc<dyn SubjectDirectory>,
    link_ttl: Duration,
    min_password_len: usize,
}

impl RealAuthCoordinator {
    pub fn new(
        token_issuer: Arc<dyn TokenIssuer>,
        session_store: Arc<dyn SessionStore>,
        revocation_store: Arc<dyn RevocationStore>,
        link_session_store: Arc<dyn LinkSessionStore>,
        identity_bridge: Arc<dyn IdentityBridge>,
        subject_directory: Arc<dyn SubjectDirectory>,
    ) -> Self {
        Self {
            token_issuer,
            session_store,
            revocation_store,
            link_session_store,
            identity_bridge,
            subject_directory,
            link_ttl: DEFAULT_LINK_TTL,
            min_password_len: 6,
        }
    }

    pub fn with_link_ttl(mut self, link_ttl: Duration) -> Self {
        self.link_ttl = link_ttl;
        self
    }

    fn validate_register(&self, input: &RegisterInput) -> Result<(), AuthError> {
        let email = input.email.trim();
        let well_formed = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
            }
            None => false,
        };
        if !well_formed {
            return Err(AuthError::Validation("email is not valid".to_string()));
        }
        if input.username.trim().is_empty() {
            return Err(AuthError::Validation("username is required".to_string()));
        }
        if input.password.chars().count() < self.min_password_len {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                self.min_password_len
            )));
        }
        Ok(())
    }

    fn secs(d: Duration) -> u64 {
        d.as_secs().max(1)
    }

    fn remaining_secs(until: DateTime<Utc>) -> u64 {
        let secs = (until - Utc::now()).num_seconds();
        if secs <= 0 { 1 } else { secs as u64 }
    }

    fn refresh_ttl_secs(&self) -> u64 {
        Self::secs(self.token_issuer.refresh_ttl())
    }

    async fn open_session(
        &self,
        subject: Subject,
        device_info: Option<String>,
    ) -> Result<AuthResponse, AuthError> {
        let tokens = self.token_issuer.issue(subject.id, &subject.email)?;
        let record = SessionRecord::new(
            subject.id,
            &subject.email,
            tokens.refresh_token_id.clone(),
            device_info,
        );
        self.session_store
            .put(
                subject.id,
                &tokens.refresh_token_id,
                &record,
                self.refresh_ttl_secs(),
            )
            .await?;

        info!(subject_id = %subject.id, session = %tokens.refresh_token_id, "session opened");
        Ok(AuthResponse {
            user: subject,
            tokens,
        })
    }

    async fn rotate(&self, refresh_token: &RefreshToken) -> Result<TokenPair, RefreshFailure> {
        let claims = self
            .token_issuer
            .verify_refresh(refresh_token)
            .map_err(|_| RefreshFailure::Rejected("verify"))?;
        let subject_id = claims
            .subject_id()
            .map_err(|_| RefreshFailure::Rejected("verify"))?;
        let old_id = claims.token_id();

        if self
            .revocation_store
            .is_revoked(&old_id)
            .await
            .map_err(fault("revocation_check"))?
        {
            warn!(%subject_id, session = %old_id, "revoked refresh token presented again");
            return Err(RefreshFailure::Rejected("revoked"));
        }

        let session = self
            .session_store
            .get(subject_id, &old_id)
            .await
            .map_err(fault("session_lookup"))?
            .ok_or(RefreshFailure::Rejected("session_missing"))?;

        let subject = self
            .subject_directory
            .find_subject(subject_id)
            .await
            .map_err(fault("subject_lookup"))?
            .ok_or(RefreshFailure::SubjectGone)?;

        let ttl = self.refresh_ttl_secs();
        self.revocation_store
            .revoke(&old_id, ttl)
            .await
            .map_err(fault("revoke"))?;
        if !self
            .session_store
            .delete(subject_id, &old_id)
            .await
            .map_err(fault("session_delete"))?
        {
            return Err(RefreshFailure::Rejected("concurrent_rotation"));
        }

        let tokens = self
            .token_issuer
            .issue(subject.id, &subject.email)
            .map_err(fault("issue"))?;
        let record = session.rotated(tokens.refresh_token_id.clone(), &subject.email);
        self.session_store
            .put(subject.id, &tokens.refresh_token_id, &record, ttl)
            .await
            .map_err(fault("session_store"))?;

        debug!(%subject_id, from = %old_id, to = %tokens.refresh_token_id, "refresh token rotated");
        Ok(tokens)
    }
}

#[async_trait::async_trait]
impl AuthCoordinator for RealAuthCoordinator {
    async fn register(&self, input: RegisterInput) -> Result<AuthResponse, AuthError> {
        self.validate_register(&input)?;

        let subject = self
            .identity_bridge
            .create_subject(&NewSubject {
                email: input.email.trim().to_string(),
                username: input.username.trim().to_string(),
                password: input.password,
            })
            .await?;

        self.open_session(subject, input.device_info).await
    }

    async fn login(&self, input: LoginInput) -> Result<AuthResponse, AuthError> {
        let identifier = input.identifier.trim();
        if identifier.is_empty() || input.password.is_empty() {
            return Err(AuthError::Validation(
                "identifier and password are required".to_string(),
            ));
        }

        let subject = match self
            .identity_bridge
            .verify_credentials(identifier, &input.password)
            .await
        {
            Ok(Some(subject)) => subject,
            Ok(None) | Err(IdentityError::NotFound) | Err(IdentityError::Rejected(_)) => {
                debug!("login rejected");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        self.open_session(subject, input.device_info).await
    }

    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AuthError> {
        match self.rotate(refresh_token).await {
            Ok(tokens) => Ok(tokens),
            Err(RefreshFailure::SubjectGone) => Err(AuthError::SubjectNotFound),
            Err(RefreshFailure::Rejected(step)) => {
                warn!(step, "refresh rejected");
                Err(AuthError::InvalidRefreshToken)
            }
            Err(RefreshFailure::Fault { step, error }) => {
                warn!(step, %error, "refresh failed");
                Err(AuthError::InvalidRefreshToken)
            }
        }
    }

    async fn validate_access(&self, access_token: &AccessToken) -> AccessValidation {
        let claims = match self.token_issuer.verify_access(access_token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "access token rejected");
                return AccessValidation::Invalid;
            }
        };
        let Ok(subject_id) = claims.subject_id() else {
            return AccessValidation::Invalid;
        };

        match self.revocation_store.is_revoked(&claims.token_id()).await {
            Ok(false) => {}
            Ok(true) => return AccessValidation::Invalid,
            Err(e) => {
                warn!(error = %e, "revocation check failed during validate");
                return AccessValidation::Invalid;
            }
        }

        match self.subject_directory.find_subject(subject_id).await {
            Ok(Some(subject)) => AccessValidation::Valid(subject),
            Ok(None) => {
                debug!(%subject_id, "access token for a vanished subject");
                AccessValidation::Invalid
            }
            Err(e) => {
                warn!(error = %e, "subject lookup failed during validate");
                AccessValidation::Invalid
            }
        }
    }

    async fn logout(&self, refresh_token: &RefreshToken) {
        let Some(claims) = self.token_issuer.decode(&refresh_token.0) else {
            debug!("logout with an undecodable token");
            return;
        };
        let Ok(subject_id) = claims.subject_id() else {
            debug!("logout with a token lacking a subject");
            return;
        };
        let token_id = claims.token_id();
        // claims are unverified; no genuine refresh token outlives the refresh TTL
        let ttl = claims
            .expires_at()
            .map(Self::remaining_secs)
            .map(|secs| secs.min(self.refresh_ttl_secs()))
            .unwrap_or_else(|| self.refresh_ttl_secs());

        if let Err(e) = self.revocation_store.revoke(&token_id, ttl).await {
            debug!(error = %e, "logout revoke failed");
        }
        if let Err(e) = self.session_store.delete(subject_id, &token_id).await {
            debug!(error = %e, "logout session delete failed");
        }
        info!(%subject_id, session = %token_id, "session closed");
    }

    async fn logout_all(&self, access_token: &AccessToken) -> Result<usize, AuthError> {
        let claims = self
            .token_issuer
            .verify_access(access_token)
            .map_err(|_| AuthError::InvalidToken)?;
        let subject_id = claims.subject_id().map_err(|_| AuthError::InvalidToken)?;
        if self.revocation_store.is_revoked(&claims.token_id()).await? {
            return Err(AuthError::InvalidToken);
        }

        let ttl = self.refresh_ttl_secs();
        let mut closed = 0;
        for session in self.session_store.list_by_subject(subject_id).await? {
            self.revocation_store
                .revoke(&session.refresh_token_id, ttl)
                .await?;
            if self
                .session_store
                .delete(subject_id, &session.refresh_token_id)
                .await?
            {
                closed += 1;
            }
        }

        info!(%subject_id, closed, "all sessions closed");
        Ok(closed)
    }

    async fn link_oauth_identity(
        &self,
        identity: OAuthIdentity,
    ) -> Result<OAuthOutcome, AuthError> {
        let mut subjects = self
            .identity_bridge
            .resolve_oauth_identity(&identity)
            .await?;

        match subjects.len() {
            0 => Err(AuthError::Internal(
                "identity service resolved no subject".to_string(),
            )),
            1 => {
                let subject = subjects.remove(0);
                let response = self.open_session(subject, None).await?;
                Ok(OAuthOutcome::Authenticated(response))
            }
            candidates => {
                let session_id = LinkSessionId::generate(Utc::now());
                let session = EphemeralLinkSession {
                    email: identity.email,
                    provider: identity.provider,
                    provider_id: identity.provider_id,
                    candidates: subjects,
                };
                self.link_session_store
                    .put(&session_id, &session, Self::secs(self.link_ttl))
                    .await?;

                info!(candidates, provider = %session.provider, "account selection pending");
                Ok(OAuthOutcome::SelectAccount { session_id })
            }
        }
    }

    async fn oauth_candidates(
        &self,
        session_id: &LinkSessionId,
    ) -> Result<EphemeralLinkSession, AuthError> {
        self.link_session_store
            .get(session_id)
            .await?
            .ok_or(AuthError::LinkSessionNotFound)
    }

    async fn select_oauth_account(
        &self,
        session_id: &LinkSessionId,
        subject_id: SubjectId,
    ) -> Result<AuthResponse, AuthError> {
        let session = self
            .link_session_store
            .get(session_id)
            .await?
            .ok_or(AuthError::LinkSessionNotFound)?;

        if !session.candidates.iter().any(|c| c.id == subject_id) {
            return Err(AuthError::Validation(
                "subject is not a candidate of this link session".to_string(),
            ));
        }

        let subject = self
            .subject_directory
            .link_oauth_identity(subject_id, &session.identity())
            .await
            .map_err(|e| match e {
                IdentityError::Unavailable(m) => AuthError::UpstreamUnavailable(m),
                other => AuthError::Internal(other.to_string()),
            })?;

        if !self.link_session_store.remove(session_id).await? {
            return Err(AuthError::LinkSessionNotFound);
        }
        info!(%subject_id, provider = %session.provider, "oauth identity linked");

        self.open_session(subject, None).await
    }
}
