use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &[u8]) -> Self {
        SigningKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// HS256 issuer with independent secrets and TTLs for access and refresh tokens.
pub struct JwtTokenIssuer {
    cfg: JwtConfig,
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
}

impl JwtTokenIssuer {
    pub fn try_new(cfg: JwtConfig) -> Result<Self, TokenError> {
        if cfg.access_secret.is_empty() {
            return Err(TokenError::Misconfigured(
                "access signing secret is empty".to_string(),
            ));
        }
        if cfg.refresh_secret.is_empty() {
            return Err(TokenError::Misconfigured(
                "refresh signing secret is empty".to_string(),
            ));
        }
        if cfg.access_ttl.is_zero() || cfg.refresh_ttl.is_zero() {
            return Err(TokenError::Misconfigured(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if cfg.access_secret == cfg.refresh_secret {
            warn!("access and refresh tokens share one signing secret");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_audience(&[cfg.audience.clone()]);
        validation.set_issuer(&[cfg.issuer.clone()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Ok(JwtTokenIssuer {
            access: SigningKeys::from_secret(&cfg.access_secret),
            refresh: SigningKeys::from_secret(&cfg.refresh_secret),
            cfg,
            validation,
        })
    }

    /// Issues a pair as if the clock read `now`.
    pub fn issue_at(
        &self,
        subject_id: SubjectId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        let access_token_id = TokenId::generate();
        let refresh_token_id = TokenId::generate();

        let (access_token, access_exp) =
            self.sign(TokenKind::Access, subject_id, email, &access_token_id, now)?;
        let (refresh_token, refresh_exp) =
            self.sign(TokenKind::Refresh, subject_id, email, &refresh_token_id, now)?;

        Ok(TokenPair {
            access_token: AccessToken(access_token),
            refresh_token: RefreshToken(refresh_token),
            access_token_id,
            refresh_token_id,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

    fn keys(&self, kind: TokenKind) -> (&SigningKeys, Duration) {
        match kind {
            TokenKind::Access => (&self.access, self.cfg.access_ttl),
            TokenKind::Refresh => (&self.refresh, self.cfg.refresh_ttl),
        }
    }

    fn sign(
        &self,
        kind: TokenKind,
        subject_id: SubjectId,
        email: &str,
        jti: &TokenId,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let (keys, ttl) = self.keys(kind);
        let exp_dt = now + ttl;
        let claims = TokenClaims {
            sub: subject_id.to_string(),
            email: email.to_string(),
            jti: jti.0.clone(),
            iat: now.timestamp(),
            exp: exp_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            typ: kind,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok((token, exp_dt))
    }

    fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, TokenError> {
        let (keys, _) = self.keys(kind);
        let data = decode::<TokenClaims>(token, &keys.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        if data.claims.typ != kind {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, subject_id: SubjectId, email: &str) -> Result<TokenPair, TokenError> {
        self.issue_at(subject_id, email, Utc::now())
    }

    fn verify_access(&self, token: &AccessToken) -> Result<TokenClaims, TokenError> {
        self.verify(TokenKind::Access, &token.0)
    }

    fn verify_refresh(&self, token: &RefreshToken) -> Result<TokenClaims, TokenError> {
        self.verify(TokenKind::Refresh, &token.0)
    }

    fn decode(&self, token: &str) -> Option<TokenClaims> {
        let mut v = Validation::new(Algorithm::HS256);
        v.insecure_disable_signature_validation();
        v.validate_exp = false;
        v.validate_aud = false;
        v.required_spec_claims.clear();
        decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &v)
            .ok()
            .map(|data| data.claims)
    }

    fn access_ttl(&self) -> Duration {
        self.cfg.access_ttl
    }

    fn refresh_ttl(&self) -> Duration {
        self.cfg.refresh_ttl
    }
}
