use crate::application_port::OAuthError;
use crate::domain_model::OAuthIdentity;
use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use nanoid::nanoid;
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;

fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_false(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::String(s) => s.eq_ignore_ascii_case("false"),
        _ => false,
    }
}

/// Turns a provider's user-profile document into a verified identity.
///
/// Accepts OpenID Connect (`sub`, `email_verified`) and the common
/// non-OIDC shapes (`id`, `verified_email`, `login`). A profile that says
/// the email is unverified is refused; one that says nothing is trusted.
pub fn verify_oauth_identity(provider: &str, profile: &Value) -> Result<OAuthIdentity, OAuthError> {
    let provider_id = as_id(&profile["sub"])
        .or_else(|| as_id(&profile["id"]))
        .ok_or(OAuthError::MissingField("sub"))?;

    let email = profile["email"]
        .as_str()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| matches!(e.split_once('@'), Some((local, domain)) if !local.is_empty() && !domain.is_empty()))
        .ok_or(OAuthError::MissingField("email"))?;

    if is_false(&profile["email_verified"]) || is_false(&profile["verified_email"]) {
        return Err(OAuthError::UnverifiedEmail);
    }

    let display_name = profile["name"]
        .as_str()
        .or_else(|| profile["login"].as_str())
        .map(str::to_string);

    Ok(OAuthIdentity {
        provider: provider.to_string(),
        provider_id,
        email,
        display_name,
    })
}

/// Stateless CSRF `state` values: `{issued_at}.{nonce}.{hex mac}`, bound to one provider.
pub struct OAuthStateSigner {
    key: Vec<u8>,
    max_age: Duration,
}

impl OAuthStateSigner {
    pub fn new(key: Vec<u8>, max_age: Duration) -> Self {
        Self { key, max_age }
    }

    fn mac(&self, payload: &str) -> Result<Hmac<Sha256>, OAuthError> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.key).map_err(|_| OAuthError::InvalidState)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, provider: &str) -> Result<String, OAuthError> {
        self.issue_at(provider, Utc::now())
    }

    pub fn issue_at(&self, provider: &str, now: DateTime<Utc>) -> Result<String, OAuthError> {
        let head = format!("{}.{}", now.timestamp(), nanoid!());
        let tag = self
            .mac(&format!("{}.{}", head, provider))?
            .finalize()
            .into_bytes();
        Ok(format!("{}.{}", head, hex::encode(tag)))
    }

    pub fn verify(&self, provider: &str, state: &str) -> Result<(), OAuthError> {
        self.verify_at(provider, state, Utc::now())
    }

    pub fn verify_at(&self, provider: &str, state: &str, now: DateTime<Utc>) -> Result<(), OAuthError> {
        let (head, tag_hex) = state.rsplit_once('.').ok_or(OAuthError::InvalidState)?;
        let (issued_at, _nonce) = head.split_once('.').ok_or(OAuthError::InvalidState)?;
        let issued_at: i64 = issued_at.parse().map_err(|_| OAuthError::InvalidState)?;
        let tag = hex::decode(tag_hex).map_err(|_| OAuthError::InvalidState)?;

        self.mac(&format!("{}.{}", head, provider))?
            .verify_slice(&tag)
            .map_err(|_| OAuthError::InvalidState)?;

        let age = now.timestamp() - issued_at;
        if age < 0 || age as u64 > self.max_age.as_secs() {
            return Err(OAuthError::InvalidState);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn oidc_profile_is_accepted() {
        let profile = json!({
            "sub": "1090",
            "email": " Alice@X.com ",
            "email_verified": true,
            "name": "Alice",
        });
        let identity = verify_oauth_identity("google", &profile).unwrap();
        assert_eq!(identity.provider, "google");
        assert_eq!(identity.provider_id, "1090");
        assert_eq!(identity.email, "alice@x.com");
        assert_eq!(identity.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn numeric_ids_and_login_are_accepted() {
        let profile = json!({ "id": 4242, "email": "dev@x.com", "login": "octo" });
        let identity = verify_oauth_identity("github", &profile).unwrap();
        assert_eq!(identity.provider_id, "4242");
        assert_eq!(identity.display_name.as_deref(), Some("octo"));
    }

    #[test]
    fn incomplete_or_unverified_profiles_are_refused() {
        let cases = [
            (json!({ "email": "a@x.com" }), "sub"),
            (json!({ "sub": "", "email": "a@x.com" }), "sub"),
            (json!({ "sub": "1" }), "email"),
            (json!({ "sub": "1", "email": "not-an-email" }), "email"),
        ];
        for (profile, field) in cases {
            match verify_oauth_identity("p", &profile) {
                Err(OAuthError::MissingField(f)) => assert_eq!(f, field),
                other => panic!("expected missing {}, got {:?}", field, other),
            }
        }

        for flag in ["email_verified", "verified_email"] {
            let mut profile = json!({ "sub": "1", "email": "a@x.com" });
            profile[flag] = json!(false);
            assert!(matches!(
                verify_oauth_identity("p", &profile),
                Err(OAuthError::UnverifiedEmail)
            ));
        }
    }

    #[test]
    fn state_round_trips_for_its_provider_only() {
        let signer = OAuthStateSigner::new(b"state-key".to_vec(), Duration::from_secs(600));
        let state = signer.issue("github").unwrap();

        assert!(signer.verify("github", &state).is_ok());
        assert!(matches!(
            signer.verify("google", &state),
            Err(OAuthError::InvalidState)
        ));
    }

    #[test]
    fn tampered_or_stale_state_is_rejected() {
        let signer = OAuthStateSigner::new(b"state-key".to_vec(), Duration::from_secs(600));
        let now = Utc::now();
        let state = signer.issue_at("github", now).unwrap();

        let mut tampered = state.clone();
        tampered.replace_range(0..1, if tampered.starts_with('1') { "2" } else { "1" });
        assert!(signer.verify_at("github", &tampered, now).is_err());
        assert!(signer.verify_at("github", "garbage", now).is_err());

        let later = now + chrono::Duration::seconds(601);
        assert!(signer.verify_at("github", &state, later).is_err());

        let other = OAuthStateSigner::new(b"other-key".to_vec(), Duration::from_secs(600));
        assert!(other.verify_at("github", &state, now).is_err());
    }
}
