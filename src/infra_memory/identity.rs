use crate::domain_model::*;
use crate::domain_port::*;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

struct Account {
    subject: Subject,
    password_hash: Option<String>,
    oauth_links: Vec<(String, String)>,
}

impl Account {
    fn linked_to(&self, identity: &OAuthIdentity) -> bool {
        self.oauth_links
            .iter()
            .any(|(p, id)| *p == identity.provider && *id == identity.provider_id)
    }

    fn link(&mut self, identity: &OAuthIdentity) {
        if !self.linked_to(identity) {
            self.oauth_links
                .push((identity.provider.clone(), identity.provider_id.clone()));
        }
    }
}

/// Self-contained identity service for development and tests.
/// Passwords are stored as argon2 PHC strings.
pub struct MemoryIdentityBridge {
    accounts: DashMap<SubjectId, Account>,
    argon2: Argon2<'static>,
    unavailable: AtomicBool,
    // held while checking uniqueness and inserting a new subject
    creating: Mutex<()>,
}

impl MemoryIdentityBridge {
    pub fn new() -> Self {
        Self::with_argon2(Argon2::default())
    }

    /// Minimum argon2 cost. Fast enough for test suites, useless against offline attacks.
    pub fn with_low_cost() -> Self {
        let params = Params::new(
            Params::MIN_M_COST,
            Params::MIN_T_COST,
            Params::MIN_P_COST,
            None,
        )
        .unwrap_or_default();
        Self::with_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    pub fn with_argon2(argon2: Argon2<'static>) -> Self {
        MemoryIdentityBridge {
            accounts: DashMap::new(),
            argon2,
            unavailable: AtomicBool::new(false),
            creating: Mutex::new(()),
        }
    }

    /// Stores `subject` as-is, skipping the uniqueness checks of `create_subject`.
    pub fn insert(&self, subject: Subject, password: Option<&str>) -> Result<(), IdentityError> {
        let password_hash = password.map(|p| self.hash_password(p)).transpose()?;
        self.accounts.insert(
            subject.id,
            Account {
                subject,
                password_hash,
                oauth_links: Vec::new(),
            },
        );
        Ok(())
    }

    fn creation_lock(&self) -> MutexGuard<'_, ()> {
        self.creating.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn remove(&self, subject_id: SubjectId) -> bool {
        self.accounts.remove(&subject_id).is_some()
    }

    /// Makes every call fail with `IdentityError::Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable(
                "memory identity bridge switched off".to_string(),
            ));
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String, IdentityError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| IdentityError::Internal(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool, IdentityError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| IdentityError::Internal(format!("invalid PHC hash: {}", e)))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(IdentityError::Internal(format!("verify error: {}", e))),
        }
    }

    fn find_by_identifier(&self, identifier: &str) -> Option<(Subject, Option<String>)> {
        let email = identifier.to_lowercase();
        self.accounts
            .iter()
            .find(|a| a.subject.email.to_lowercase() == email || a.subject.username == identifier)
            .map(|a| (a.subject.clone(), a.password_hash.clone()))
    }

    fn unique_username(&self, email: &str) -> String {
        let base = email.split('@').next().unwrap_or("user").to_string();
        let taken = |name: &str| self.accounts.iter().any(|a| a.subject.username == name);
        if !taken(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

impl Default for MemoryIdentityBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityBridge for MemoryIdentityBridge {
    async fn create_subject(&self, new: &NewSubject) -> Result<Subject, IdentityError> {
        self.ensure_available()?;
        let email = new.email.trim().to_lowercase();
        let username = new.username.trim().to_string();
        let password_hash = self.hash_password(&new.password)?;

        let _creating = self.creation_lock();
        let exists = self
            .accounts
            .iter()
            .any(|a| a.subject.email.to_lowercase() == email || a.subject.username == username);
        if exists {
            return Err(IdentityError::Conflict);
        }

        let subject = Subject {
            id: SubjectId::new_random(),
            email,
            username,
        };
        self.accounts.insert(
            subject.id,
            Account {
                subject: subject.clone(),
                password_hash: Some(password_hash),
                oauth_links: Vec::new(),
            },
        );
        Ok(subject)
    }

    async fn verify_credentials(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Option<Subject>, IdentityError> {
        self.ensure_available()?;
        let Some((subject, Some(password_hash))) = self.find_by_identifier(identifier) else {
            return Ok(None);
        };
        if self.verify_password(password, &password_hash)? {
            Ok(Some(subject))
        } else {
            Ok(None)
        }
    }

    async fn resolve_oauth_identity(
        &self,
        identity: &OAuthIdentity,
    ) -> Result<Vec<Subject>, IdentityError> {
        self.ensure_available()?;
        let _creating = self.creation_lock();

        if let Some(linked) = self.accounts.iter().find(|a| a.linked_to(identity)) {
            return Ok(vec![linked.subject.clone()]);
        }

        let email = identity.email.to_lowercase();
        let mut matching: Vec<Subject> = self
            .accounts
            .iter()
            .filter(|a| a.subject.email.to_lowercase() == email)
            .map(|a| a.subject.clone())
            .collect();
        matching.sort_by(|a, b| a.username.cmp(&b.username));

        match matching.len() {
            0 => {
                let subject = Subject {
                    id: SubjectId::new_random(),
                    email: email.clone(),
                    username: self.unique_username(&email),
                };
                let mut account = Account {
                    subject: subject.clone(),
                    password_hash: None,
                    oauth_links: Vec::new(),
                };
                account.link(identity);
                self.accounts.insert(subject.id, account);
                Ok(vec![subject])
            }
            1 => {
                if let Some(mut account) = self.accounts.get_mut(&matching[0].id) {
                    account.link(identity);
                }
                Ok(matching)
            }
            _ => Ok(matching),
        }
    }
}

#[async_trait::async_trait]
impl SubjectDirectory for MemoryIdentityBridge {
    async fn find_subject(&self, subject_id: SubjectId) -> Result<Option<Subject>, IdentityError> {
        self.ensure_available()?;
        Ok(self.accounts.get(&subject_id).map(|a| a.subject.clone()))
    }

    async fn link_oauth_identity(
        &self,
        subject_id: SubjectId,
        identity: &OAuthIdentity,
    ) -> Result<Subject, IdentityError> {
        self.ensure_available()?;
        let mut account = self
            .accounts
            .get_mut(&subject_id)
            .ok_or(IdentityError::NotFound)?;
        account.link(identity);
        Ok(account.subject.clone())
    }
}
