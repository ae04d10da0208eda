//! Email/password identity provider.
//!
//! Accounts live in the `credentials` table with argon2 hashes; sessions are
//! opaque bearer tokens held in memory for the lifetime of the process.

use crate::database::models::CredentialRecord;
use crate::database::repositories::{CredentialRepository, SqliteRepositories};
use crate::database::Database;
use crate::error::ServiceError;
use crate::utils::{new_id, now_utc_iso};
use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, RwLock};

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_LEN: usize = 48;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: String },
    SignedOut { user_id: String },
}

#[derive(Clone)]
pub struct IdentityProvider {
    database: Database,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl IdentityProvider {
    pub fn new(database: Database) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            database,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    /// Validates credentials and hashes the password without persisting
    /// anything, so callers can store the account alongside other records.
    pub fn prepare_account(&self, email: &str, password: &str) -> Result<CredentialRecord> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::invalid(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            ))
            .into());
        }
        let taken = self
            .database
            .with_repositories(|repos| Ok(repos.credentials().get_by_email(&email)?.is_some()))?;
        if taken {
            return Err(ServiceError::Conflict(format!("account {email} already exists")).into());
        }
        Ok(CredentialRecord {
            user_id: new_id(),
            email,
            password_hash: hash_password(password)?,
            created_at: now_utc_iso(),
        })
    }

    /// Creates an account and returns its stable user id.
    pub fn create_account(&self, email: &str, password: &str) -> Result<String> {
        let record = self.prepare_account(email, password)?;
        self.database
            .with_repositories(|repos| create_credential(&repos, &record))?;
        tracing::info!(user_id = %record.user_id, "account created");
        Ok(record.user_id)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        let credential = self
            .database
            .with_repositories(|repos| repos.credentials().get_by_email(email.trim()))?;
        let Some(credential) = credential else {
            return Err(ServiceError::Unauthenticated.into());
        };
        if !verify_password(password, &credential.password_hash) {
            tracing::debug!(user_id = %credential.user_id, "password mismatch");
            return Err(ServiceError::Unauthenticated.into());
        }

        let session = Session {
            token: session_token(),
            user_id: credential.user_id.clone(),
            created_at: now_utc_iso(),
        };
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());
        let _ = self.events.send(AuthEvent::SignedIn {
            user_id: credential.user_id,
        });
        Ok(session)
    }

    pub async fn sign_out(&self, token: &str) -> Result<()> {
        let removed = self.sessions.write().await.remove(token);
        match removed {
            Some(session) => {
                let _ = self.events.send(AuthEvent::SignedOut {
                    user_id: session.user_id,
                });
                Ok(())
            }
            None => Err(ServiceError::Unauthenticated.into()),
        }
    }

    /// Returns the user id behind a bearer token.
    pub async fn resolve(&self, token: &str) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(token)
            .map(|session| session.user_id.clone())
    }

    /// Drops every session of a user, e.g. after the account was deleted.
    pub async fn revoke_user(&self, user_id: &str) {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        if sessions.len() != before {
            let _ = self.events.send(AuthEvent::SignedOut {
                user_id: user_id.to_string(),
            });
        }
    }

    pub fn on_auth_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

pub fn normalize_email(raw: &str) -> Result<String> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let pattern = EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    });
    let email = raw.trim().to_ascii_lowercase();
    if !pattern.is_match(&email) {
        return Err(ServiceError::invalid(format!("invalid email address: {raw}")).into());
    }
    Ok(email)
}

/// Inserts a credential row, reporting a taken email as a conflict even when
/// it slips past the lookup in [`IdentityProvider::prepare_account`].
pub(crate) fn create_credential(
    repos: &SqliteRepositories<'_>,
    credential: &CredentialRecord,
) -> Result<()> {
    repos.credentials().create(credential).map_err(|err| {
        match err.downcast_ref::<rusqlite::Error>() {
            Some(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ServiceError::Conflict(format!("account {} already exists", credential.email))
                    .into()
            }
            _ => err,
        }
    })
}

fn session_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
