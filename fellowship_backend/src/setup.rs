//! First-run initialization.
//!
//! The `system` key in the config table marks a deployment as initialized.
//! Until it exists the API only serves the setup flow.

use crate::accounts::{insert_account, required_name};
use crate::database::models::{Role, UserRecord};
use crate::database::Database;
use crate::error::ServiceError;
use crate::events::{ChangeEvent, ChangeFeed, ChangeKind, Collection};
use crate::identity::IdentityProvider;
use crate::utils::now_utc_iso;
use anyhow::{Context, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};

pub const SYSTEM_CONFIG_KEY: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    pub initialized: bool,
    pub deployment_name: String,
    pub super_admin_id: String,
    pub initialized_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatus {
    pub initialized: bool,
    pub deployment_name: Option<String>,
    pub initialized_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeInput {
    pub deployment_name: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeOutcome {
    pub system: SystemConfig,
    pub super_admin: UserRecord,
}

#[derive(Clone)]
pub struct SetupService {
    database: Database,
    feed: ChangeFeed,
    identity: IdentityProvider,
}

impl SetupService {
    pub fn new(database: Database, feed: ChangeFeed, identity: IdentityProvider) -> Self {
        Self {
            database,
            feed,
            identity,
        }
    }

    pub fn system_config(&self) -> Result<Option<SystemConfig>> {
        let Some(raw) = self.database.get_setting(SYSTEM_CONFIG_KEY)? else {
            return Ok(None);
        };
        let config = serde_json::from_str(&raw).context("corrupt system config")?;
        Ok(Some(config))
    }

    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self
            .system_config()?
            .map(|config| config.initialized)
            .unwrap_or(false))
    }

    pub fn status(&self) -> Result<SetupStatus> {
        Ok(match self.system_config()? {
            Some(config) => SetupStatus {
                initialized: config.initialized,
                deployment_name: Some(config.deployment_name),
                initialized_at: Some(config.initialized_at),
            },
            None => SetupStatus::default(),
        })
    }

    /// Fails with [`ServiceError::SetupRequired`] until setup has run.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized()? {
            Ok(())
        } else {
            Err(ServiceError::SetupRequired.into())
        }
    }

    /// Creates the first super-admin and writes the marker. Runs once.
    pub fn initialize(&self, input: InitializeInput) -> Result<InitializeOutcome> {
        if self.is_initialized()? {
            return Err(ServiceError::AlreadyInitialized.into());
        }
        let deployment_name = input.deployment_name.trim().to_string();
        if deployment_name.is_empty() {
            return Err(ServiceError::invalid("deployment name may not be empty").into());
        }
        let display_name = required_name(&input.display_name)?;
        let credential = self.identity.prepare_account(&input.email, &input.password)?;

        let outcome = self.database.with_transaction(|repos| {
            let super_admin =
                insert_account(&repos, &credential, &display_name, None, Role::SuperAdmin)?;
            let system = SystemConfig {
                initialized: true,
                deployment_name: deployment_name.clone(),
                super_admin_id: super_admin.id.clone(),
                initialized_at: now_utc_iso(),
            };
            // A racing initializer finds the key taken.
            let inserted = repos.conn().execute(
                "INSERT OR IGNORE INTO config (key, value) VALUES (?1, ?2)",
                params![SYSTEM_CONFIG_KEY, serde_json::to_string(&system)?],
            )?;
            if inserted == 0 {
                return Err(ServiceError::AlreadyInitialized.into());
            }
            Ok(InitializeOutcome {
                system,
                super_admin,
            })
        })?;

        tracing::info!(
            deployment = %outcome.system.deployment_name,
            super_admin = %outcome.super_admin.id,
            "deployment initialized"
        );
        self.feed.publish(ChangeEvent::new(
            Collection::Config,
            SYSTEM_CONFIG_KEY,
            ChangeKind::Created,
            None,
        ));
        self.feed.publish(ChangeEvent::new(
            Collection::Users,
            &outcome.super_admin.id,
            ChangeKind::Created,
            None,
        ));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::service_error;

    fn service() -> SetupService {
        let database = Database::open_in_memory().expect("db");
        SetupService::new(
            database.clone(),
            ChangeFeed::default(),
            IdentityProvider::new(database),
        )
    }

    fn input() -> InitializeInput {
        InitializeInput {
            deployment_name: "First Church".into(),
            email: "pastor@example.org".into(),
            password: "shepherd-42".into(),
            display_name: "Pastor Ann".into(),
        }
    }

    #[test]
    fn initializes_once() {
        let setup = service();
        assert!(!setup.status().unwrap().initialized);
        assert!(matches!(
            service_error(&setup.ensure_initialized().unwrap_err()),
            Some(ServiceError::SetupRequired)
        ));

        let outcome = setup.initialize(input()).expect("initialize");
        assert_eq!(outcome.super_admin.role, Role::SuperAdmin);
        assert_eq!(outcome.system.super_admin_id, outcome.super_admin.id);
        let status = setup.status().unwrap();
        assert!(status.initialized);
        assert_eq!(status.deployment_name.as_deref(), Some("First Church"));
        setup.ensure_initialized().expect("initialized");

        let err = setup.initialize(input()).unwrap_err();
        assert_eq!(service_error(&err), Some(&ServiceError::AlreadyInitialized));
    }

    #[tokio::test]
    async fn super_admin_can_sign_in_after_setup() {
        let setup = service();
        let outcome = setup.initialize(input()).unwrap();
        let session = setup
            .identity
            .authenticate("pastor@example.org", "shepherd-42")
            .await
            .unwrap();
        assert_eq!(session.user_id, outcome.super_admin.id);
    }

    #[test]
    fn rejects_blank_deployment_name() {
        let setup = service();
        let err = setup
            .initialize(InitializeInput {
                deployment_name: "  ".into(),
                ..input()
            })
            .unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::Validation(_))));
        assert!(!setup.is_initialized().unwrap());
    }
}
