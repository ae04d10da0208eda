use crate::authz::{authorize, Action, Actor, Scope};
use crate::database::models::{NotificationRecord, NotificationType};
use crate::database::repositories::{FamilyRepository, NotificationRepository};
use crate::database::Database;
use crate::error::ServiceError;
use crate::events::{ChangeEvent, ChangeFeed, ChangeKind, Collection};
use crate::utils::{new_id, now_utc_iso};
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct NotificationService {
    database: Database,
    feed: ChangeFeed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInput {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default = "default_type")]
    pub notification_type: NotificationType,
}

fn default_type() -> NotificationType {
    NotificationType::General
}

impl NotificationService {
    pub fn new(database: Database, feed: ChangeFeed) -> Self {
        Self { database, feed }
    }

    pub fn create_notification(
        &self,
        actor: &Actor,
        family_id: &str,
        input: NotificationInput,
    ) -> Result<NotificationRecord> {
        authorize(actor, Action::PostNotification, &Scope::family(family_id))?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ServiceError::invalid("notification title may not be empty").into());
        }
        let record = NotificationRecord {
            id: new_id(),
            family_id: family_id.to_string(),
            title: title.to_string(),
            message: input.message,
            notification_type: input.notification_type,
            is_read: false,
            created_at: now_utc_iso(),
        };
        self.database.with_repositories(|repos| {
            if repos.families().get(family_id)?.is_none() {
                return Err(ServiceError::not_found(format!("family {family_id}")).into());
            }
            repos.notifications().create(&record)
        })?;
        tracing::info!(
            notification_id = %record.id,
            family_id,
            kind = %record.notification_type,
            "notification posted"
        );
        self.feed.publish(ChangeEvent::new(
            Collection::Notifications,
            &record.id,
            ChangeKind::Created,
            Some(family_id),
        ));
        Ok(record)
    }

    /// Newest first.
    pub fn list_notifications(
        &self,
        actor: &Actor,
        family_id: &str,
    ) -> Result<Vec<NotificationRecord>> {
        authorize(actor, Action::ReadFamily, &Scope::family(family_id))?;
        self.database
            .with_repositories(|repos| repos.notifications().list_for_family(family_id))
    }

    /// Marks a notification read for the whole family.
    pub fn mark_read(&self, actor: &Actor, notification_id: &str) -> Result<NotificationRecord> {
        let mut record = self.database.with_repositories(|repos| {
            repos
                .notifications()
                .get(notification_id)?
                .ok_or_else(|| {
                    ServiceError::not_found(format!("notification {notification_id}")).into()
                })
        })?;
        authorize(actor, Action::ReadFamily, &Scope::family(&record.family_id))?;
        if record.is_read {
            return Ok(record);
        }
        self.database
            .with_repositories(|repos| repos.notifications().mark_read(notification_id))?;
        record.is_read = true;
        self.feed.publish(ChangeEvent::new(
            Collection::Notifications,
            notification_id,
            ChangeKind::Updated,
            Some(record.family_id.as_str()),
        ));
        Ok(record)
    }

    pub fn unread_count(&self, actor: &Actor, family_id: &str) -> Result<usize> {
        authorize(actor, Action::ReadFamily, &Scope::family(family_id))?;
        self.database
            .with_repositories(|repos| repos.notifications().count_unread(family_id))
    }
}
