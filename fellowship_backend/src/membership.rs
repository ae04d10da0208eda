use crate::authz::{authorize, Action, Actor, Scope};
use crate::config::{AdminLimitPolicy, MembershipConfig};
use crate::database::models::{
    FamilyRecord, NotificationRecord, NotificationType, Role, UserRecord,
};
use crate::database::repositories::{FamilyRepository, NotificationRepository, UserRepository};
use crate::database::Database;
use crate::error::ServiceError;
use crate::events::{ChangeEvent, ChangeFeed, ChangeKind, Collection};
use crate::utils::{new_id, now_utc_iso};
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct MembershipService {
    database: Database,
    feed: ChangeFeed,
    config: MembershipConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFamilyInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFamilyInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// What a membership transfer did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    pub user: UserRecord,
    pub previous_family_id: Option<String>,
    /// `false` when the user already belonged to the requested family.
    pub changed: bool,
    /// Role the user acts with inside the new family.
    pub effective_role: Role,
    pub warning: Option<String>,
    pub notification_id: Option<String>,
}

impl MembershipService {
    pub fn new(database: Database, feed: ChangeFeed, config: MembershipConfig) -> Self {
        Self {
            database,
            feed,
            config,
        }
    }

    pub fn list_families(&self) -> Result<Vec<FamilyRecord>> {
        self.database
            .with_repositories(|repos| repos.families().list())
    }

    pub fn get_family(&self, family_id: &str) -> Result<FamilyRecord> {
        self.database.with_repositories(|repos| {
            repos
                .families()
                .get(family_id)?
                .ok_or_else(|| ServiceError::not_found(format!("family {family_id}")).into())
        })
    }

    pub fn create_family(&self, actor: &Actor, input: CreateFamilyInput) -> Result<FamilyRecord> {
        authorize(actor, Action::ManageFamilies, &Scope::global())?;
        let record = self
            .database
            .with_repositories(|repos| insert_family(&repos, input))?;
        tracing::info!(family_id = %record.id, name = %record.name, "family created");
        self.feed.publish(ChangeEvent::new(
            Collection::Families,
            &record.id,
            ChangeKind::Created,
            Some(record.id.as_str()),
        ));
        Ok(record)
    }

    pub fn update_family(
        &self,
        actor: &Actor,
        family_id: &str,
        input: UpdateFamilyInput,
    ) -> Result<FamilyRecord> {
        authorize(actor, Action::EditFamily, &Scope::family(family_id))?;
        let record = self.database.with_repositories(|repos| {
            let mut record = repos
                .families()
                .get(family_id)?
                .ok_or_else(|| ServiceError::not_found(format!("family {family_id}")))?;
            if let Some(name) = input.name {
                if name.trim().is_empty() {
                    return Err(ServiceError::invalid("family name may not be empty").into());
                }
                record.name = name.trim().to_string();
            }
            if let Some(description) = input.description {
                record.description = description;
            }
            if let Some(image_url) = input.image_url {
                record.image_url = Some(image_url).filter(|url| !url.trim().is_empty());
            }
            record.updated_at = Some(now_utc_iso());
            repos.families().update(&record)?;
            Ok(record)
        })?;
        self.feed.publish(ChangeEvent::new(
            Collection::Families,
            family_id,
            ChangeKind::Updated,
            Some(family_id),
        ));
        Ok(record)
    }

    /// Deletes the family record only. Members are unassigned by the
    /// store; posts, media and notifications are left in place.
    pub fn delete_family(&self, actor: &Actor, family_id: &str) -> Result<()> {
        authorize(actor, Action::ManageFamilies, &Scope::global())?;
        let unassigned = self.database.with_transaction(|repos| {
            let family = repos
                .families()
                .get(family_id)?
                .ok_or_else(|| ServiceError::not_found(format!("family {family_id}")))?;
            let members = repos.users().list_for_family(&family.id)?;
            let now = now_utc_iso();
            for member in &members {
                repos.users().set_family(&member.id, None, &now)?;
            }
            repos.families().delete(&family.id)?;
            Ok(members)
        })?;
        tracing::warn!(
            family_id,
            unassigned = unassigned.len(),
            "family deleted; posts and media are not cascaded"
        );
        self.feed.publish(ChangeEvent::new(
            Collection::Families,
            family_id,
            ChangeKind::Deleted,
            Some(family_id),
        ));
        for member in unassigned {
            self.feed.publish(ChangeEvent::new(
                Collection::Users,
                member.id,
                ChangeKind::Updated,
                None,
            ));
        }
        Ok(())
    }

    pub fn list_members(&self, actor: &Actor, family_id: &str) -> Result<Vec<UserRecord>> {
        authorize(actor, Action::ReadFamily, &Scope::family(family_id))?;
        self.database
            .with_repositories(|repos| repos.users().list_for_family(family_id))
    }

    pub fn admin_count(&self, family_id: &str) -> Result<usize> {
        self.database
            .with_repositories(|repos| repos.users().count_with_role(family_id, Role::Admin))
    }

    /// Keeps both member counters in step inside one transaction.
    pub fn join_family(
        &self,
        actor: &Actor,
        user_id: &str,
        new_family_id: Option<&str>,
    ) -> Result<JoinOutcome> {
        self.transfer(user_id, new_family_id, |target| {
            Ok(authorize(actor, Action::JoinFamily, &Scope::user(target))?)
        })
    }

    /// Family admins remove plain members; co-admins have to be demoted
    /// first. Super-admins remove anyone but another super-admin.
    pub fn remove_member_from_family(&self, actor: &Actor, user_id: &str) -> Result<JoinOutcome> {
        self.transfer(user_id, None, |target| {
            if target.family_id.is_none() {
                return Err(ServiceError::Conflict(format!("user {user_id} has no family")).into());
            }
            authorize(actor, Action::RemoveMember, &Scope::user(target))?;
            match target.role {
                Role::SuperAdmin => {
                    Err(ServiceError::denied("a super-admin cannot be removed from a family").into())
                }
                Role::Admin if !actor.is_super_admin() => Err(ServiceError::denied(
                    "demote the admin before removing them from the family",
                )
                .into()),
                _ => Ok(()),
            }
        })
    }

    pub fn promote(&self, actor: &Actor, user_id: &str) -> Result<UserRecord> {
        self.change_role(actor, user_id, Role::Admin)
    }

    pub fn demote(&self, actor: &Actor, user_id: &str) -> Result<UserRecord> {
        self.change_role(actor, user_id, Role::Member)
    }

    /// Recomputes `member_count` from the users collection.
    pub fn reconcile_member_count(&self, actor: &Actor, family_id: &str) -> Result<FamilyRecord> {
        authorize(actor, Action::ManageFamilies, &Scope::global())?;
        let (record, previous) = self.database.with_transaction(|repos| {
            let mut record = repos
                .families()
                .get(family_id)?
                .ok_or_else(|| ServiceError::not_found(format!("family {family_id}")))?;
            let previous = record.member_count;
            let actual = repos.users().count_for_family(family_id)?;
            if actual != previous {
                repos.families().set_member_count(family_id, actual)?;
                record.member_count = actual;
            }
            Ok((record, previous))
        })?;
        if record.member_count != previous {
            tracing::warn!(
                family_id,
                previous,
                actual = record.member_count,
                "member count drift repaired"
            );
            self.feed.publish(ChangeEvent::new(
                Collection::Families,
                family_id,
                ChangeKind::Updated,
                Some(family_id),
            ));
        }
        Ok(record)
    }

    fn change_role(&self, actor: &Actor, user_id: &str, role: Role) -> Result<UserRecord> {
        let (updated, changed) = self.database.with_transaction(|repos| {
            let target = repos
                .users()
                .get(user_id)?
                .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
            authorize(actor, Action::ChangeRole, &Scope::user(&target))?;
            if target.role == Role::SuperAdmin {
                return Err(ServiceError::denied("the super-admin role cannot be changed").into());
            }
            if target.role == role {
                return Ok((target, false));
            }
            repos.users().set_role(user_id, role, &now_utc_iso())?;
            let updated = repos
                .users()
                .get(user_id)?
                .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
            Ok((updated, true))
        })?;
        if changed {
            tracing::info!(user_id, actor = %actor.user_id, role = %role, "role changed");
            self.feed.publish(ChangeEvent::new(
                Collection::Users,
                user_id,
                ChangeKind::Updated,
                updated.family_id.as_deref(),
            ));
        }
        Ok(updated)
    }

    /// Moves `user_id` into `new_family_id` (or out of any family when
    /// `None`). `check` sees the user as read inside the transaction and
    /// can veto the move.
    fn transfer<F>(&self, user_id: &str, new_family_id: Option<&str>, check: F) -> Result<JoinOutcome>
    where
        F: FnOnce(&UserRecord) -> Result<()>,
    {
        let max_admins = self.config.max_admins_per_family;
        let policy = self.config.admin_limit_policy;

        let outcome = self.database.with_transaction(|repos| {
            let user = repos
                .users()
                .get(user_id)?
                .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
            check(&user)?;
            let new_family = match new_family_id {
                Some(id) => Some(
                    repos
                        .families()
                        .get(id)?
                        .ok_or_else(|| ServiceError::not_found(format!("family {id}")))?,
                ),
                None => None,
            };
            let previous_family_id = user.family_id.clone();

            if previous_family_id.as_deref() == new_family_id {
                return Ok(JoinOutcome {
                    effective_role: user.role,
                    user,
                    previous_family_id,
                    changed: false,
                    warning: None,
                    notification_id: None,
                });
            }

            let mut effective_role = user.role;
            let mut warning = None;
            if let (Role::Admin, Some(family)) = (user.role, new_family.as_ref()) {
                let admins = repos.users().count_with_role(&family.id, Role::Admin)?;
                if admins >= max_admins {
                    match policy {
                        AdminLimitPolicy::Enforce => {
                            return Err(ServiceError::AdminLimitReached {
                                family_id: family.id.clone(),
                                limit: max_admins,
                            }
                            .into());
                        }
                        AdminLimitPolicy::Warn => {
                            effective_role = Role::Member;
                            warning = Some(format!(
                                "{} already has {admins} admins; {} joins as a member",
                                family.name, user.display_name
                            ));
                        }
                    }
                }
            }

            let now = now_utc_iso();
            repos.users().set_family(user_id, new_family_id, &now)?;
            if let Some(previous) = previous_family_id.as_deref() {
                repos.families().increment_member_count(previous, -1)?;
            }
            let mut notification_id = None;
            if let Some(family) = new_family.as_ref() {
                repos.families().increment_member_count(&family.id, 1)?;
                let notification = NotificationRecord {
                    id: new_id(),
                    family_id: family.id.clone(),
                    title: "New member".into(),
                    message: format!("{} joined {}", user.display_name, family.name),
                    notification_type: NotificationType::General,
                    is_read: false,
                    created_at: now.clone(),
                };
                repos.notifications().create(&notification)?;
                notification_id = Some(notification.id);
            }

            let user = repos
                .users()
                .get(user_id)?
                .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
            Ok(JoinOutcome {
                user,
                previous_family_id,
                changed: true,
                effective_role,
                warning,
                notification_id,
            })
        })?;

        if outcome.changed {
            tracing::info!(
                user_id,
                from = ?outcome.previous_family_id,
                to = ?new_family_id,
                "membership transferred"
            );
            self.publish_transfer(&outcome, new_family_id);
        }
        if let Some(warning) = &outcome.warning {
            tracing::warn!(user_id, %warning, "admin limit reached on join");
        }
        Ok(outcome)
    }

    fn publish_transfer(&self, outcome: &JoinOutcome, new_family_id: Option<&str>) {
        self.feed.publish(ChangeEvent::new(
            Collection::Users,
            &outcome.user.id,
            ChangeKind::Updated,
            new_family_id,
        ));
        for family_id in [outcome.previous_family_id.as_deref(), new_family_id]
            .into_iter()
            .flatten()
        {
            self.feed.publish(ChangeEvent::new(
                Collection::Families,
                family_id,
                ChangeKind::Updated,
                Some(family_id),
            ));
        }
        if let (Some(id), Some(family_id)) = (&outcome.notification_id, new_family_id) {
            self.feed.publish(ChangeEvent::new(
                Collection::Notifications,
                id,
                ChangeKind::Created,
                Some(family_id),
            ));
        }
    }
}

/// Inserts a new family with a zero member count.
pub(crate) fn insert_family(
    repos: &crate::database::repositories::SqliteRepositories<'_>,
    input: CreateFamilyInput,
) -> Result<FamilyRecord> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid("family name may not be empty").into());
    }
    let record = FamilyRecord {
        id: new_id(),
        name: name.to_string(),
        description: input.description,
        image_url: input.image_url.filter(|url| !url.trim().is_empty()),
        member_count: 0,
        created_at: now_utc_iso(),
        updated_at: None,
    };
    repos.families().create(&record)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::NotificationRepository;
    use crate::error::service_error;
    use crate::test_support::Fixture;

    fn service(fx: &Fixture) -> MembershipService {
        MembershipService::new(fx.database.clone(), fx.feed.clone(), MembershipConfig::default())
    }

    #[test]
    fn moving_between_families_shifts_both_counters() {
        let fx = Fixture::new();
        fx.family("f1");
        fx.family("f2");
        let user = fx.user("u", Role::Member, None);
        let svc = service(&fx);

        svc.join_family(&user, "u", Some("f1")).unwrap();
        let before_f1 = fx.member_count("f1");
        let before_f2 = fx.member_count("f2");

        let outcome = svc.join_family(&user, "u", Some("f2")).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.previous_family_id.as_deref(), Some("f1"));
        assert_eq!(fx.member_count("f1"), before_f1 - 1);
        assert_eq!(fx.member_count("f2"), before_f2 + 1);
        assert_eq!(fx.get_user("u").unwrap().family_id.as_deref(), Some("f2"));
    }

    #[test]
    fn joining_the_same_family_twice_counts_once() {
        let fx = Fixture::new();
        fx.family("grace");
        let user = fx.user("u", Role::Member, None);
        let svc = service(&fx);

        svc.join_family(&user, "u", Some("grace")).unwrap();
        let again = svc.join_family(&user, "u", Some("grace")).unwrap();
        assert!(!again.changed);
        assert!(again.notification_id.is_none());
        assert_eq!(fx.member_count("grace"), 1);
    }

    #[test]
    fn join_announces_new_member_to_family() {
        let fx = Fixture::new();
        fx.family("grace");
        let user = fx.user("ruth", Role::Member, None);
        let svc = service(&fx);
        let mut sub = fx
            .feed
            .subscribe(crate::events::ChangeFilter::collection(Collection::Notifications));

        let outcome = svc.join_family(&user, "ruth", Some("grace")).unwrap();
        let notes = fx
            .database
            .with_repositories(|repos| repos.notifications().list_for_family("grace"))
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].notification_type, NotificationType::General);
        assert_eq!(Some(notes[0].id.clone()), outcome.notification_id);

        let rt = tokio::runtime::Runtime::new().unwrap();
        let event = rt.block_on(sub.next()).unwrap();
        assert_eq!(event.family_id.as_deref(), Some("grace"));
    }

    #[test]
    fn joining_a_missing_family_changes_nothing() {
        let fx = Fixture::new();
        fx.family("grace");
        let user = fx.user("u", Role::Member, Some("grace"));
        let svc = service(&fx);

        let err = svc.join_family(&user, "u", Some("nowhere")).unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::NotFound(_))));
        assert_eq!(fx.member_count("grace"), 1);
        assert_eq!(fx.get_user("u").unwrap().family_id.as_deref(), Some("grace"));
    }

    #[test]
    fn members_cannot_move_other_users() {
        let fx = Fixture::new();
        fx.family("grace");
        let mallory = fx.user("mallory", Role::Member, Some("grace"));
        fx.user("victim", Role::Member, None);
        let err = service(&fx)
            .join_family(&mallory, "victim", Some("grace"))
            .unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));
    }

    #[test]
    fn remove_member_only_decrements() {
        let fx = Fixture::new();
        fx.family("grace");
        let admin = fx.user("admin", Role::Admin, Some("grace"));
        fx.user("m", Role::Member, Some("grace"));
        let svc = service(&fx);

        let outcome = svc.remove_member_from_family(&admin, "m").unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.user.family_id, None);
        assert_eq!(fx.member_count("grace"), 1);

        let err = svc.remove_member_from_family(&admin, "admin").unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));
    }

    #[test]
    fn family_admins_cannot_remove_super_admin_or_co_admin() {
        let fx = Fixture::new();
        fx.family("grace");
        let admin = fx.user("admin", Role::Admin, Some("grace"));
        fx.user("root", Role::SuperAdmin, Some("grace"));
        fx.user("co", Role::Admin, Some("grace"));
        let svc = service(&fx);

        for target in ["root", "co"] {
            let err = svc.remove_member_from_family(&admin, target).unwrap_err();
            assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));
            assert_eq!(fx.get_user(target).unwrap().family_id.as_deref(), Some("grace"));
        }
        assert_eq!(fx.member_count("grace"), 3);
    }

    #[test]
    fn super_admin_removes_family_admin() {
        let fx = Fixture::new();
        fx.family("grace");
        let root = fx.user("root", Role::SuperAdmin, None);
        fx.user("admin", Role::Admin, Some("grace"));
        let svc = service(&fx);

        let outcome = svc.remove_member_from_family(&root, "admin").unwrap();
        assert!(outcome.changed);
        assert_eq!(fx.get_user("admin").unwrap().family_id, None);
        assert_eq!(fx.member_count("grace"), 0);
    }

    #[test]
    fn role_change_checks_the_stored_family() {
        let fx = Fixture::new();
        fx.family("grace");
        fx.family("hope");
        let grace_admin = fx.user("ga", Role::Admin, Some("grace"));
        let mover = fx.user("m", Role::Member, Some("grace"));
        let svc = service(&fx);

        svc.join_family(&mover, "m", Some("hope")).unwrap();
        let err = svc.promote(&grace_admin, "m").unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));
        assert_eq!(fx.get_user("m").unwrap().role, Role::Member);
    }

    #[test]
    fn admin_limit_warns_by_default() {
        let fx = Fixture::new();
        fx.family("grace");
        fx.user("a1", Role::Admin, Some("grace"));
        fx.user("a2", Role::Admin, Some("grace"));
        fx.user("a3", Role::Admin, Some("grace"));
        let newcomer = fx.user("a4", Role::Admin, None);

        let outcome = service(&fx).join_family(&newcomer, "a4", Some("grace")).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.effective_role, Role::Member);
        assert!(outcome.warning.is_some());
        // stored role is untouched
        assert_eq!(fx.get_user("a4").unwrap().role, Role::Admin);
        assert_eq!(fx.member_count("grace"), 4);
    }

    #[test]
    fn admin_limit_can_be_enforced() {
        let fx = Fixture::new();
        fx.family("grace");
        fx.user("a1", Role::Admin, Some("grace"));
        fx.user("a2", Role::Admin, Some("grace"));
        let newcomer = fx.user("a3", Role::Admin, None);
        let svc = MembershipService::new(
            fx.database.clone(),
            fx.feed.clone(),
            MembershipConfig {
                max_admins_per_family: 2,
                admin_limit_policy: AdminLimitPolicy::Enforce,
            },
        );

        let err = svc.join_family(&newcomer, "a3", Some("grace")).unwrap_err();
        assert!(matches!(
            service_error(&err),
            Some(ServiceError::AdminLimitReached { limit: 2, .. })
        ));
        assert_eq!(fx.member_count("grace"), 2);
        assert_eq!(fx.get_user("a3").unwrap().family_id, None);
    }

    #[test]
    fn promote_then_demote_round_trips() {
        let fx = Fixture::new();
        fx.family("grace");
        let root = fx.user("root", Role::SuperAdmin, None);
        fx.user("u", Role::Member, Some("grace"));
        let svc = service(&fx);

        assert_eq!(svc.promote(&root, "u").unwrap().role, Role::Admin);
        assert_eq!(svc.promote(&root, "u").unwrap().role, Role::Admin);
        assert_eq!(svc.demote(&root, "u").unwrap().role, Role::Member);

        fx.user("never", Role::Member, Some("grace"));
        let before = fx.get_user("never").unwrap();
        let after = svc.demote(&root, "never").unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn admins_manage_roles_only_in_their_family() {
        let fx = Fixture::new();
        fx.family("grace");
        fx.family("hope");
        let grace_admin = fx.user("ga", Role::Admin, Some("grace"));
        fx.user("gm", Role::Member, Some("grace"));
        fx.user("hm", Role::Member, Some("hope"));
        fx.user("root", Role::SuperAdmin, None);
        let svc = service(&fx);

        assert_eq!(svc.promote(&grace_admin, "gm").unwrap().role, Role::Admin);
        let err = svc.promote(&grace_admin, "hm").unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));
        let err = svc.demote(&grace_admin, "ga").unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));
        let err = svc.demote(&grace_admin, "root").unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));
    }

    #[test]
    fn reconcile_repairs_drift() {
        let fx = Fixture::new();
        fx.family("grace");
        let root = fx.user("root", Role::SuperAdmin, None);
        fx.user("m1", Role::Member, Some("grace"));
        fx.database
            .with_repositories(|repos| repos.families().set_member_count("grace", 7))
            .unwrap();

        let family = service(&fx).reconcile_member_count(&root, "grace").unwrap();
        assert_eq!(family.member_count, 1);
        assert_eq!(fx.member_count("grace"), 1);
    }

    #[test]
    fn family_crud_requires_super_admin() {
        let fx = Fixture::new();
        let root = fx.user("root", Role::SuperAdmin, None);
        let svc = service(&fx);

        let family = svc
            .create_family(
                &root,
                CreateFamilyInput {
                    name: " Grace ".into(),
                    description: "Sunday group".into(),
                    image_url: None,
                },
            )
            .unwrap();
        assert_eq!(family.name, "Grace");
        assert_eq!(family.member_count, 0);

        let admin = fx.user("admin", Role::Admin, Some(family.id.as_str()));
        let err = svc
            .create_family(&admin, CreateFamilyInput { name: "Hope".into(), ..Default::default() })
            .unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));

        let renamed = svc
            .update_family(
                &admin,
                &family.id,
                UpdateFamilyInput { name: Some("Grace Chapel".into()), ..Default::default() },
            )
            .unwrap();
        assert_eq!(renamed.name, "Grace Chapel");

        svc.delete_family(&root, &family.id).unwrap();
        assert_eq!(fx.get_user("admin").unwrap().family_id, None);
        let err = svc.get_family(&family.id).unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::NotFound(_))));
    }
}
