use crate::authz::{authorize, is_allowed, Action, Actor, Scope};
use crate::database::models::{AdminRequestRecord, CredentialRecord, Role, UserRecord};
use crate::database::repositories::{
    AdminRequestRepository, CredentialRepository, FamilyRepository, SqliteRepositories,
    UserRepository,
};
use crate::database::Database;
use crate::error::ServiceError;
use crate::events::{ChangeEvent, ChangeFeed, ChangeKind, Collection};
use crate::identity::{create_credential, IdentityProvider};
use crate::requests::pending_admin_request;
use crate::utils::now_utc_iso;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct AccountService {
    database: Database,
    feed: ChangeFeed,
    identity: IdentityProvider,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Files an admin-access request for super-admin review.
    #[serde(default)]
    pub request_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpOutcome {
    pub user: UserRecord,
    pub admin_request: Option<AdminRequestRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
}

impl AccountService {
    pub fn new(database: Database, feed: ChangeFeed, identity: IdentityProvider) -> Self {
        Self {
            database,
            feed,
            identity,
        }
    }

    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }

    /// Creates an identity account and its `member` user record. When the
    /// caller asks for admin review a pending admin request is filed too.
    pub fn sign_up(&self, input: SignUpInput) -> Result<SignUpOutcome> {
        let display_name = required_name(&input.display_name)?;
        let phone_number = normalize_phone(input.phone_number);
        let credential = self.identity.prepare_account(&input.email, &input.password)?;

        let outcome = self.database.with_transaction(|repos| {
            let user = insert_account(
                &repos,
                &credential,
                &display_name,
                phone_number.clone(),
                Role::Member,
            )?;
            let admin_request = if input.request_admin {
                let request = pending_admin_request(&user);
                repos.admin_requests().create(&request)?;
                Some(request)
            } else {
                None
            };
            Ok(SignUpOutcome {
                user,
                admin_request,
            })
        })?;

        tracing::info!(
            user_id = %outcome.user.id,
            admin_review = outcome.admin_request.is_some(),
            "user signed up"
        );
        self.feed.publish(ChangeEvent::new(
            Collection::Users,
            &outcome.user.id,
            ChangeKind::Created,
            None,
        ));
        if let Some(request) = &outcome.admin_request {
            self.feed.publish(ChangeEvent::new(
                Collection::AdminRequests,
                &request.id,
                ChangeKind::Created,
                None,
            ));
        }
        Ok(outcome)
    }

    /// Loads the acting user behind an authenticated user id.
    pub fn actor(&self, user_id: &str) -> Result<Actor> {
        let user = self.load_user(user_id).map_err(|err| {
            match err.downcast_ref::<ServiceError>() {
                Some(ServiceError::NotFound(_)) => ServiceError::Unauthenticated.into(),
                _ => err,
            }
        })?;
        Ok(Actor::from(&user))
    }

    pub fn get_user(&self, actor: &Actor, user_id: &str) -> Result<UserRecord> {
        let user = self.load_user(user_id)?;
        let visible = user.id == actor.user_id
            || is_allowed(actor, Action::ReadFamily, &Scope::user(&user))
            || is_allowed(actor, Action::ListUsers, &Scope::global());
        if !visible {
            return Err(ServiceError::denied("user is outside your family").into());
        }
        Ok(user)
    }

    pub fn list_users(&self, actor: &Actor) -> Result<Vec<UserRecord>> {
        authorize(actor, Action::ListUsers, &Scope::global())?;
        self.database.with_repositories(|repos| repos.users().list())
    }

    pub fn update_profile(
        &self,
        actor: &Actor,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> Result<UserRecord> {
        let updated = self.database.with_transaction(|repos| {
            let user = repos
                .users()
                .get(user_id)?
                .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
            authorize(actor, Action::EditProfile, &Scope::user(&user))?;

            let display_name = match input.display_name {
                Some(name) => required_name(&name)?,
                None => user.display_name,
            };
            let phone_number = match input.phone_number {
                Some(phone) => normalize_phone(Some(phone)),
                None => user.phone_number,
            };
            repos.users().update_profile(
                user_id,
                &display_name,
                phone_number.as_deref(),
                &now_utc_iso(),
            )?;
            repos
                .users()
                .get(user_id)?
                .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")).into())
        })?;
        self.feed.publish(ChangeEvent::new(
            Collection::Users,
            user_id,
            ChangeKind::Updated,
            updated.family_id.as_deref(),
        ));
        Ok(updated)
    }

    /// Removes a user, their credentials and their share of the family
    /// member count.
    pub async fn delete_user(&self, actor: &Actor, user_id: &str) -> Result<()> {
        let user = self.database.with_transaction(|repos| {
            let user = repos
                .users()
                .get(user_id)?
                .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
            authorize(actor, Action::DeleteUser, &Scope::user(&user))?;
            repos.users().delete(&user.id)?;
            repos.credentials().delete(&user.id)?;
            if let Some(family_id) = user.family_id.as_deref() {
                repos.families().increment_member_count(family_id, -1)?;
            }
            Ok(user)
        })?;
        self.identity.revoke_user(&user.id).await;

        tracing::info!(user_id, actor = %actor.user_id, "user deleted");
        self.feed.publish(ChangeEvent::new(
            Collection::Users,
            user_id,
            ChangeKind::Deleted,
            user.family_id.as_deref(),
        ));
        if let Some(family_id) = user.family_id.as_deref() {
            self.feed.publish(ChangeEvent::new(
                Collection::Families,
                family_id,
                ChangeKind::Updated,
                Some(family_id),
            ));
        }
        Ok(())
    }

    fn load_user(&self, user_id: &str) -> Result<UserRecord> {
        self.database.with_repositories(|repos| {
            repos
                .users()
                .get(user_id)?
                .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")).into())
        })
    }
}

/// Persists a prepared credential together with its user record.
pub(crate) fn insert_account(
    repos: &SqliteRepositories<'_>,
    credential: &CredentialRecord,
    display_name: &str,
    phone_number: Option<String>,
    role: Role,
) -> Result<UserRecord> {
    create_credential(repos, credential)?;
    let user = UserRecord {
        id: credential.user_id.clone(),
        email: credential.email.clone(),
        display_name: display_name.to_string(),
        role,
        family_id: None,
        phone_number,
        created_at: credential.created_at.clone(),
        updated_at: None,
    };
    repos.users().create(&user)?;
    Ok(user)
}

pub(crate) fn required_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid("display name may not be empty").into());
    }
    Ok(name.to_string())
}

fn normalize_phone(raw: Option<String>) -> Option<String> {
    raw.map(|phone| phone.trim().to_string())
        .filter(|phone| !phone.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::RequestStatus;
    use crate::error::service_error;
    use crate::test_support::Fixture;

    fn service(fx: &Fixture) -> AccountService {
        AccountService::new(
            fx.database.clone(),
            fx.feed.clone(),
            IdentityProvider::new(fx.database.clone()),
        )
    }

    fn sign_up(svc: &AccountService, email: &str, request_admin: bool) -> SignUpOutcome {
        svc.sign_up(SignUpInput {
            email: email.into(),
            password: "password123".into(),
            display_name: "Esther".into(),
            phone_number: Some(" 555-0100 ".into()),
            request_admin,
        })
        .expect("sign up")
    }

    #[test]
    fn sign_up_defaults_to_member() {
        let fx = Fixture::new();
        let svc = service(&fx);

        let outcome = sign_up(&svc, "esther@example.org", false);
        assert_eq!(outcome.user.role, Role::Member);
        assert_eq!(outcome.user.family_id, None);
        assert_eq!(outcome.user.phone_number.as_deref(), Some("555-0100"));
        assert!(outcome.admin_request.is_none());

        let reviewed = sign_up(&svc, "lydia@example.org", true);
        assert_eq!(reviewed.user.role, Role::Member);
        let request = reviewed.admin_request.expect("admin request filed");
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.user_id, reviewed.user.id);
    }

    #[tokio::test]
    async fn signed_up_user_can_authenticate() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let outcome = sign_up(&svc, "esther@example.org", false);

        let session = svc
            .identity()
            .authenticate("esther@example.org", "password123")
            .await
            .expect("login");
        assert_eq!(session.user_id, outcome.user.id);
        assert_eq!(svc.actor(&session.user_id).unwrap().role, Role::Member);
    }

    #[tokio::test]
    async fn deleting_a_member_decrements_their_family() {
        let fx = Fixture::new();
        fx.family("grace");
        let root = fx.user("root", Role::SuperAdmin, None);
        fx.user("m1", Role::Member, Some("grace"));
        fx.user("m2", Role::Member, Some("grace"));
        let svc = service(&fx);
        assert_eq!(fx.member_count("grace"), 2);

        svc.delete_user(&root, "m1").await.expect("delete");
        assert_eq!(fx.member_count("grace"), 1);
        assert!(fx.get_user("m1").is_none());

        let err = svc.delete_user(&root, "root").await.unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn deleting_a_moved_member_decrements_their_current_family() {
        let fx = Fixture::new();
        fx.family("grace");
        fx.family("hope");
        let root = fx.user("root", Role::SuperAdmin, None);
        let mover = fx.user("m", Role::Member, Some("grace"));
        let membership = crate::membership::MembershipService::new(
            fx.database.clone(),
            fx.feed.clone(),
            crate::config::MembershipConfig::default(),
        );
        let svc = service(&fx);

        membership.join_family(&mover, "m", Some("hope")).unwrap();
        svc.delete_user(&root, "m").await.expect("delete");
        assert_eq!(fx.member_count("grace"), 0);
        assert_eq!(fx.member_count("hope"), 0);
    }

    #[test]
    fn concurrent_sign_ups_for_one_email_conflict() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let first = svc.identity().prepare_account("dorcas@example.org", "password123").unwrap();
        let second = svc.identity().prepare_account("dorcas@example.org", "password123").unwrap();

        fx.database
            .with_transaction(|repos| insert_account(&repos, &first, "Dorcas", None, Role::Member))
            .unwrap();
        let err = fx
            .database
            .with_transaction(|repos| insert_account(&repos, &second, "Dorcas", None, Role::Member))
            .unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::Conflict(_))));
        assert!(fx.get_user(&second.user_id).is_none());
    }

    #[tokio::test]
    async fn only_super_admin_deletes_users() {
        let fx = Fixture::new();
        fx.family("grace");
        let admin = fx.user("a", Role::Admin, Some("grace"));
        fx.user("m", Role::Member, Some("grace"));
        let err = service(&fx).delete_user(&admin, "m").await.unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));
        assert_eq!(fx.member_count("grace"), 2);
    }

    #[test]
    fn profile_edits_are_self_service() {
        let fx = Fixture::new();
        fx.family("grace");
        let me = fx.user("me", Role::Member, Some("grace"));
        let other = fx.user("other", Role::Member, Some("grace"));
        let svc = service(&fx);

        let updated = svc
            .update_profile(
                &me,
                "me",
                UpdateProfileInput {
                    display_name: Some("Martha".into()),
                    phone_number: None,
                },
            )
            .unwrap();
        assert_eq!(updated.display_name, "Martha");

        let err = svc
            .update_profile(&other, "me", UpdateProfileInput::default())
            .unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::PermissionDenied(_))));

        assert_eq!(svc.get_user(&other, "me").unwrap().display_name, "Martha");
        let outsider = fx.user("outsider", Role::Member, None);
        assert!(svc.get_user(&outsider, "me").is_err());
    }

    #[test]
    fn unknown_actor_is_unauthenticated() {
        let fx = Fixture::new();
        let err = service(&fx).actor("ghost").unwrap_err();
        assert_eq!(service_error(&err), Some(&ServiceError::Unauthenticated));
    }
}
