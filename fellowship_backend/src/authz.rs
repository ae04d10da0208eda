//! Authorization policy shared by every service.
//!
//! Services run server-side and consult [`authorize`] before touching the
//! store, which makes this the enforcement point. Clients may call the same
//! functions to decide which actions to offer.

use crate::database::models::{Role, UserRecord};
use crate::error::ServiceError;
use serde::Serialize;

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    pub family_id: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role, family_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            family_id: family_id.map(str::to_string),
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    pub fn belongs_to(&self, family_id: Option<&str>) -> bool {
        matches!((self.family_id.as_deref(), family_id), (Some(own), Some(target)) if own == target)
    }

    pub fn is_admin_of(&self, family_id: Option<&str>) -> bool {
        self.role == Role::Admin && self.belongs_to(family_id)
    }
}

impl From<&UserRecord> for Actor {
    fn from(user: &UserRecord) -> Self {
        Self::new(user.id.clone(), user.role, user.family_id.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// View a family's posts, media, notifications and members.
    ReadFamily,
    /// Post, comment, like or upload inside a family.
    Contribute,
    /// Delete or change a post, comment or media item.
    MutateContent,
    /// Move a user into or out of a family on their own behalf.
    JoinFamily,
    /// Take a user out of their family.
    RemoveMember,
    /// Promote or demote a user.
    ChangeRole,
    PostNotification,
    EditFamily,
    EditProfile,
    /// Create, delete or repair families.
    ManageFamilies,
    ReviewRequests,
    DeleteUser,
    ListUsers,
}

impl Action {
    fn forbids_self(&self) -> bool {
        matches!(self, Self::RemoveMember | Self::ChangeRole | Self::DeleteUser)
    }
}

/// What an action targets. Unused fields stay `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    pub family_id: Option<&'a str>,
    pub author_id: Option<&'a str>,
    pub target_user_id: Option<&'a str>,
}

impl<'a> Scope<'a> {
    pub fn family(family_id: &'a str) -> Self {
        Self {
            family_id: Some(family_id),
            ..Self::default()
        }
    }

    pub fn content(family_id: &'a str, author_id: &'a str) -> Self {
        Self {
            family_id: Some(family_id),
            author_id: Some(author_id),
            target_user_id: None,
        }
    }

    pub fn user(target: &'a UserRecord) -> Self {
        Self {
            family_id: target.family_id.as_deref(),
            author_id: None,
            target_user_id: Some(target.id.as_str()),
        }
    }

    pub fn global() -> Self {
        Self::default()
    }
}

/// Content mutation rule: super-admins everywhere, admins inside their own
/// family, everyone else only on what they authored.
pub fn can_mutate(actor: &Actor, resource_family_id: Option<&str>, author_id: Option<&str>) -> bool {
    actor.is_super_admin()
        || author_id == Some(actor.user_id.as_str())
        || actor.is_admin_of(resource_family_id)
}

pub fn is_allowed(actor: &Actor, action: Action, scope: &Scope<'_>) -> bool {
    if action.forbids_self() && scope.target_user_id == Some(actor.user_id.as_str()) {
        return false;
    }
    if actor.is_super_admin() {
        return true;
    }
    match action {
        Action::ReadFamily | Action::Contribute => actor.belongs_to(scope.family_id),
        Action::MutateContent => can_mutate(actor, scope.family_id, scope.author_id),
        Action::JoinFamily | Action::EditProfile => {
            scope.target_user_id == Some(actor.user_id.as_str())
        }
        Action::RemoveMember
        | Action::ChangeRole
        | Action::PostNotification
        | Action::EditFamily => actor.is_admin_of(scope.family_id),
        Action::ManageFamilies
        | Action::ReviewRequests
        | Action::DeleteUser
        | Action::ListUsers => false,
    }
}

pub fn authorize(actor: &Actor, action: Action, scope: &Scope<'_>) -> Result<(), ServiceError> {
    if is_allowed(actor, action, scope) {
        return Ok(());
    }
    tracing::debug!(
        actor = %actor.user_id,
        role = %actor.role,
        ?action,
        family_id = ?scope.family_id,
        target = ?scope.target_user_id,
        "authorization denied"
    );
    let reason = if action.forbids_self() && scope.target_user_id == Some(actor.user_id.as_str())
    {
        "this action cannot target your own account".to_string()
    } else {
        format!("{} may not {:?} here", actor.role, action)
    };
    Err(ServiceError::PermissionDenied(reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_of(family: &str, id: &str) -> Actor {
        Actor::new(id, Role::Admin, Some(family))
    }

    #[test]
    fn cross_family_admin_cannot_moderate() {
        let grace_admin = admin_of("grace", "g-admin");
        let hope_admin = admin_of("hope", "h-admin");
        let root = Actor::new("root", Role::SuperAdmin, None);
        let scope = Scope::content("grace", "author-a");

        assert!(is_allowed(&grace_admin, Action::MutateContent, &scope));
        assert!(is_allowed(&root, Action::MutateContent, &scope));
        assert!(!is_allowed(&hope_admin, Action::MutateContent, &scope));
        assert!(matches!(
            authorize(&hope_admin, Action::MutateContent, &scope),
            Err(ServiceError::PermissionDenied(_))
        ));
    }

    #[test]
    fn members_only_touch_their_own_content() {
        let member = Actor::new("m1", Role::Member, Some("grace"));
        assert!(is_allowed(&member, Action::MutateContent, &Scope::content("grace", "m1")));
        assert!(!is_allowed(&member, Action::MutateContent, &Scope::content("grace", "m2")));
        assert!(is_allowed(&member, Action::Contribute, &Scope::family("grace")));
        assert!(!is_allowed(&member, Action::Contribute, &Scope::family("hope")));
        assert!(!is_allowed(&member, Action::RemoveMember, &Scope::family("grace")));
    }

    #[test]
    fn unassigned_users_read_nothing() {
        let drifter = Actor::new("d", Role::Admin, None);
        assert!(!is_allowed(&drifter, Action::ReadFamily, &Scope::family("grace")));
        assert!(!is_allowed(&drifter, Action::ReadFamily, &Scope::default()));
    }

    #[test]
    fn self_targeted_role_changes_are_blocked_for_everyone() {
        let root_user = UserRecord {
            id: "root".into(),
            email: "root@example.org".into(),
            display_name: "Root".into(),
            role: Role::SuperAdmin,
            family_id: None,
            phone_number: None,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: None,
        };
        let root = Actor::from(&root_user);
        assert!(!is_allowed(&root, Action::ChangeRole, &Scope::user(&root_user)));
        assert!(!is_allowed(&root, Action::DeleteUser, &Scope::user(&root_user)));
        assert!(is_allowed(&root, Action::EditProfile, &Scope::user(&root_user)));
    }

    #[test]
    fn global_actions_need_super_admin() {
        let admin = admin_of("grace", "a");
        for action in [Action::ManageFamilies, Action::ReviewRequests, Action::ListUsers] {
            assert!(!is_allowed(&admin, action, &Scope::global()));
        }
    }
}
