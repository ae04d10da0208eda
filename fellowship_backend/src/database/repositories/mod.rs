mod admin_requests;
mod comments;
mod credentials;
mod families;
mod family_requests;
mod likes;
mod media;
mod notifications;
mod posts;
mod users;

use super::models::{
    AdminRequestRecord, CommentRecord, CredentialRecord, FamilyRecord, FamilyRequestRecord,
    MediaRecord, MediaType, NotificationRecord, PostRecord, RequestStatus, Role, UserRecord,
};
use anyhow::Result;
use rusqlite::Connection;

pub trait UserRepository {
    fn create(&self, record: &UserRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<UserRecord>>;
    fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
    fn list(&self) -> Result<Vec<UserRecord>>;
    fn list_for_family(&self, family_id: &str) -> Result<Vec<UserRecord>>;
    fn count_for_family(&self, family_id: &str) -> Result<i64>;
    fn count_with_role(&self, family_id: &str, role: Role) -> Result<usize>;
    fn set_family(&self, id: &str, family_id: Option<&str>, updated_at: &str) -> Result<()>;
    fn set_role(&self, id: &str, role: Role, updated_at: &str) -> Result<()>;
    fn update_profile(
        &self,
        id: &str,
        display_name: &str,
        phone_number: Option<&str>,
        updated_at: &str,
    ) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait FamilyRepository {
    fn create(&self, record: &FamilyRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<FamilyRecord>>;
    fn list(&self) -> Result<Vec<FamilyRecord>>;
    fn update(&self, record: &FamilyRecord) -> Result<()>;
    /// Adds `delta` to `member_count` in a single statement.
    fn increment_member_count(&self, id: &str, delta: i64) -> Result<()>;
    fn set_member_count(&self, id: &str, count: i64) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait CredentialRepository {
    fn create(&self, record: &CredentialRecord) -> Result<()>;
    fn get_by_email(&self, email: &str) -> Result<Option<CredentialRecord>>;
    fn delete(&self, user_id: &str) -> Result<()>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PostRecord>>;
    fn list_for_family(&self, family_id: &str) -> Result<Vec<PostRecord>>;
    fn list_recent(&self, limit: usize) -> Result<Vec<PostRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait LikeRepository {
    /// Returns `true` when the like was not already present.
    fn add(&self, post_id: &str, user_id: &str, created_at: &str) -> Result<bool>;
    /// Returns `true` when a like was removed.
    fn remove(&self, post_id: &str, user_id: &str) -> Result<bool>;
    fn list_for_post(&self, post_id: &str) -> Result<Vec<String>>;
}

pub trait CommentRepository {
    fn append(&self, record: &CommentRecord) -> Result<()>;
    fn get(&self, post_id: &str, id: &str) -> Result<Option<CommentRecord>>;
    fn list_for_post(&self, post_id: &str) -> Result<Vec<CommentRecord>>;
    fn delete(&self, post_id: &str, id: &str) -> Result<bool>;
}

pub trait MediaRepository {
    fn create(&self, record: &MediaRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<MediaRecord>>;
    fn list_for_family(
        &self,
        family_id: &str,
        media_type: Option<MediaType>,
    ) -> Result<Vec<MediaRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait NotificationRepository {
    fn create(&self, record: &NotificationRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<NotificationRecord>>;
    fn list_for_family(&self, family_id: &str) -> Result<Vec<NotificationRecord>>;
    fn mark_read(&self, id: &str) -> Result<()>;
    fn count_unread(&self, family_id: &str) -> Result<usize>;
}

pub trait FamilyRequestRepository {
    fn create(&self, record: &FamilyRequestRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<FamilyRequestRecord>>;
    fn list(&self, status: Option<RequestStatus>) -> Result<Vec<FamilyRequestRecord>>;
    fn update(&self, record: &FamilyRequestRecord) -> Result<()>;
}

pub trait AdminRequestRepository {
    fn create(&self, record: &AdminRequestRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<AdminRequestRecord>>;
    fn list(&self, status: Option<RequestStatus>) -> Result<Vec<AdminRequestRecord>>;
    fn find_pending_for_user(&self, user_id: &str) -> Result<Option<AdminRequestRecord>>;
    fn update(&self, record: &AdminRequestRecord) -> Result<()>;
}

/// Hands out rusqlite-backed repositories sharing one connection (or one
/// open transaction).
pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn families(&self) -> impl FamilyRepository + '_ {
        families::SqliteFamilyRepository { conn: self.conn }
    }

    pub fn credentials(&self) -> impl CredentialRepository + '_ {
        credentials::SqliteCredentialRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn likes(&self) -> impl LikeRepository + '_ {
        likes::SqliteLikeRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn media(&self) -> impl MediaRepository + '_ {
        media::SqliteMediaRepository { conn: self.conn }
    }

    pub fn notifications(&self) -> impl NotificationRepository + '_ {
        notifications::SqliteNotificationRepository { conn: self.conn }
    }

    pub fn family_requests(&self) -> impl FamilyRequestRepository + '_ {
        family_requests::SqliteFamilyRequestRepository { conn: self.conn }
    }

    pub fn admin_requests(&self) -> impl AdminRequestRepository + '_ {
        admin_requests::SqliteAdminRequestRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{PostType, Role};
    use crate::database::MIGRATIONS;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(MIGRATIONS).expect("migrations");
        conn
    }

    fn family(id: &str) -> FamilyRecord {
        FamilyRecord {
            id: id.into(),
            name: id.to_uppercase(),
            description: String::new(),
            image_url: None,
            member_count: 0,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: None,
        }
    }

    fn user(id: &str, family_id: Option<&str>, role: Role) -> UserRecord {
        UserRecord {
            id: id.into(),
            email: format!("{id}@example.org"),
            display_name: id.into(),
            role,
            family_id: family_id.map(str::to_string),
            phone_number: None,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: None,
        }
    }

    #[test]
    fn family_counter_increments_in_place() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.families().create(&family("grace")).unwrap();

        repos.families().increment_member_count("grace", 1).unwrap();
        repos.families().increment_member_count("grace", 1).unwrap();
        repos.families().increment_member_count("grace", -1).unwrap();

        let fetched = repos.families().get("grace").unwrap().unwrap();
        assert_eq!(fetched.member_count, 1);
    }

    #[test]
    fn users_query_by_family_and_role() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.families().create(&family("grace")).unwrap();
        repos.users().create(&user("a", Some("grace"), Role::Admin)).unwrap();
        repos.users().create(&user("b", Some("grace"), Role::Member)).unwrap();
        repos.users().create(&user("c", None, Role::Admin)).unwrap();

        assert_eq!(repos.users().list_for_family("grace").unwrap().len(), 2);
        assert_eq!(repos.users().count_for_family("grace").unwrap(), 2);
        assert_eq!(repos.users().count_with_role("grace", Role::Admin).unwrap(), 1);
        assert_eq!(
            repos.users().get_by_email("C@example.org").unwrap().map(|u| u.id),
            Some("c".to_string())
        );
    }

    #[test]
    fn likes_are_a_set_and_comments_keep_order() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos
            .posts()
            .create(&PostRecord {
                id: "p1".into(),
                family_id: "grace".into(),
                author_id: "a".into(),
                author_name: "A".into(),
                content: "hello".into(),
                post_type: PostType::Discussion,
                created_at: "2024-01-01T00:00:00Z".into(),
            })
            .unwrap();

        assert!(repos.likes().add("p1", "u1", "t").unwrap());
        assert!(!repos.likes().add("p1", "u1", "t").unwrap());
        assert_eq!(repos.likes().list_for_post("p1").unwrap(), vec!["u1".to_string()]);
        assert!(repos.likes().remove("p1", "u1").unwrap());
        assert!(!repos.likes().remove("p1", "u1").unwrap());

        for (id, body) in [("c2", "first"), ("c1", "second")] {
            repos
                .comments()
                .append(&CommentRecord {
                    id: id.into(),
                    post_id: "p1".into(),
                    author_id: "u1".into(),
                    author_name: "U".into(),
                    content: body.into(),
                    created_at: "2024-01-01T00:00:00Z".into(),
                })
                .unwrap();
        }
        let bodies: Vec<_> = repos
            .comments()
            .list_for_post("p1")
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(bodies, vec!["first", "second"]);

        repos.posts().delete("p1").unwrap();
        assert!(repos.comments().list_for_post("p1").unwrap().is_empty());
    }
}
