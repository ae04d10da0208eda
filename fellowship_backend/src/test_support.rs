//! Fixtures shared by the unit tests.

use crate::authz::Actor;
use crate::database::models::{FamilyRecord, Role, UserRecord};
use crate::database::repositories::{FamilyRepository, UserRepository};
use crate::database::Database;
use crate::events::ChangeFeed;
use crate::utils::now_utc_iso;

pub(crate) struct Fixture {
    pub database: Database,
    pub feed: ChangeFeed,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            database: Database::open_in_memory().expect("in-memory db"),
            feed: ChangeFeed::default(),
        }
    }

    pub fn family(&self, id: &str) -> FamilyRecord {
        let record = FamilyRecord {
            id: id.into(),
            name: id.to_string(),
            description: format!("{id} family"),
            image_url: None,
            member_count: 0,
            created_at: now_utc_iso(),
            updated_at: None,
        };
        self.database
            .with_repositories(|repos| repos.families().create(&record))
            .expect("seed family");
        record
    }

    /// Seeds a user and keeps the family counter in step.
    pub fn user(&self, id: &str, role: Role, family_id: Option<&str>) -> Actor {
        let record = UserRecord {
            id: id.into(),
            email: format!("{id}@example.org"),
            display_name: id.to_string(),
            role,
            family_id: family_id.map(str::to_string),
            phone_number: None,
            created_at: now_utc_iso(),
            updated_at: None,
        };
        self.database
            .with_repositories(|repos| {
                repos.users().create(&record)?;
                if let Some(family_id) = family_id {
                    repos.families().increment_member_count(family_id, 1)?;
                }
                Ok(())
            })
            .expect("seed user");
        Actor::from(&record)
    }

    pub fn get_user(&self, id: &str) -> Option<UserRecord> {
        self.database
            .with_repositories(|repos| repos.users().get(id))
            .expect("load user")
    }

    pub fn member_count(&self, family_id: &str) -> i64 {
        self.database
            .with_repositories(|repos| repos.families().get(family_id))
            .expect("load family")
            .expect("family exists")
            .member_count
    }
}
