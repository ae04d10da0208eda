use crate::database::models::{Role, UserRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str =
    "id, email, display_name, role, family_id, phone_number, created_at, updated_at";

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        role: row.get(3)?,
        family_id: row.get(4)?,
        phone_number: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl<'conn> SqliteUserRepository<'conn> {
    fn query_many(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<UserRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, map_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, record: &UserRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO users (id, email, display_name, role, family_id, phone_number, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.email,
                record.display_name,
                record.role,
                record.family_id,
                record.phone_number,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE lower(email) = lower(?1)"),
                params![email],
                map_row,
            )
            .optional()?)
    }

    fn list(&self) -> Result<Vec<UserRecord>> {
        self.query_many(
            &format!("SELECT {COLUMNS} FROM users ORDER BY created_at ASC"),
            [],
        )
    }

    fn list_for_family(&self, family_id: &str) -> Result<Vec<UserRecord>> {
        self.query_many(
            &format!(
                "SELECT {COLUMNS} FROM users WHERE family_id = ?1 ORDER BY display_name COLLATE NOCASE ASC"
            ),
            params![family_id],
        )
    }

    fn count_for_family(&self, family_id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE family_id = ?1",
            params![family_id],
            |row| row.get(0),
        )?)
    }

    fn count_with_role(&self, family_id: &str, role: Role) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE family_id = ?1 AND role = ?2",
            params![family_id, role],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn set_family(&self, id: &str, family_id: Option<&str>, updated_at: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET family_id = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, family_id, updated_at],
        )?;
        Ok(())
    }

    fn set_role(&self, id: &str, role: Role, updated_at: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, role, updated_at],
        )?;
        Ok(())
    }

    fn update_profile(
        &self,
        id: &str,
        display_name: &str,
        phone_number: Option<&str>,
        updated_at: &str,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE users
            SET display_name = ?2, phone_number = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
            params![id, display_name, phone_number, updated_at],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(())
    }
}
