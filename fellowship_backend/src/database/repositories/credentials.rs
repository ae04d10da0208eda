use crate::database::models::CredentialRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteCredentialRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::CredentialRepository for SqliteCredentialRepository<'conn> {
    fn create(&self, record: &CredentialRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO credentials (user_id, email, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                record.user_id,
                record.email,
                record.password_hash,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get_by_email(&self, email: &str) -> Result<Option<CredentialRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT user_id, email, password_hash, created_at
                FROM credentials
                WHERE email = lower(?1)
                "#,
                params![email],
                |row| {
                    Ok(CredentialRecord {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                        password_hash: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn delete(&self, user_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM credentials WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }
}
