use crate::database::models::{AdminRequestRecord, RequestStatus};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, user_id, email, display_name, phone_number, status, \
     created_at, reviewed_at, reviewed_by, reason";

pub(super) struct SqliteAdminRequestRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<AdminRequestRecord> {
    Ok(AdminRequestRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        display_name: row.get(3)?,
        phone_number: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        reviewed_at: row.get(7)?,
        reviewed_by: row.get(8)?,
        reason: row.get(9)?,
    })
}

impl<'conn> super::AdminRequestRepository for SqliteAdminRequestRepository<'conn> {
    fn create(&self, record: &AdminRequestRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO admin_requests ({COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                record.id,
                record.user_id,
                record.email,
                record.display_name,
                record.phone_number,
                record.status,
                record.created_at,
                record.reviewed_at,
                record.reviewed_by,
                record.reason,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<AdminRequestRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM admin_requests WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list(&self, status: Option<RequestStatus>) -> Result<Vec<AdminRequestRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM admin_requests \
             WHERE ?1 IS NULL OR status = ?1 \
             ORDER BY datetime(created_at) DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![status], map_row)?;
        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    fn find_pending_for_user(&self, user_id: &str) -> Result<Option<AdminRequestRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM admin_requests \
                     WHERE user_id = ?1 AND status = 'pending' \
                     ORDER BY rowid DESC LIMIT 1"
                ),
                params![user_id],
                map_row,
            )
            .optional()?)
    }

    fn update(&self, record: &AdminRequestRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE admin_requests
            SET status = ?2, reviewed_at = ?3, reviewed_by = ?4, reason = ?5
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.status,
                record.reviewed_at,
                record.reviewed_by,
                record.reason,
            ],
        )?;
        Ok(())
    }
}
