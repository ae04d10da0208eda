use crate::database::models::{FamilyRequestRecord, RequestStatus};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteFamilyRequestRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<FamilyRequestRecord> {
    Ok(FamilyRequestRecord {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        requester_name: row.get(2)?,
        family_name: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        reviewed_by: row.get(8)?,
        family_id: row.get(9)?,
    })
}

impl<'conn> super::FamilyRequestRepository for SqliteFamilyRequestRepository<'conn> {
    fn create(&self, record: &FamilyRequestRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO family_requests
                (id, requester_id, requester_name, family_name, description, status,
                 created_at, updated_at, reviewed_by, family_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.id,
                record.requester_id,
                record.requester_name,
                record.family_name,
                record.description,
                record.status,
                record.created_at,
                record.updated_at,
                record.reviewed_by,
                record.family_id,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<FamilyRequestRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, requester_id, requester_name, family_name, description, status,
                       created_at, updated_at, reviewed_by, family_id
                FROM family_requests
                WHERE id = ?1
                "#,
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list(&self, status: Option<RequestStatus>) -> Result<Vec<FamilyRequestRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, requester_id, requester_name, family_name, description, status,
                   created_at, updated_at, reviewed_by, family_id
            FROM family_requests
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY datetime(created_at) DESC, rowid DESC
            "#,
        )?;
        let rows = stmt.query_map(params![status], map_row)?;
        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    fn update(&self, record: &FamilyRequestRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE family_requests
            SET status = ?2, updated_at = ?3, reviewed_by = ?4, family_id = ?5
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.status,
                record.updated_at,
                record.reviewed_by,
                record.family_id,
            ],
        )?;
        Ok(())
    }
}
