use crate::database::models::FamilyRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteFamilyRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<FamilyRecord> {
    Ok(FamilyRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        image_url: row.get(3)?,
        member_count: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl<'conn> super::FamilyRepository for SqliteFamilyRepository<'conn> {
    fn create(&self, record: &FamilyRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO families (id, name, description, image_url, member_count, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.id,
                record.name,
                record.description,
                record.image_url,
                record.member_count,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<FamilyRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, name, description, image_url, member_count, created_at, updated_at
                FROM families
                WHERE id = ?1
                "#,
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list(&self) -> Result<Vec<FamilyRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, description, image_url, member_count, created_at, updated_at
            FROM families
            ORDER BY name COLLATE NOCASE ASC
            "#,
        )?;
        let rows = stmt.query_map([], map_row)?;
        let mut families = Vec::new();
        for row in rows {
            families.push(row?);
        }
        Ok(families)
    }

    fn update(&self, record: &FamilyRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE families
            SET name = ?2, description = ?3, image_url = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.name,
                record.description,
                record.image_url,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn increment_member_count(&self, id: &str, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE families SET member_count = member_count + ?2 WHERE id = ?1",
            params![id, delta],
        )?;
        Ok(())
    }

    fn set_member_count(&self, id: &str, count: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE families SET member_count = ?2 WHERE id = ?1",
            params![id, count],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM families WHERE id = ?1", params![id])?;
        Ok(())
    }
}
