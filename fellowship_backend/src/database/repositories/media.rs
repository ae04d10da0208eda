use crate::database::models::{MediaRecord, MediaType};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, family_id, media_type, title, description, url, download_url, \
     blob_path, mime, size_bytes, checksum, uploaded_by, uploaded_at, tags";

pub(super) struct SqliteMediaRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    let raw_tags: String = row.get(13)?;
    let tags = serde_json::from_str(&raw_tags)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(13, Type::Text, Box::new(err)))?;
    Ok(MediaRecord {
        id: row.get(0)?,
        family_id: row.get(1)?,
        media_type: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        url: row.get(5)?,
        download_url: row.get(6)?,
        blob_path: row.get(7)?,
        mime: row.get(8)?,
        size_bytes: row.get(9)?,
        checksum: row.get(10)?,
        uploaded_by: row.get(11)?,
        uploaded_at: row.get(12)?,
        tags,
    })
}

impl<'conn> super::MediaRepository for SqliteMediaRepository<'conn> {
    fn create(&self, record: &MediaRecord) -> Result<()> {
        let tags = serde_json::to_string(&record.tags)?;
        self.conn.execute(
            &format!(
                "INSERT INTO media ({COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                record.id,
                record.family_id,
                record.media_type,
                record.title,
                record.description,
                record.url,
                record.download_url,
                record.blob_path,
                record.mime,
                record.size_bytes,
                record.checksum,
                record.uploaded_by,
                record.uploaded_at,
                tags,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<MediaRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM media WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list_for_family(
        &self,
        family_id: &str,
        media_type: Option<MediaType>,
    ) -> Result<Vec<MediaRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM media \
             WHERE family_id = ?1 AND (?2 IS NULL OR media_type = ?2) \
             ORDER BY datetime(uploaded_at) DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![family_id, media_type], map_row)?;
        let mut media = Vec::new();
        for row in rows {
            media.push(row?);
        }
        Ok(media)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM media WHERE id = ?1", params![id])?;
        Ok(())
    }
}
