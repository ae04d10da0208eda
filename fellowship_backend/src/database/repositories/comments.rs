use crate::database::models::CommentRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn append(&self, record: &CommentRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO post_comments (id, post_id, author_id, author_name, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.post_id,
                record.author_id,
                record.author_name,
                record.content,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, post_id: &str, id: &str) -> Result<Option<CommentRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, post_id, author_id, author_name, content, created_at
                FROM post_comments
                WHERE post_id = ?1 AND id = ?2
                "#,
                params![post_id, id],
                map_row,
            )
            .optional()?)
    }

    fn list_for_post(&self, post_id: &str) -> Result<Vec<CommentRecord>> {
        // insertion order is chronological order
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, post_id, author_id, author_name, content, created_at
            FROM post_comments
            WHERE post_id = ?1
            ORDER BY seq ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], map_row)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn delete(&self, post_id: &str, id: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM post_comments WHERE post_id = ?1 AND id = ?2",
            params![post_id, id],
        )?;
        Ok(removed > 0)
    }
}
