use crate::database::models::NotificationRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteNotificationRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<NotificationRecord> {
    Ok(NotificationRecord {
        id: row.get(0)?,
        family_id: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        notification_type: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl<'conn> super::NotificationRepository for SqliteNotificationRepository<'conn> {
    fn create(&self, record: &NotificationRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO notifications (id, family_id, title, message, notification_type, is_read, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.id,
                record.family_id,
                record.title,
                record.message,
                record.notification_type,
                record.is_read,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<NotificationRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, family_id, title, message, notification_type, is_read, created_at
                FROM notifications
                WHERE id = ?1
                "#,
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn list_for_family(&self, family_id: &str) -> Result<Vec<NotificationRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, family_id, title, message, notification_type, is_read, created_at
            FROM notifications
            WHERE family_id = ?1
            ORDER BY datetime(created_at) DESC, rowid DESC
            "#,
        )?;
        let rows = stmt.query_map(params![family_id], map_row)?;
        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    fn mark_read(&self, id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    fn count_unread(&self, family_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE family_id = ?1 AND is_read = 0",
            params![family_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
