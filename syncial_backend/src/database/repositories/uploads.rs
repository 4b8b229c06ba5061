use crate::database::models::UploadRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUploadRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<UploadRecord> {
    Ok(UploadRecord {
        content_id: row.get(0)?,
        backend: row.get(1)?,
        file_name: row.get(2)?,
        mime: row.get(3)?,
        size_bytes: row.get(4)?,
        uploaded_at: row.get(5)?,
    })
}

impl<'conn> super::UploadRepository for SqliteUploadRepository<'conn> {
    fn record(&self, record: &UploadRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO uploads (content_id, backend, file_name, mime, size_bytes, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(content_id) DO UPDATE SET
                backend = excluded.backend,
                file_name = COALESCE(excluded.file_name, uploads.file_name),
                mime = COALESCE(excluded.mime, uploads.mime),
                size_bytes = excluded.size_bytes
            "#,
            params![
                record.content_id,
                record.backend,
                record.file_name,
                record.mime,
                record.size_bytes,
                record.uploaded_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, content_id: &str) -> Result<Option<UploadRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT content_id, backend, file_name, mime, size_bytes, uploaded_at
                FROM uploads
                WHERE content_id = ?1
                "#,
                params![content_id],
                map_row,
            )
            .optional()?;
        Ok(record)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<UploadRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT content_id, backend, file_name, mime, size_bytes, uploaded_at
            FROM uploads
            ORDER BY uploaded_at DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit as i64], map_row)?;
        let mut uploads = Vec::new();
        for row in rows {
            uploads.push(row?);
        }
        Ok(uploads)
    }
}
