mod uploads;

use super::models::UploadRecord;
use anyhow::Result;
use rusqlite::Connection;

pub trait UploadRepository {
    /// Inserts or refreshes the ledger row for a content id. The same bytes
    /// uploaded twice map to one row.
    fn record(&self, record: &UploadRecord) -> Result<()>;
    fn get(&self, content_id: &str) -> Result<Option<UploadRecord>>;
    fn list_recent(&self, limit: usize) -> Result<Vec<UploadRecord>>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn uploads(&self) -> impl UploadRepository + '_ {
        uploads::SqliteUploadRepository { conn: self.conn }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MIGRATIONS;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(MIGRATIONS).expect("migrations");
        conn
    }

    fn upload(content_id: &str, uploaded_at: &str) -> UploadRecord {
        UploadRecord {
            content_id: content_id.into(),
            backend: "fs".into(),
            file_name: Some("cat.png".into()),
            mime: Some("image/png".into()),
            size_bytes: 2048,
            uploaded_at: uploaded_at.into(),
        }
    }

    #[test]
    fn records_and_fetches_uploads() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);

        repos
            .uploads()
            .record(&upload("abc", "2026-01-01T00:00:00Z"))
            .unwrap();
        let stored = repos.uploads().get("abc").unwrap().expect("row");
        assert_eq!(stored.mime.as_deref(), Some("image/png"));
        assert!(repos.uploads().get("missing").unwrap().is_none());
    }

    #[test]
    fn re_recording_keeps_known_metadata() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let uploads = repos.uploads();

        uploads.record(&upload("abc", "2026-01-01T00:00:00Z")).unwrap();
        let mut again = upload("abc", "2026-02-01T00:00:00Z");
        again.file_name = None;
        again.mime = None;
        uploads.record(&again).unwrap();

        let stored = uploads.get("abc").unwrap().expect("row");
        assert_eq!(stored.file_name.as_deref(), Some("cat.png"));
        assert_eq!(stored.uploaded_at, "2026-01-01T00:00:00Z");
    }

    #[test]
    fn lists_newest_first() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let uploads = repos.uploads();
        uploads.record(&upload("old", "2026-01-01T00:00:00Z")).unwrap();
        uploads.record(&upload("new", "2026-03-01T00:00:00Z")).unwrap();

        let listed = uploads.list_recent(10).unwrap();
        assert_eq!(
            listed.iter().map(|u| u.content_id.as_str()).collect::<Vec<_>>(),
            vec!["new", "old"]
        );
        assert_eq!(uploads.list_recent(1).unwrap().len(), 1);
    }
}
