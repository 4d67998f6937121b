//! Paper repository — lifecycle-aware operations on the `papers` table.
//!
//! All functions take a `&Connection` so they work both under
//! `Database::with_conn` (autocommit) and inside `Database::with_tx`
//! (a `Transaction` derefs to `Connection`).

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::analysis_repo::{self, AnalysisRow};
use super::DatabaseError;

/// Lifecycle status of a paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PaperStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaperStatus::Pending => "pending",
            PaperStatus::Processing => "processing",
            PaperStatus::Completed => "completed",
            PaperStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaperStatus::Pending),
            "processing" => Some(PaperStatus::Processing),
            "completed" => Some(PaperStatus::Completed),
            "failed" => Some(PaperStatus::Failed),
            _ => None,
        }
    }

    /// `completed` and `failed` accept no further automatic transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, PaperStatus::Completed | PaperStatus::Failed)
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    ///
    /// The success path is `pending -> processing -> completed`. A retry
    /// keeps the paper in `processing`; exhausted retries settle `failed`.
    /// `completed -> processing` is allowed so a redelivered or re-submitted
    /// job can safely re-run (persistence is an upsert). `failed` is
    /// permanent until an explicit reset back to `pending`.
    pub fn can_transition(self, next: PaperStatus) -> bool {
        use PaperStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Processing)
                | (Failed, Failed)
                | (Failed, Pending)
        )
    }
}

impl std::fmt::Display for PaperStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A paper row from the database.
#[derive(Debug, Clone)]
pub struct PaperRow {
    pub id: i64,
    /// Original filename, display-only.
    pub filename: String,
    /// Server-assigned filename in the document store.
    pub stored_filename: String,
    pub status: PaperStatus,
    /// Diagnostic from the last terminal failure, if any.
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PaperRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status_str: String = row.get("status")?;
        let status = PaperStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown paper status '{}'", status_str).into(),
            )
        })?;

        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            stored_filename: row.get("stored_filename")?,
            status,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new paper in `pending` status and returns its identifier.
pub fn create(
    conn: &Connection,
    filename: &str,
    stored_filename: &str,
) -> Result<i64, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO papers (filename, stored_filename, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![
            filename,
            stored_filename,
            PaperStatus::Pending.as_str(),
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Finds a paper by its identifier.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<PaperRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM papers WHERE id = ?1",
            params![id],
            PaperRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Updates a paper's status, enforcing the lifecycle state machine.
///
/// The current status is read and checked under the connection lock,
/// so concurrent updaters observe a linearizable transition sequence.
/// `error` is stored on failure transitions and cleared otherwise,
/// except that re-failing an already failed paper keeps its first
/// diagnostic.
pub fn update_status(
    conn: &Connection,
    id: i64,
    next: PaperStatus,
    error: Option<&str>,
) -> Result<(), DatabaseError> {
    let paper = find_by_id(conn, id)?.ok_or(DatabaseError::PaperNotFound { id })?;
    let current = paper.status;

    if !current.can_transition(next) {
        return Err(DatabaseError::IllegalTransition {
            id,
            from: current.as_str(),
            to: next.as_str(),
        });
    }

    let error = if current == PaperStatus::Failed && next == PaperStatus::Failed {
        paper.error.as_deref().or(error)
    } else {
        error
    };

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE papers SET status = ?2, error = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, next.as_str(), error, now],
    )?;
    Ok(())
}

/// Resets a terminally failed paper back to `pending` so an external
/// caller can re-submit it. The pipeline never calls this itself.
pub fn reset_failed(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    update_status(conn, id, PaperStatus::Pending, None)
}

/// The poll surface: a paper together with its analysis, if one exists.
pub fn get_with_analysis(
    conn: &Connection,
    id: i64,
) -> Result<Option<(PaperRow, Option<AnalysisRow>)>, DatabaseError> {
    let paper = match find_by_id(conn, id)? {
        Some(p) => p,
        None => return Ok(None),
    };
    let analysis = analysis_repo::find_by_paper_id(conn, id)?;
    Ok(Some((paper, analysis)))
}

/// Counts papers with the given status.
pub fn count_by_status(conn: &Connection, status: PaperStatus) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM papers WHERE status = ?1",
        params![status.as_str()],
        |r| r.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_create_and_find() {
        let db = test_db();
        let id = db
            .with_conn(|c| create(c, "paper.pdf", "abc123.pdf"))
            .unwrap();

        let found = db.with_conn(|c| find_by_id(c, id)).unwrap().unwrap();
        assert_eq!(found.filename, "paper.pdf");
        assert_eq!(found.stored_filename, "abc123.pdf");
        assert_eq!(found.status, PaperStatus::Pending);
        assert!(found.error.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        let found = db.with_conn(|c| find_by_id(c, 999)).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_success_path_transitions() {
        let db = test_db();
        let id = db.with_conn(|c| create(c, "a.pdf", "a.pdf")).unwrap();

        db.with_conn(|c| update_status(c, id, PaperStatus::Processing, None))
            .unwrap();
        db.with_conn(|c| update_status(c, id, PaperStatus::Completed, None))
            .unwrap();

        let found = db.with_conn(|c| find_by_id(c, id)).unwrap().unwrap();
        assert_eq!(found.status, PaperStatus::Completed);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let db = test_db();
        let id = db.with_conn(|c| create(c, "a.pdf", "b.pdf")).unwrap();

        // pending cannot jump straight to a terminal state
        for next in [PaperStatus::Completed, PaperStatus::Failed] {
            let err = db
                .with_conn(|c| update_status(c, id, next, None))
                .unwrap_err();
            assert!(matches!(err, DatabaseError::IllegalTransition { .. }));
        }

        // failed cannot go back to processing without a reset
        db.with_conn(|c| update_status(c, id, PaperStatus::Processing, None))
            .unwrap();
        db.with_conn(|c| update_status(c, id, PaperStatus::Failed, Some("boom")))
            .unwrap();
        let err = db
            .with_conn(|c| update_status(c, id, PaperStatus::Processing, None))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::IllegalTransition { .. }));
    }

    #[test]
    fn test_retry_loop_and_terminal_failure() {
        let db = test_db();
        let id = db.with_conn(|c| create(c, "a.pdf", "c.pdf")).unwrap();

        db.with_conn(|c| update_status(c, id, PaperStatus::Processing, None))
            .unwrap();
        // retry keeps the paper in processing
        db.with_conn(|c| update_status(c, id, PaperStatus::Processing, None))
            .unwrap();
        db.with_conn(|c| update_status(c, id, PaperStatus::Failed, Some("rate limited")))
            .unwrap();

        let found = db.with_conn(|c| find_by_id(c, id)).unwrap().unwrap();
        assert_eq!(found.status, PaperStatus::Failed);
        assert_eq!(found.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn test_refailing_keeps_first_diagnostic() {
        let db = test_db();
        let id = db.with_conn(|c| create(c, "a.pdf", "f.pdf")).unwrap();
        db.with_conn(|c| update_status(c, id, PaperStatus::Processing, None))
            .unwrap();
        db.with_conn(|c| update_status(c, id, PaperStatus::Failed, Some("rate limited")))
            .unwrap();

        db.with_conn(|c| update_status(c, id, PaperStatus::Failed, Some("later failure")))
            .unwrap();

        let found = db.with_conn(|c| find_by_id(c, id)).unwrap().unwrap();
        assert_eq!(found.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn test_reset_failed() {
        let db = test_db();
        let id = db.with_conn(|c| create(c, "a.pdf", "d.pdf")).unwrap();
        db.with_conn(|c| update_status(c, id, PaperStatus::Processing, None))
            .unwrap();
        db.with_conn(|c| update_status(c, id, PaperStatus::Failed, Some("x")))
            .unwrap();

        db.with_conn(|c| reset_failed(c, id)).unwrap();
        let found = db.with_conn(|c| find_by_id(c, id)).unwrap().unwrap();
        assert_eq!(found.status, PaperStatus::Pending);
        assert!(found.error.is_none());
    }

    #[test]
    fn test_update_status_missing_paper() {
        let db = test_db();
        let err = db
            .with_conn(|c| update_status(c, 42, PaperStatus::Processing, None))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::PaperNotFound { id: 42 }));
    }

    #[test]
    fn test_status_sequence_is_prefix_of_lifecycle() {
        // The only observable sequences are prefixes of
        // pending, processing, (processing)*, completed|failed.
        use PaperStatus::*;
        assert!(Pending.can_transition(Processing));
        assert!(Processing.can_transition(Processing));
        assert!(Processing.can_transition(Completed));
        assert!(Processing.can_transition(Failed));

        assert!(!Pending.can_transition(Completed));
        assert!(!Pending.can_transition(Failed));
        assert!(!Pending.can_transition(Pending));
        assert!(!Completed.can_transition(Failed));
        assert!(!Completed.can_transition(Pending));
        assert!(!Failed.can_transition(Processing));
        assert!(!Failed.can_transition(Completed));

        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Processing.is_terminal());
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        db.with_conn(|c| create(c, "a.pdf", "e1.pdf")).unwrap();
        db.with_conn(|c| create(c, "b.pdf", "e2.pdf")).unwrap();

        assert_eq!(
            db.with_conn(|c| count_by_status(c, PaperStatus::Pending))
                .unwrap(),
            2
        );
        assert_eq!(
            db.with_conn(|c| count_by_status(c, PaperStatus::Completed))
                .unwrap(),
            0
        );
    }
}
