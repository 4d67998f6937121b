//! Analysis repository — upsert-by-paper operations on the `analyses` table.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::parser::AnalysisFields;

use super::DatabaseError;

/// An analysis row from the database. At most one exists per paper,
/// enforced by the UNIQUE constraint on `paper_id`.
#[derive(Debug, Clone)]
pub struct AnalysisRow {
    pub id: i64,
    pub paper_id: i64,
    pub title: String,
    pub exec_summary: String,
    pub background: String,
    pub methods: String,
    pub results: String,
    pub discussion: String,
    pub quick_ref: String,
    pub created_at: String,
    pub updated_at: String,
}

impl AnalysisRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            paper_id: row.get("paper_id")?,
            title: row.get("title")?,
            exec_summary: row.get("exec_summary")?,
            background: row.get("background")?,
            methods: row.get("methods")?,
            results: row.get("results")?,
            discussion: row.get("discussion")?,
            quick_ref: row.get("quick_ref")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts or overwrites the analysis for a paper.
///
/// The persistence key is the paper identifier: a retried job updates
/// the existing row in place, never creating a duplicate. `created_at`
/// is preserved across overwrites.
pub fn upsert(conn: &Connection, paper_id: i64, fields: &AnalysisFields) -> Result<(), DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO analyses (paper_id, title, exec_summary, background, methods,
         results, discussion, quick_ref, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
         ON CONFLICT(paper_id) DO UPDATE SET
             title = excluded.title,
             exec_summary = excluded.exec_summary,
             background = excluded.background,
             methods = excluded.methods,
             results = excluded.results,
             discussion = excluded.discussion,
             quick_ref = excluded.quick_ref,
             updated_at = excluded.updated_at",
        params![
            paper_id,
            fields.title,
            fields.exec_summary,
            fields.background,
            fields.methods,
            fields.results,
            fields.discussion,
            fields.quick_ref,
            now,
        ],
    )?;
    Ok(())
}

/// Finds the analysis owned by the given paper.
pub fn find_by_paper_id(
    conn: &Connection,
    paper_id: i64,
) -> Result<Option<AnalysisRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM analyses WHERE paper_id = ?1",
            params![paper_id],
            AnalysisRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Total number of analysis rows.
pub fn count(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row("SELECT COUNT(*) FROM analyses", [], |r| r.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{paper_repo, Database};

    fn fields(summary: &str) -> AnalysisFields {
        AnalysisFields {
            title: "A Title".to_string(),
            exec_summary: summary.to_string(),
            background: "B".to_string(),
            methods: "M".to_string(),
            results: "R".to_string(),
            discussion: "D".to_string(),
            quick_ref: "Q".to_string(),
        }
    }

    #[test]
    fn test_upsert_inserts_then_overwrites() {
        let db = Database::open_in_memory().unwrap();
        let paper_id = db
            .with_conn(|c| paper_repo::create(c, "a.pdf", "u1.pdf"))
            .unwrap();

        db.with_conn(|c| upsert(c, paper_id, &fields("first")))
            .unwrap();
        db.with_conn(|c| upsert(c, paper_id, &fields("second")))
            .unwrap();

        assert_eq!(db.with_conn(count).unwrap(), 1);
        let row = db
            .with_conn(|c| find_by_paper_id(c, paper_id))
            .unwrap()
            .unwrap();
        assert_eq!(row.exec_summary, "second");
        assert_eq!(row.title, "A Title");
    }

    #[test]
    fn test_upsert_preserves_created_at() {
        let db = Database::open_in_memory().unwrap();
        let paper_id = db
            .with_conn(|c| paper_repo::create(c, "a.pdf", "u2.pdf"))
            .unwrap();

        db.with_conn(|c| upsert(c, paper_id, &fields("x"))).unwrap();
        let first = db
            .with_conn(|c| find_by_paper_id(c, paper_id))
            .unwrap()
            .unwrap();

        db.with_conn(|c| upsert(c, paper_id, &fields("y"))).unwrap();
        let second = db
            .with_conn(|c| find_by_paper_id(c, paper_id))
            .unwrap()
            .unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_find_missing_returns_none() {
        let db = Database::open_in_memory().unwrap();
        let row = db.with_conn(|c| find_by_paper_id(c, 7)).unwrap();
        assert!(row.is_none());
    }

    #[test]
    fn test_upsert_requires_existing_paper() {
        // foreign_keys=ON means an analysis cannot exist without its paper
        let db = Database::open_in_memory().unwrap();
        let result = db.with_conn(|c| upsert(c, 999, &fields("x")));
        assert!(result.is_err());
    }
}
