//! Bulk import of document records from CSV.
//!
//! The header row must carry exactly [`EXPECTED_COLUMNS`]; a mismatch aborts
//! before anything is written. Rows are applied one statement at a time, so an
//! error part-way through leaves the earlier rows committed. Document ids are
//! trimmed, matching how the forms look them up.

use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use crate::db::{self, DocumentRecord};
use crate::error::{CertError, CertResult};

pub const EXPECTED_COLUMNS: [&str; 4] = ["document_id", "name", "quality", "category"];

/// What to do when a row's document id is already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Keep the stored row untouched.
    SkipExisting,
    /// Replace name, quality and category.
    #[default]
    Overwrite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub written: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct Row {
    document_id: String,
    name: String,
    quality: String,
    #[serde(default)]
    category: Option<String>,
}

impl From<Row> for DocumentRecord {
    fn from(row: Row) -> Self {
        DocumentRecord {
            document_id: row.document_id.trim().to_string(),
            name: row.name,
            quality: row.quality,
            category: row.category.unwrap_or_default(),
        }
    }
}

pub fn validate_headers(headers: &csv::StringRecord) -> CertResult<()> {
    let found: Vec<String> = headers.iter().map(str::to_string).collect();
    let found_set: BTreeSet<&str> = headers.iter().collect();
    let expected_set: BTreeSet<&str> = EXPECTED_COLUMNS.into_iter().collect();

    if found.len() != EXPECTED_COLUMNS.len() || found_set != expected_set {
        return Err(CertError::SchemaMismatch {
            expected: EXPECTED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            found,
        });
    }
    Ok(())
}

pub async fn load_reader<R: Read>(
    pool: &SqlitePool,
    source: R,
    policy: ConflictPolicy,
) -> CertResult<LoadSummary> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::None).from_reader(source);
    let headers = reader.headers()?.clone();
    validate_headers(&headers)?;

    let mut summary = LoadSummary::default();
    for (idx, result) in reader.deserialize::<Row>().enumerate() {
        let record: DocumentRecord = result?.into();
        match policy {
            ConflictPolicy::Overwrite => {
                db::upsert(pool, &record).await?;
                summary.written += 1;
            }
            ConflictPolicy::SkipExisting => {
                if db::insert_or_skip(pool, &record).await? {
                    summary.written += 1;
                } else {
                    tracing::debug!(row = idx + 1, document_id = %record.document_id, "skipping existing document");
                    summary.skipped += 1;
                }
            }
        }
    }

    Ok(summary)
}

pub async fn load_csv(
    pool: &SqlitePool,
    path: &Path,
    policy: ConflictPolicy,
) -> CertResult<LoadSummary> {
    let file = std::fs::File::open(path)?;
    load_reader(pool, file, policy).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_pool;

    const GOOD: &str = "\
document_id,name,quality,category
100,Ana Pérez,ponente,robótica
200,Luis Gómez,asistente,
";

    #[tokio::test]
    async fn applies_every_row_with_expected_columns() {
        let (_dir, pool) = temp_pool().await;
        let summary = load_reader(&pool, GOOD.as_bytes(), ConflictPolicy::Overwrite)
            .await
            .unwrap();

        assert_eq!(summary, LoadSummary { written: 2, skipped: 0 });
        let luis = db::find_by_document(&pool, "200").await.unwrap().unwrap();
        assert_eq!(luis.name, "Luis Gómez");
        assert_eq!(luis.category, "");
    }

    #[tokio::test]
    async fn column_order_does_not_matter() {
        let (_dir, pool) = temp_pool().await;
        let input = "name,category,document_id,quality\nAna,drones,7,ponente\n";
        load_reader(&pool, input.as_bytes(), ConflictPolicy::Overwrite)
            .await
            .unwrap();
        let ana = db::find_by_document(&pool, "7").await.unwrap().unwrap();
        assert_eq!(ana, DocumentRecord::new("7", "Ana", "ponente", "drones"));
    }

    #[tokio::test]
    async fn wrong_columns_apply_nothing() {
        let (_dir, pool) = temp_pool().await;
        for input in [
            "Documento,Nombre,Calidad,Categoria\n1,Ana,ponente,\n",
            "document_id,name,quality\n1,Ana,ponente\n",
            "document_id,name,quality,category,extra\n1,Ana,ponente,,x\n",
            "document_id,name,quality,quality\n1,Ana,ponente,ponente\n",
        ] {
            let err = load_reader(&pool, input.as_bytes(), ConflictPolicy::Overwrite)
                .await
                .unwrap_err();
            assert!(matches!(err, CertError::SchemaMismatch { .. }), "{input}");
        }
        assert_eq!(db::count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn overwrite_replaces_existing_rows() {
        let (_dir, pool) = temp_pool().await;
        db::insert(&pool, &DocumentRecord::new("100", "Viejo", "asistente", ""))
            .await
            .unwrap();

        let summary = load_reader(&pool, GOOD.as_bytes(), ConflictPolicy::Overwrite)
            .await
            .unwrap();

        assert_eq!(summary.written, 2);
        assert_eq!(db::count(&pool).await.unwrap(), 2);
        let ana = db::find_by_document(&pool, "100").await.unwrap().unwrap();
        assert_eq!(ana.name, "Ana Pérez");
    }

    #[tokio::test]
    async fn skip_existing_keeps_stored_rows() {
        let (_dir, pool) = temp_pool().await;
        db::insert(&pool, &DocumentRecord::new("100", "Viejo", "asistente", ""))
            .await
            .unwrap();

        let summary = load_reader(&pool, GOOD.as_bytes(), ConflictPolicy::SkipExisting)
            .await
            .unwrap();

        assert_eq!(summary, LoadSummary { written: 1, skipped: 1 });
        let kept = db::find_by_document(&pool, "100").await.unwrap().unwrap();
        assert_eq!(kept.name, "Viejo");
    }

    #[tokio::test]
    async fn malformed_row_leaves_earlier_rows_committed() {
        let (_dir, pool) = temp_pool().await;
        let input = "document_id,name,quality,category\n1,Ana,ponente,\n2,Luis\n3,Marta,jurado,\n";

        let err = load_reader(&pool, input.as_bytes(), ConflictPolicy::Overwrite)
            .await
            .unwrap_err();

        assert!(matches!(err, CertError::Csv(_)));
        assert!(db::find_by_document(&pool, "1").await.unwrap().is_some());
        assert!(db::find_by_document(&pool, "3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_csv_reads_from_file() {
        let (dir, pool) = temp_pool().await;
        let path = dir.path().join("records.csv");
        std::fs::write(&path, GOOD).unwrap();

        let summary = load_csv(&pool, &path, ConflictPolicy::Overwrite).await.unwrap();
        assert_eq!(summary.written, 2);

        let missing = load_csv(&pool, &dir.path().join("nope.csv"), ConflictPolicy::Overwrite).await;
        assert!(matches!(missing, Err(CertError::Io(_))));
    }

    #[tokio::test]
    async fn padded_document_id_is_stored_trimmed() {
        let (_dir, pool) = temp_pool().await;
        let input = "document_id,name,quality,category\n\" 100 \",Ana,ponente,drones\n";

        load_reader(&pool, input.as_bytes(), ConflictPolicy::Overwrite)
            .await
            .unwrap();

        let ana = db::find_by_document(&pool, "100").await.unwrap().unwrap();
        assert_eq!(ana.document_id, "100");
        assert_eq!(ana.category, "drones");
    }
}
