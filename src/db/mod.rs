mod models;

pub use models::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CertError, CertResult};

pub type DbPool = Arc<SqlitePool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Insert the record, or overwrite name, quality and category if the document
/// already exists.
pub async fn upsert(pool: &SqlitePool, record: &DocumentRecord) -> CertResult<()> {
    sqlx::query(
        r#"
        INSERT INTO document_records (document_id, name, quality, category)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(document_id) DO UPDATE SET
            name = excluded.name,
            quality = excluded.quality,
            category = excluded.category
        "#,
    )
    .bind(&record.document_id)
    .bind(&record.name)
    .bind(&record.quality)
    .bind(&record.category)
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert the record unless the document already exists. Returns whether a row
/// was written.
pub async fn insert_or_skip(pool: &SqlitePool, record: &DocumentRecord) -> CertResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO document_records (document_id, name, quality, category)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(document_id) DO NOTHING
        "#,
    )
    .bind(&record.document_id)
    .bind(&record.name)
    .bind(&record.quality)
    .bind(&record.category)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_by_document(
    pool: &SqlitePool,
    document_id: &str,
) -> CertResult<Option<DocumentRecord>> {
    let record = sqlx::query_as::<_, DocumentRecord>(
        "SELECT document_id, name, quality, category FROM document_records WHERE document_id = ?",
    )
    .bind(document_id)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

pub async fn find_committee_member(
    pool: &SqlitePool,
    document_id: &str,
) -> CertResult<Option<CommitteeMember>> {
    let member = sqlx::query_as::<_, CommitteeMember>(
        "SELECT document_id, full_name FROM committee_members WHERE document_id = ?",
    )
    .bind(document_id)
    .fetch_optional(pool)
    .await?;
    Ok(member)
}

pub async fn insert(pool: &SqlitePool, record: &DocumentRecord) -> CertResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO document_records (document_id, name, quality, category)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&record.document_id)
    .bind(&record.name)
    .bind(&record.quality)
    .bind(&record.category)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(CertError::DuplicateKey(record.document_id.clone()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update(pool: &SqlitePool, record: &DocumentRecord) -> CertResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE document_records
        SET name = ?, quality = ?, category = ?
        WHERE document_id = ?
        "#,
    )
    .bind(&record.name)
    .bind(&record.quality)
    .bind(&record.category)
    .bind(&record.document_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CertError::NotFound(record.document_id.clone()));
    }
    Ok(())
}

pub async fn delete(pool: &SqlitePool, document_id: &str) -> CertResult<()> {
    let result = sqlx::query("DELETE FROM document_records WHERE document_id = ?")
        .bind(document_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CertError::NotFound(document_id.to_string()));
    }
    Ok(())
}

/// Every record in storage order, read fresh on each call.
pub async fn list_all(pool: &SqlitePool) -> CertResult<Vec<DocumentRecord>> {
    let records = sqlx::query_as::<_, DocumentRecord>(
        "SELECT document_id, name, quality, category FROM document_records",
    )
    .fetch_all(pool)
    .await?;
    Ok(records)
}

pub async fn count(pool: &SqlitePool) -> CertResult<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_records")
        .fetch_one(pool)
        .await?;
    Ok(n)
}
