use anyhow::Result;
use doorstep_lib::{db, migrate};

#[tokio::test]
async fn opens_on_disk_pool_and_applies_migrations_idempotently() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("doorstep.sqlite3");

    let pool = db::open_sqlite_pool(&db_path).await?;
    migrate::apply_migrations(&pool).await?;
    // a second run must skip everything without error
    migrate::apply_migrations(&pool).await?;

    let status = migrate::migration_status(&pool).await?;
    assert!(!status.is_empty());
    assert!(status.iter().all(|(_, applied)| *applied));

    let (journal_mode,): (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(&pool)
        .await?;
    assert!(journal_mode.eq_ignore_ascii_case("wal"));

    let (fks,): (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(&pool)
        .await?;
    assert_eq!(fks, 1);

    pool.close().await;
    Ok(())
}
