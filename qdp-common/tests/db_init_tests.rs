//! SQLite store setup

use qdp_common::config::DatabaseConfig;
use qdp_common::db::{connect_sqlite, init_sqlite_schema, provision_survey, REQUIRED_TABLES};

#[tokio::test]
async fn test_in_memory_store_has_required_tables() {
    let pool = connect_sqlite("sqlite::memory:", &DatabaseConfig::default())
        .await
        .unwrap();

    for table in REQUIRED_TABLES {
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(&pool)
                .await
                .unwrap();
        assert_eq!(found.as_deref(), Some(*table));
    }
}

#[tokio::test]
async fn test_schema_init_is_idempotent() {
    let pool = connect_sqlite("sqlite::memory:", &DatabaseConfig::default())
        .await
        .unwrap();
    provision_survey(&pool, "SV_keep", "Kept").await.unwrap();

    init_sqlite_schema(&pool).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM surveys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_file_store_created_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.db");
    let url = format!("sqlite://{}", path.display());

    let pool = connect_sqlite(&url, &DatabaseConfig::default()).await.unwrap();
    provision_survey(&pool, "SV_file", "File").await.unwrap();
    pool.close().await;

    assert!(path.exists());
}

#[tokio::test]
async fn test_response_requires_existing_survey() {
    let pool = connect_sqlite("sqlite::memory:", &DatabaseConfig::default())
        .await
        .unwrap();

    let result = sqlx::query(
        "INSERT INTO survey_responses (survey_id, qualtrics_response_id, response_data) VALUES (?, ?, ?)",
    )
    .bind("00000000-0000-0000-0000-000000000000")
    .bind("R_1")
    .bind("{}")
    .execute(&pool)
    .await;

    assert!(result.is_err(), "foreign key should reject orphan response");
}

#[tokio::test]
async fn test_duplicate_external_survey_id_rejected() {
    let pool = connect_sqlite("sqlite::memory:", &DatabaseConfig::default())
        .await
        .unwrap();
    provision_survey(&pool, "SV_dup", "First").await.unwrap();
    assert!(provision_survey(&pool, "SV_dup", "Second").await.is_err());
}
