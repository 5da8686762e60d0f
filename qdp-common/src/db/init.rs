//! Database connection setup
//!
//! PostgreSQL is the production store and is never migrated from here; the
//! tables must already exist. SQLite stores (local runs, tests) get the same
//! three tables created on open.

use crate::config::DatabaseConfig;
use crate::{Error, Result};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

/// Tables the pipeline reads and writes
pub const REQUIRED_TABLES: &[&str] = &[
    "surveys",
    "survey_responses",
    "survey_responses_extraction_log",
];

/// Open a PostgreSQL pool sized from configuration
///
/// A configured URL wins; otherwise the options are assembled field by field
/// so passwords with reserved URL characters need no escaping.
pub async fn connect_postgres(config: &DatabaseConfig) -> Result<PgPool> {
    let options = match config.url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => PgConnectOptions::from_str(url)?,
        None => {
            let name = config
                .name
                .as_deref()
                .ok_or_else(|| Error::Config("Database name not configured (set DB_NAME)".to_string()))?;
            let mut options = PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .database(name);
            if let Some(user) = config.user.as_deref() {
                options = options.username(user);
            }
            if let Some(password) = config.password.as_deref() {
                options = options.password(password);
            }
            options
        }
    };

    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect_with(options)
        .await?;

    info!(
        host = %config.host,
        min = config.min_connections,
        max = config.max_connections,
        "PostgreSQL pool created"
    );
    Ok(pool)
}

/// Open a SQLite pool and create the pipeline tables if needed
///
/// In-memory databases live only as long as their connection, so they get a
/// single connection that is never recycled.
pub async fn connect_sqlite(url: &str, config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = if is_in_memory(url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?
    };

    init_sqlite_schema(&pool).await?;
    info!(url, "SQLite store opened");
    Ok(pool)
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Create the pipeline tables (idempotent)
pub async fn init_sqlite_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS surveys (
            id TEXT PRIMARY KEY,
            qualtrics_survey_id TEXT NOT NULL UNIQUE,
            name TEXT,
            field_mapping TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS survey_responses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            survey_id TEXT NOT NULL REFERENCES surveys(id),
            qualtrics_response_id TEXT NOT NULL,
            submitted_at TEXT,
            period_year INTEGER,
            period_month TEXT,
            response_data TEXT NOT NULL,
            UNIQUE (survey_id, qualtrics_response_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS survey_responses_extraction_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            survey_id TEXT NOT NULL,
            file_hash TEXT,
            file_path TEXT,
            extracted_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_extraction_log_survey ON survey_responses_extraction_log(survey_id, extracted_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert a survey row for `qualtrics_survey_id`, returning its internal id
///
/// Surveys are owned by the reporting application; this exists for local
/// SQLite stores and tests.
pub async fn provision_survey(pool: &SqlitePool, qualtrics_survey_id: &str, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO surveys (id, qualtrics_survey_id, name, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(qualtrics_survey_id)
    .bind(name)
    .bind(crate::time::to_storage_text(crate::time::now()))
    .execute(pool)
    .await?;
    Ok(id)
}
