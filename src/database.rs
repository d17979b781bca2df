use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::create_timestamp;
use crate::sandbox::{ResultSink, TestResult};

const DATABASE_NAME: &str = "judge.sqlite3";

pub fn get_db_path() -> PathBuf {
    use directories::ProjectDirs;

    let proj_dirs = ProjectDirs::from("", "", "judge").expect("Unable to find user directory");
    let data_dir = proj_dirs.data_local_dir();

    fs::create_dir_all(data_dir).expect("Failed to create local data dir");

    data_dir.join(DATABASE_NAME)
}

pub async fn init_db(db_path: impl AsRef<Path>) -> sqlx::Result<SqlitePool> {
    // rwc = read/write/create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(0)
        .connect(&db_url)
        .await?;

    // PRAGMA statements cannot be run inside a transaction
    for pragma_sql in &[
        "PRAGMA busy_timeout = 2000;", // 2 seconds timeout for lock contention
        "PRAGMA journal_mode = WAL;",
        "PRAGMA synchronous = NORMAL;",
    ] {
        sqlx::query(pragma_sql).execute(&db_pool).await?;
    }

    let mut tx = db_pool.begin().await?;

    for sql in &[
        r"
        CREATE TABLE IF NOT EXISTS test_results (
            id               INTEGER  PRIMARY KEY AUTOINCREMENT,
            created_time     TEXT     NOT NULL,
            problem_title    TEXT     NOT NULL,
            user_code        TEXT     NOT NULL,
            input            TEXT     NOT NULL,
            expected_output  TEXT     NOT NULL,
            user_output      TEXT,
            test_passed      INTEGER  NOT NULL,
            error_kind       TEXT,
            error            TEXT
        );",
        "CREATE INDEX IF NOT EXISTS idx_test_results_created_time ON test_results(created_time);",
    ] {
        sqlx::query(sql).execute(tx.as_mut()).await?;
    }

    tx.commit().await?;

    log::info!("Initialized database at {}", db_path.as_ref().display());

    Ok(db_pool)
}

pub fn remove_db(db_path: impl AsRef<Path>) {
    // WAL and SHM files might not exist
    let wal_path = format!("{}-wal", db_path.as_ref().display());
    let shm_path = format!("{}-shm", db_path.as_ref().display());
    let _ = fs::remove_file(wal_path);
    let _ = fs::remove_file(shm_path);

    if let Err(e) = std::fs::remove_file(&db_path) {
        log::warn!(
            "Unable to remove database at {}: {e}",
            db_path.as_ref().display()
        );
    } else {
        log::info!("Removed database at {}", db_path.as_ref().display());
    }
}

/// Stores every judged test case as one row of `test_results`
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ResultSink for SqliteSink {
    async fn record(
        &self,
        problem_title: &str,
        user_code: &str,
        result: &TestResult,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO test_results
                (created_time, problem_title, user_code, input, expected_output,
                 user_output, test_passed, error_kind, error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(create_timestamp())
        .bind(problem_title)
        .bind(user_code)
        .bind(&result.input)
        .bind(&result.expected_output)
        .bind(result.user_output.as_deref())
        .bind(result.test_passed)
        .bind(result.error_kind.map(|k| k.as_str()))
        .bind(result.error.as_deref())
        .execute(&self.pool)
        .await?;

        log::debug!("Recorded test result for {problem_title:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{ErrorKind, TestCase};

    fn case() -> TestCase {
        TestCase {
            input: "3 5".to_string(),
            expected_output: "8".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sink_writes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_db(dir.path().join("results.sqlite3")).await.unwrap();
        let sink = SqliteSink::new(pool);

        sink.record("Sum of Two Numbers", "print(8)", &TestResult::passed(&case(), "8"))
            .await
            .unwrap();
        sink.record(
            "Sum of Two Numbers",
            "print(8)",
            &TestResult::failed(&case(), None, ErrorKind::Timeout, "Execution timed out"),
        )
        .await
        .unwrap();

        let rows: Vec<(String, Option<String>, bool, Option<String>)> = sqlx::query_as(
            "SELECT problem_title, user_output, test_passed, error_kind \
             FROM test_results ORDER BY id",
        )
        .fetch_all(sink.pool())
        .await
        .unwrap();

        assert_eq!(
            rows,
            vec![
                ("Sum of Two Numbers".to_string(), Some("8".to_string()), true, None),
                (
                    "Sum of Two Numbers".to_string(),
                    None,
                    false,
                    Some("Timeout".to_string())
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_init_is_idempotent_and_remove_deletes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.sqlite3");

        init_db(&path).await.unwrap().close().await;
        init_db(&path).await.unwrap().close().await;
        assert!(path.exists());

        remove_db(&path);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sink_on_closed_pool_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_db(dir.path().join("results.sqlite3")).await.unwrap();
        pool.close().await;

        let sink = SqliteSink::new(pool);
        assert!(
            sink.record("t", "c", &TestResult::passed(&case(), "8"))
                .await
                .is_err()
        );
    }
}
