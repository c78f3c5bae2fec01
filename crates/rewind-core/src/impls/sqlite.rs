//! SQLite implementation of Repository.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, info, warn};

use super::JsonCodec;
use crate::app::JobCounts;
use crate::domain::{Job, JobId, JobRow, JobStatus, RepositoryError, TaskName};
use crate::ports::{Codec, IdGenerator, Repository, SystemClock, UlidGenerator};

/// Connection settings for [`SqliteRepository::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// sqlx connection URL, e.g. `sqlite://rewind.db` or `sqlite::memory:`.
    pub url: String,
    pub max_connections: u32,
    pub create_if_missing: bool,
}

impl SqliteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// A private in-memory database; lives as long as the single pooled connection.
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    /// Each connection to an in-memory URL opens its own empty database.
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Pool size actually used by [`SqliteRepository::connect`].
    pub fn effective_max_connections(&self) -> u32 {
        if self.is_in_memory() {
            1
        } else {
            self.max_connections.max(1)
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://rewind.db".to_string(),
            max_connections: 1,
            create_if_missing: true,
        }
    }
}

fn storage(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

fn parse_id(raw: &str) -> Result<JobId, RepositoryError> {
    JobId::from_str(raw).map_err(|e| RepositoryError::Corrupt(format!("job id {raw}: {e}")))
}

/// SQLite-backed job repository.
///
/// Every statement is auto-committed on its own; lookup and insert are not
/// wrapped in a shared transaction (single writer assumed).
pub struct SqliteRepository {
    pool: SqlitePool,
    codec: Arc<dyn Codec>,
    ids: Arc<dyn IdGenerator>,
}

impl SqliteRepository {
    /// Wrap an existing pool. Call [`run_migrations`](Self::run_migrations) before use.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            codec: Arc::new(JsonCodec),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Open the database described by `config` and create the schema.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, RepositoryError> {
        info!(url = %config.url, "connecting");
        let max_connections = config.effective_max_connections();
        if max_connections != config.max_connections {
            warn!(
                requested = config.max_connections,
                max_connections, "pool size clamped"
            );
        }

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(storage)?
            .create_if_missing(config.create_if_missing)
            .foreign_keys(true);

        // in-memory databases vanish with their connection, so never recycle it
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(storage)?;

        let repo = Self::new(pool);
        repo.run_migrations().await?;
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Release every pooled connection.
    pub async fn close(&self) {
        info!("disconnecting");
        self.pool.close().await;
    }

    /// Create the job table and its lookup index.
    pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job (
                id TEXT PRIMARY KEY,
                parent_id TEXT REFERENCES job(id),
                status INTEGER NOT NULL,
                function_id TEXT NOT NULL,
                args_hash TEXT NOT NULL,
                args_encoding BLOB NOT NULL,
                result_encoding BLOB
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_job_lookup
            ON job(function_id, args_hash, parent_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    pub async fn counts_by_status(&self) -> Result<JobCounts, RepositoryError> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "SELECT status, COUNT(*) FROM job GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut counts = JobCounts::default();
        for (status, n) in rows {
            counts.add(JobStatus::try_from(status)?, n as usize);
        }
        Ok(counts)
    }

    /// Every stored row, oldest first.
    pub async fn rows(&self) -> Result<Vec<JobRow>, RepositoryError> {
        let rows = sqlx::query_as::<
            _,
            (String, Option<String>, i64, String, String, Vec<u8>, Option<Vec<u8>>),
        >(
            r#"
            SELECT id, parent_id, status, function_id, args_hash, args_encoding, result_encoding
            FROM job
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter()
            .map(
                |(id, parent_id, status, function_id, args_hash, args_encoding, result_encoding)|
                 -> Result<JobRow, RepositoryError> {
                    Ok(JobRow {
                        id: parse_id(&id)?,
                        parent_id: parent_id.as_deref().map(parse_id).transpose()?,
                        status: JobStatus::try_from(status)?,
                        function_id,
                        args_hash,
                        args_encoding,
                        result_encoding,
                    })
                },
            )
            .collect()
    }

    fn encode_result(&self, job: &Job) -> Result<Option<Vec<u8>>, RepositoryError> {
        match job.result() {
            Some(result) => Ok(Some(self.codec.encode(result)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, job: &mut Job) -> Result<(), RepositoryError> {
        let id = self.ids.generate_job_id();
        let result_encoding = self.encode_result(job)?;

        sqlx::query(
            r#"
            INSERT INTO job (id, parent_id, status, function_id, args_hash, args_encoding, result_encoding)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.as_ulid().to_string())
        .bind(job.parent().map(|p| p.as_ulid().to_string()))
        .bind(job.status().as_i64())
        .bind(job.function().as_str())
        .bind(job.args_hash().as_str())
        .bind(job.args_encoding())
        .bind(result_encoding)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let dangling =
                matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation());
            match job.parent() {
                Some(parent) if dangling => RepositoryError::UnknownParent(parent),
                _ => storage(e),
            }
        })?;

        job.assign_id(id)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        debug!(job = %job, id = %id, "inserted");
        Ok(())
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn get_or_create_job(
        &self,
        function: &TaskName,
        args: Value,
        parent: Option<JobId>,
    ) -> Result<Job, RepositoryError> {
        let canonical = self.codec.canonicalize(args)?;

        // `IS ?` matches NULL parents as well as concrete ids
        let candidates = sqlx::query_as::<_, (String, i64, Vec<u8>, Option<Vec<u8>>)>(
            r#"
            SELECT id, status, args_encoding, result_encoding
            FROM job
            WHERE function_id = ? AND args_hash = ? AND parent_id IS ?
            ORDER BY rowid
            "#,
        )
        .bind(function.as_str())
        .bind(canonical.hash.as_str())
        .bind(parent.map(|p| p.as_ulid().to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        for (id, status, args_encoding, result_encoding) in candidates {
            if self.codec.decode(&args_encoding)? != canonical.value {
                continue;
            }
            let id = parse_id(&id)?;
            let status = JobStatus::try_from(status)?;
            let result = result_encoding
                .map(|bytes| self.codec.decode(&bytes))
                .transpose()?;
            let job = Job::restore(id, function.clone(), canonical, parent, status, result);
            debug!(job = %job, id = %id, status = ?status, "loaded");
            return Ok(job);
        }

        let mut job = Job::pending(function.clone(), canonical, parent);
        self.insert(&mut job).await?;
        Ok(job)
    }

    async fn save(&self, job: &mut Job) -> Result<(), RepositoryError> {
        let Some(id) = job.id() else {
            return self.insert(job).await;
        };

        let result_encoding = self.encode_result(job)?;
        let updated = sqlx::query(
            r#"
            UPDATE job
            SET status = ?, result_encoding = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status().as_i64())
        .bind(result_encoding)
        .bind(id.as_ulid().to_string())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::UnknownJob(id));
        }
        debug!(job = %job, id = %id, status = ?job.status(), "updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::testing::CollidingCodec;
    use crate::ports::to_value;
    use rstest::rstest;
    use serde_json::json;

    async fn setup_repo() -> SqliteRepository {
        SqliteRepository::connect(&SqliteConfig::in_memory())
            .await
            .unwrap()
    }

    fn name(s: &str) -> TaskName {
        TaskName::new(s)
    }

    #[tokio::test]
    async fn root_lookup_matches_null_parent() {
        let repo = setup_repo().await;

        let first = repo
            .get_or_create_job(&name("double"), json!([5]), None)
            .await
            .unwrap();
        let second = repo
            .get_or_create_job(&name("double"), json!([5]), None)
            .await
            .unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(repo.rows().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn completed_job_round_trips_through_the_table() {
        let repo = setup_repo().await;

        let mut job = repo
            .get_or_create_job(&name("double"), json!([5]), None)
            .await
            .unwrap();
        job.complete(json!(10)).unwrap();
        repo.save(&mut job).await.unwrap();

        let loaded = repo
            .get_or_create_job(&name("double"), json!([5]), None)
            .await
            .unwrap();
        assert_eq!(loaded.id(), job.id());
        assert!(loaded.is_done());
        assert_eq!(loaded.result(), Some(&json!(10)));

        let rows = repo.rows().await.unwrap();
        assert_eq!(rows[0].status, JobStatus::Done);
        assert_eq!(rows[0].function_id, "double");
        assert_eq!(rows[0].parent_id, None);
        assert_eq!(rows[0].result_encoding.as_deref(), Some(&b"10"[..]));
    }

    #[tokio::test]
    async fn nested_job_records_parent_id() {
        let repo = setup_repo().await;
        let parent = repo
            .get_or_create_job(&name("p"), json!(null), None)
            .await
            .unwrap();
        let child = repo
            .get_or_create_job(&name("double"), json!([5]), parent.id())
            .await
            .unwrap();
        let root_twin = repo
            .get_or_create_job(&name("double"), json!([5]), None)
            .await
            .unwrap();

        assert_ne!(child.id(), root_twin.id());
        let rows = repo.rows().await.unwrap();
        let stored = rows.iter().find(|r| Some(r.id) == child.id()).unwrap();
        assert_eq!(stored.parent_id, parent.id());
    }

    #[tokio::test]
    async fn foreign_key_rejects_unknown_parent() {
        let repo = setup_repo().await;
        let ghost = UlidGenerator::new(SystemClock).generate_job_id();

        let err = repo
            .get_or_create_job(&name("double"), json!([5]), Some(ghost))
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::UnknownParent(id) if id == ghost));
    }

    #[tokio::test]
    async fn counts_by_status_groups_rows() {
        let repo = setup_repo().await;
        let mut done = repo
            .get_or_create_job(&name("a"), json!([1]), None)
            .await
            .unwrap();
        done.complete(json!(1)).unwrap();
        repo.save(&mut done).await.unwrap();
        repo.get_or_create_job(&name("a"), json!([2]), None)
            .await
            .unwrap();

        let counts = repo.counts_by_status().await.unwrap();
        assert_eq!(counts.done, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn hash_collisions_fall_back_to_decoded_args() {
        let repo = setup_repo().await.with_codec(Arc::new(CollidingCodec));

        let mut five = repo
            .get_or_create_job(&name("double"), json!([5]), None)
            .await
            .unwrap();
        five.complete(json!(10)).unwrap();
        repo.save(&mut five).await.unwrap();

        let six = repo
            .get_or_create_job(&name("double"), json!([6]), None)
            .await
            .unwrap();
        let five_again = repo
            .get_or_create_job(&name("double"), json!([5]), None)
            .await
            .unwrap();

        assert_eq!(five.args_hash(), six.args_hash());
        assert_ne!(six.id(), five.id());
        assert!(!six.is_done());
        assert_eq!(five_again.id(), five.id());
        assert_eq!(five_again.result(), Some(&json!(10)));

        let rows = repo.rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.args_hash == "0"));
    }

    #[tokio::test]
    async fn float_args_and_results_survive_the_table() {
        let repo = setup_repo().await;
        let x: f64 = 1.0715660391465826e-75;
        let args = to_value(&[x]).unwrap();

        let mut job = repo
            .get_or_create_job(&name("scale"), args.clone(), None)
            .await
            .unwrap();
        job.complete(to_value(&(x * 3.0)).unwrap()).unwrap();
        repo.save(&mut job).await.unwrap();

        let loaded = repo
            .get_or_create_job(&name("scale"), args, None)
            .await
            .unwrap();
        assert_eq!(loaded.id(), job.id());
        assert_eq!(
            loaded.result().and_then(Value::as_f64).map(f64::to_bits),
            Some((x * 3.0).to_bits())
        );
        assert_eq!(repo.rows().await.unwrap().len(), 1);
    }

    #[rstest]
    #[case("sqlite::memory:", 4, 1)]
    #[case("sqlite://file.db?mode=memory", 8, 1)]
    #[case("sqlite://rewind.db", 4, 4)]
    #[case("sqlite://rewind.db", 0, 1)]
    fn in_memory_urls_use_one_connection(
        #[case] url: &str,
        #[case] requested: u32,
        #[case] expected: u32,
    ) {
        let config = SqliteConfig {
            max_connections: requested,
            ..SqliteConfig::new(url)
        };
        assert_eq!(config.effective_max_connections(), expected);
    }

    #[tokio::test]
    async fn wide_in_memory_pool_still_sees_one_database() {
        let config = SqliteConfig {
            max_connections: 4,
            ..SqliteConfig::in_memory()
        };
        let repo = SqliteRepository::connect(&config).await.unwrap();
        assert_eq!(repo.pool().options().get_max_connections(), 1);

        let (name_a, name_b) = (name("a"), name("b"));
        let (a, b) = tokio::join!(
            repo.get_or_create_job(&name_a, json!([1]), None),
            repo.get_or_create_job(&name_b, json!([2]), None),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(repo.counts_by_status().await.unwrap().pending, 2);
    }
}
