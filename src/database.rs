use crate::prelude::*;
use crate::register::Registry;
use crate::sink::SnapshotSink;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::time::Duration;

pub const TABLE: &str = "sinamicv20";
pub const HISTORY_TABLE: &str = "sinamicv20_history";

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

/// SQLite store: one row per device, overwritten every cycle, plus an
/// optional append-only history of whole snapshots.
#[derive(Clone, Debug)]
pub struct Database {
    config: config::Database,
    registry: Arc<Registry>,
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database file and runs migrations.
    pub async fn open(config: config::Database, registry: Arc<Registry>) -> Result<Self> {
        info!("initializing database at {}", config.path);

        if let Some(parent) = config.path().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    file_error!("cannot create {}: {}", parent.display(), err)
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(config.path())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        sqlx::migrate!("db/migrations/sqlite").run(&pool).await?;

        Ok(Self {
            config,
            registry,
            pool,
        })
    }

    pub fn row_id(&self) -> i64 {
        self.config.row_id()
    }

    /// Replaces the latest-values row with `snapshot`; failed reads are
    /// stored as NULL. Appends to the history table when enabled.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let query = upsert_query(snapshot)?;

        let mut retry_count = 0;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match self.upsert(&query, snapshot).await {
                Ok(_) => break,
                Err(err) if retry_count + 1 < MAX_RETRIES => {
                    warn!("UPSERT failed: {:?} - retrying in {:?}", err, backoff);
                    tokio::time::sleep(backoff).await;
                    retry_count += 1;
                    backoff *= 2;
                }
                Err(err) => {
                    error!("Failed to store snapshot after {} attempts", MAX_RETRIES);
                    return Err(err);
                }
            }
        }

        if self.config.history() {
            self.append_history(snapshot).await?;
        }

        Ok(())
    }

    async fn upsert(&self, query: &str, snapshot: &Snapshot) -> Result<()> {
        let mut q = sqlx::query(query)
            .bind(self.config.row_id())
            .bind(snapshot.taken_at());
        for (_, value) in snapshot.iter() {
            q = q.bind(value);
        }
        q.persistent(true).execute(&self.pool).await?;
        Ok(())
    }

    async fn append_history(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        sqlx::query(&format!(
            "INSERT INTO {} (taken_at, snapshot) VALUES (?, ?)",
            HISTORY_TABLE
        ))
        .bind(snapshot.taken_at())
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stored value of one parameter. `Ok(None)` covers both "no row yet"
    /// and "last read failed"; a name outside the registry is an error.
    pub async fn latest_value(&self, name: &str) -> Result<Option<f64>> {
        let descriptor = self.registry.lookup_by_name(name)?;

        let value: Option<Option<f64>> = sqlx::query_scalar(&format!(
            "SELECT {} FROM {} WHERE id = ?",
            descriptor.name, TABLE
        ))
        .bind(self.config.row_id())
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.flatten())
    }

    /// The latest-values row as a snapshot in registry order, stamped with
    /// the time it was written.
    pub async fn fetch_latest(&self) -> Result<Option<Snapshot>> {
        let names: Vec<&'static str> = self.registry.iter().map(|d| d.name).collect();
        let query = format!(
            "SELECT updated_at, {} FROM {} WHERE id = ?",
            names.join(", "),
            TABLE
        );

        let row = sqlx::query(&query)
            .bind(self.config.row_id())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            values.push((name, row.try_get::<Option<f64>, _>(name)?));
        }

        Ok(Some(Snapshot::new(updated_at, values)))
    }

    pub async fn history_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", HISTORY_TABLE))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SnapshotSink for Database {
    fn name(&self) -> &str {
        "database"
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.save(snapshot).await
    }
}

/// Parameter names become column names, so only `[A-Za-z0-9_]` gets through.
fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("invalid column name {:?}", name);
    }
    Ok(())
}

fn upsert_query(snapshot: &Snapshot) -> Result<String> {
    let names: Vec<&str> = snapshot.names().collect();
    for name in &names {
        check_identifier(name)?;
    }

    let mut columns = vec!["id", "updated_at"];
    columns.extend(&names);

    let placeholders = vec!["?"; columns.len()].join(", ");
    let updates = std::iter::once("updated_at")
        .chain(names.iter().copied())
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        TABLE,
        columns.join(", "),
        placeholders,
        updates
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(check_identifier("SPEED").is_ok());
        assert!(check_identifier("DIGITAL_OUT_1").is_ok());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("1ABC").is_err());
        assert!(check_identifier("SPEED; DROP TABLE x").is_err());
    }

    #[test]
    fn upsert_lists_every_column() {
        let snapshot = Snapshot::new(Utc::now(), vec![("SPEED", Some(1.0)), ("FREQ_REF", None)]);
        let query = upsert_query(&snapshot).unwrap();
        assert_eq!(
            query,
            "INSERT INTO sinamicv20 (id, updated_at, SPEED, FREQ_REF) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at, \
             SPEED = excluded.SPEED, FREQ_REF = excluded.FREQ_REF"
        );
    }
}
