use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

/// A persisted tracking record, as loaded at startup.
#[derive(Debug, Clone)]
pub struct TrackedChannel {
    pub channel_id: u64,
    pub guild_id: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// SQLite persistence for channel tracking and long-term channel facts.
///
/// The connection is shared behind a mutex; async callers go through
/// `run_blocking` so rusqlite work never blocks the runtime.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let sql = "
            CREATE TABLE IF NOT EXISTS channel_tracking (
                channel_id TEXT PRIMARY KEY,
                guild_id TEXT NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                enabled_by TEXT,
                enabled_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                last_activity DATETIME
            );
            CREATE INDEX IF NOT EXISTS idx_tracking_guild ON channel_tracking (guild_id);

            CREATE TABLE IF NOT EXISTS channel_facts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id TEXT NOT NULL,
                fact TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_facts_channel ON channel_facts (channel_id);
        ";
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(sql)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Runs a blocking database closure on the blocking thread pool.
    pub async fn run_blocking<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(db)).await?
    }

    pub fn get_tracked_channels(&self) -> anyhow::Result<Vec<TrackedChannel>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT channel_id, guild_id, last_activity FROM channel_tracking WHERE enabled = TRUE",
        )?;

        let rows = stmt.query_map([], |row| {
            let channel_id: String = row.get(0)?;
            let guild_id: String = row.get(1)?;
            let last_activity: Option<String> = row.get(2)?;
            Ok((channel_id, guild_id, last_activity))
        })?;

        let mut channels = Vec::new();
        for row in rows {
            let (channel_id, guild_id, last_activity) = row?;
            // Rows with unparseable ids are skipped rather than failing the load.
            let (Ok(channel_id), Ok(guild_id)) = (channel_id.parse(), guild_id.parse()) else {
                debug!("Database: skipping tracking row with malformed ids");
                continue;
            };
            channels.push(TrackedChannel {
                channel_id,
                guild_id,
                last_activity: last_activity.as_deref().and_then(parse_sqlite_utc),
            });
        }
        Ok(channels)
    }

    pub fn enable_channel_tracking(
        &self,
        channel_id: u64,
        guild_id: u64,
        enabled_by: u64,
    ) -> anyhow::Result<bool> {
        debug!(
            "Database: Enabling tracking for channel {} in guild {}",
            channel_id, guild_id
        );
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT INTO channel_tracking (channel_id, guild_id, enabled_by, enabled)
             VALUES (?1, ?2, ?3, TRUE)
             ON CONFLICT(channel_id) DO UPDATE SET
                 enabled = TRUE,
                 guild_id = excluded.guild_id,
                 enabled_by = excluded.enabled_by",
            (
                channel_id.to_string(),
                guild_id.to_string(),
                enabled_by.to_string(),
            ),
        )?;
        Ok(changed > 0)
    }

    /// Marks a channel as no longer tracked. The row is kept for history.
    pub fn disable_channel_tracking(&self, channel_id: u64) -> anyhow::Result<bool> {
        debug!("Database: Disabling tracking for channel {}", channel_id);
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE channel_tracking SET enabled = FALSE WHERE channel_id = ?1",
            [channel_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    pub fn update_channel_activity(&self, channel_id: u64) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE channel_tracking SET last_activity = datetime('now') WHERE channel_id = ?1",
            [channel_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    pub fn add_channel_fact(&self, channel_id: u64, fact: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO channel_facts (channel_id, fact) VALUES (?1, ?2)",
            (channel_id.to_string(), fact),
        )?;
        Ok(())
    }

    pub fn get_channel_facts(&self, channel_id: u64) -> anyhow::Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT fact FROM channel_facts WHERE channel_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([channel_id.to_string()], |row| row.get(0))?;
        let mut facts = Vec::new();
        for row in rows {
            facts.push(row?);
        }
        Ok(facts)
    }
}

fn parse_sqlite_utc(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Long-term knowledge about a channel, rendered verbatim into context.
#[async_trait]
pub trait FactStore: Send + Sync {
    async fn is_enabled(&self) -> bool;
    async fn facts_for_channel(&self, channel_id: u64) -> anyhow::Result<Vec<String>>;
}

/// Fact store backed by the `channel_facts` table. How facts get written
/// there is someone else's job; this only reads.
pub struct SqliteFactStore {
    db: Database,
    enabled: bool,
}

impl SqliteFactStore {
    pub fn new(db: Database, enabled: bool) -> Self {
        Self { db, enabled }
    }
}

#[async_trait]
impl FactStore for SqliteFactStore {
    async fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn facts_for_channel(&self, channel_id: u64) -> anyhow::Result<Vec<String>> {
        self.db
            .run_blocking(move |db| db.get_channel_facts(channel_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.execute_init().unwrap();
        db
    }

    #[test]
    fn test_tracking_round_trip() {
        let db = test_db();

        assert!(db.enable_channel_tracking(100, 1, 42).unwrap());
        let tracked = db.get_tracked_channels().unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].channel_id, 100);
        assert_eq!(tracked[0].guild_id, 1);
        assert!(tracked[0].last_activity.is_none());

        assert!(db.disable_channel_tracking(100).unwrap());
        assert!(db.get_tracked_channels().unwrap().is_empty());

        // Re-enable keeps working against the retained row
        assert!(db.enable_channel_tracking(100, 1, 42).unwrap());
        assert_eq!(db.get_tracked_channels().unwrap().len(), 1);
    }

    #[test]
    fn test_activity_update() {
        let db = test_db();
        // Unknown channel: nothing to update
        assert!(!db.update_channel_activity(100).unwrap());

        db.enable_channel_tracking(100, 1, 42).unwrap();
        assert!(db.update_channel_activity(100).unwrap());
        let tracked = db.get_tracked_channels().unwrap();
        assert!(tracked[0].last_activity.is_some());
    }

    #[test]
    fn test_channel_facts() {
        let db = test_db();
        db.add_channel_fact(100, "This channel discusses homelab setups")
            .unwrap();
        db.add_channel_fact(100, "Weekly sync happens on Mondays")
            .unwrap();
        db.add_channel_fact(200, "Unrelated").unwrap();

        let facts = db.get_channel_facts(100).unwrap();
        assert_eq!(
            facts,
            vec![
                "This channel discusses homelab setups",
                "Weekly sync happens on Mondays"
            ]
        );
    }

    #[tokio::test]
    async fn test_fact_store_trait() {
        let db = test_db();
        db.add_channel_fact(100, "Fact one").unwrap();

        let store = SqliteFactStore::new(db, true);
        assert!(store.is_enabled().await);
        assert_eq!(store.facts_for_channel(100).await.unwrap(), vec!["Fact one"]);
        assert!(store.facts_for_channel(999).await.unwrap().is_empty());
    }
}
