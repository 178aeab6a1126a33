//! Database Layer with Connection Pooling and Safe Transactions
//!
//! SQLite snapshot store for diagrams and agent contexts:
//! - Connection pooling via r2d2 for concurrent access
//! - Panic-safe transactions with automatic rollback
//! - Version tracking through `user_version`
//! - WAL mode for file-backed databases

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

use crate::agent::AgentContext;
use crate::c4::C4Diagram;
use crate::types::{ArchError, Result, ResultExt};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version
const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 2;
    const MAX_POOL_SIZE: u32 = 8;

    /// One connection per core, clamped
    pub fn auto() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        Self {
            max_size: cores.clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE),
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Everything loaded back from disk
#[derive(Debug, Default)]
pub struct PersistedState {
    pub diagrams: Vec<C4Diagram>,
    pub agents: Vec<AgentContext>,
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open (creating parent directories) and initialize the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(Self::configure_connection);
        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| ArchError::Storage(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        debug!(path = %path.display(), "Opened state database");
        Ok(db)
    }

    /// Open an in-memory database for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| ArchError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            ArchError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);
        if version > SCHEMA_VERSION {
            return Err(ArchError::Storage(format!(
                "State database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }

        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;
        Ok(())
    }

    /// Run `f` inside a transaction.
    ///
    /// If the closure panics, the transaction is rolled back and an error is
    /// returned instead of poisoning the connection pool.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + std::panic::UnwindSafe,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(ArchError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Replace all stored diagrams and agents with the given snapshot.
    pub fn replace_state(&self, diagrams: &[C4Diagram], agents: &[AgentContext]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let diagram_rows = diagrams
            .iter()
            .map(|d| -> Result<(String, String, String)> {
                Ok((d.id.to_string(), d.name.clone(), serde_json::to_string(d)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let agent_rows = agents
            .iter()
            .map(|a| -> Result<(String, String, String)> {
                Ok((a.id.to_string(), a.name.clone(), serde_json::to_string(a)?))
            })
            .collect::<Result<Vec<_>>>()?;

        self.transaction(move |conn| {
            conn.execute("DELETE FROM diagrams", [])
                .with_context("Failed to clear diagrams")?;
            conn.execute("DELETE FROM agents", [])
                .with_context("Failed to clear agents")?;

            for (id, name, body) in &diagram_rows {
                conn.execute(
                    "INSERT INTO diagrams (id, name, body, updated_at) VALUES (?1, ?2, ?3, ?4)",
                    params![id, name, body, now],
                )
                .with_context_fn(|| format!("Failed to store diagram {}", id))?;
            }
            for (id, name, body) in &agent_rows {
                conn.execute(
                    "INSERT INTO agents (id, name, body, updated_at) VALUES (?1, ?2, ?3, ?4)",
                    params![id, name, body, now],
                )
                .with_context_fn(|| format!("Failed to store agent {}", id))?;
            }
            Ok(())
        })?;

        info!(
            diagrams = diagrams.len(),
            agents = agents.len(),
            "Persisted state"
        );
        Ok(())
    }

    /// Store or overwrite one diagram.
    pub fn save_diagram(&self, diagram: &C4Diagram) -> Result<()> {
        let body = serde_json::to_string(diagram)?;
        self.conn()?
            .execute(
                "INSERT INTO diagrams (id, name, body, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, body = excluded.body,
                 updated_at = excluded.updated_at",
                params![
                    diagram.id.as_str(),
                    diagram.name,
                    body,
                    diagram.updated_at.to_rfc3339()
                ],
            )
            .with_context("Failed to store diagram")?;
        Ok(())
    }

    pub fn load_diagrams(&self) -> Result<Vec<C4Diagram>> {
        self.load_bodies("SELECT id, body FROM diagrams ORDER BY id")
    }

    pub fn load_agents(&self) -> Result<Vec<AgentContext>> {
        self.load_bodies("SELECT id, body FROM agents ORDER BY id")
    }

    pub fn load_state(&self) -> Result<PersistedState> {
        Ok(PersistedState {
            diagrams: self.load_diagrams()?,
            agents: self.load_agents()?,
        })
    }

    /// Rows whose body no longer deserializes are skipped with a warning.
    fn load_bodies<T: serde::de::DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).with_context("Failed to prepare query")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .with_context("Failed to query state")?;

        let mut items = Vec::new();
        for row in rows {
            let (id, body) = row.with_context("Failed to read row")?;
            match serde_json::from_str(&body) {
                Ok(item) => items.push(item),
                Err(e) => warn!(id = %id, error = %e, "Skipping unreadable stored record"),
            }
        }
        Ok(items)
    }

    pub fn counts(&self) -> Result<(usize, usize)> {
        let conn = self.conn()?;
        let diagrams: i64 = conn
            .query_row("SELECT COUNT(*) FROM diagrams", [], |row| row.get(0))
            .with_context("Failed to count diagrams")?;
        let agents: i64 = conn
            .query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))
            .with_context("Failed to count agents")?;
        Ok((diagrams as usize, agents as usize))
    }
}
