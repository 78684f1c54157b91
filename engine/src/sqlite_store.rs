//! SQLite-backed [`ArtifactStore`].

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ludics_core::Strategy;
use ludics_types::{Design, DesignId, StrategyId};
use rusqlite::{Connection, OptionalExtension, params};

use crate::store::{ArtifactKey, ArtifactRecord, ArtifactStore, StoreError};

pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS designs (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            record TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS strategies (
            id TEXT PRIMARY KEY,
            design_id TEXT,
            record TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS artifacts (
            subject TEXT NOT NULL,
            kind TEXT NOT NULL,
            params_hash TEXT NOT NULL,
            input_hash TEXT NOT NULL,
            value TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (subject, kind, params_hash)
        );

        CREATE INDEX IF NOT EXISTS idx_strategies_design
        ON strategies(design_id);
    ";

    /// Open or create the store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let db = Connection::open(path)
            .with_context(|| format!("Failed to open artifact store at {}", path.display()))?;
        Self::initialize(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory artifact store")?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set artifact store pragmas")?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create artifact store schema")?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn with_db<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T, StoreError> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(&db).map_err(StoreError::from)
    }
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, text: &str) -> Result<T, StoreError> {
    serde_json::from_str(text).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

fn encode<T: serde::Serialize>(key: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl ArtifactStore for SqliteStore {
    fn put_design(&self, design: &Design) -> Result<(), StoreError> {
        let record = encode(design.id().as_str(), design)?;
        self.with_db(|db| {
            db.execute(
                "INSERT OR IGNORE INTO designs (id, owner, record, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![design.id().as_str(), design.owner(), record, now()],
            )
            .context("Failed to insert design")?;
            Ok(())
        })
    }

    fn get_design(&self, id: &DesignId) -> Result<Option<Design>, StoreError> {
        let record: Option<String> = self.with_db(|db| {
            db.query_row(
                "SELECT record FROM designs WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query design")
        })?;
        record.map(|text| decode(id.as_str(), &text)).transpose()
    }

    fn put_strategy(&self, strategy: &Strategy) -> Result<(), StoreError> {
        let record = encode(strategy.id.as_str(), strategy)?;
        let design_id = strategy.design_id.as_ref().map(DesignId::as_str);
        self.with_db(|db| {
            db.execute(
                "INSERT OR IGNORE INTO strategies (id, design_id, record, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![strategy.id.as_str(), design_id, record, now()],
            )
            .context("Failed to insert strategy")?;
            Ok(())
        })
    }

    fn get_strategy(&self, id: &StrategyId) -> Result<Option<Strategy>, StoreError> {
        let record: Option<String> = self.with_db(|db| {
            db.query_row(
                "SELECT record FROM strategies WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query strategy")
        })?;
        record.map(|text| decode(id.as_str(), &text)).transpose()
    }

    fn list_strategies(&self) -> Result<Vec<Strategy>, StoreError> {
        let rows: Vec<(String, String)> = self.with_db(|db| {
            let mut stmt = db
                .prepare("SELECT id, record FROM strategies ORDER BY id ASC")
                .context("Failed to prepare strategy listing")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .context("Failed to list strategies")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to read strategy row")?;
            Ok(rows)
        })?;
        rows.iter().map(|(id, text)| decode(id, text)).collect()
    }

    fn get_artifact(&self, key: &ArtifactKey) -> Result<Option<ArtifactRecord>, StoreError> {
        let row: Option<(String, String, String)> = self.with_db(|db| {
            db.query_row(
                "SELECT input_hash, value, created_at FROM artifacts
                 WHERE subject = ?1 AND kind = ?2 AND params_hash = ?3",
                params![key.subject, key.kind.as_str(), key.params_hash],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("Failed to query artifact")
        })?;
        let Some((input_hash, value, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(ArtifactRecord {
            input_hash,
            value: decode(&key.to_string(), &value)?,
            created_at,
        }))
    }

    fn put_artifact(&self, key: &ArtifactKey, record: &ArtifactRecord) -> Result<(), StoreError> {
        let value = encode(&key.to_string(), &record.value)?;
        self.with_db(|db| {
            db.execute(
                "INSERT OR REPLACE INTO artifacts
                 (subject, kind, params_hash, input_hash, value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    key.subject,
                    key.kind.as_str(),
                    key.params_hash,
                    record.input_hash,
                    value,
                    record.created_at
                ],
            )
            .with_context(|| format!("Failed to write artifact {key}"))?;
            Ok(())
        })
    }
}
