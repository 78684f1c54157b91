//! Persistence for designs, strategies and derived artifacts.
//!
//! Designs and strategies are immutable and content-addressed, so a record
//! never changes once written. Artifacts carry the hash of the inputs they
//! were computed from; a record whose hash no longer matches is ignored by
//! readers.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use ludics_core::Strategy;
use ludics_types::{Design, DesignId, StrategyId, hash_json};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failed: {0}")]
    Backend(String),
    #[error("stored record {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact parameters cannot be encoded: {0}")]
    Encoding(#[source] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Backend(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Dispute,
    Views,
    Chronicles,
    Innocence,
    Propagation,
    Correspondence,
    Orthogonality,
    Closure,
    Behaviour,
    TypeInference,
    TypeCheck,
    Incarnation,
    Metrics,
}

impl ArtifactKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dispute => "dispute",
            Self::Views => "views",
            Self::Chronicles => "chronicles",
            Self::Innocence => "innocence",
            Self::Propagation => "propagation",
            Self::Correspondence => "correspondence",
            Self::Orthogonality => "orthogonality",
            Self::Closure => "closure",
            Self::Behaviour => "behaviour",
            Self::TypeInference => "type_inference",
            Self::TypeCheck => "type_check",
            Self::Incarnation => "incarnation",
            Self::Metrics => "metrics",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(subject, kind, params_hash)`. The subject is a design id, a strategy
/// id, or a composite of several joined with `|`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub subject: String,
    pub kind: ArtifactKind,
    pub params_hash: String,
}

impl ArtifactKey {
    pub fn new<P: Serialize + ?Sized>(
        subject: impl Into<String>,
        kind: ArtifactKind,
        params: &P,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            subject: subject.into(),
            kind,
            params_hash: hash_json(params).map_err(StoreError::Encoding)?,
        })
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self.subject.get(..12).unwrap_or(&self.subject);
        let params = self.params_hash.get(..8).unwrap_or(&self.params_hash);
        write!(f, "{}:{subject}:{params}", self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub input_hash: String,
    pub value: serde_json::Value,
    /// RFC 3339.
    pub created_at: String,
}

impl ArtifactRecord {
    #[must_use]
    pub fn new(input_hash: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            input_hash: input_hash.into(),
            value,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub trait ArtifactStore: Send + Sync {
    fn put_design(&self, design: &Design) -> Result<(), StoreError>;
    fn get_design(&self, id: &DesignId) -> Result<Option<Design>, StoreError>;
    fn put_strategy(&self, strategy: &Strategy) -> Result<(), StoreError>;
    fn get_strategy(&self, id: &StrategyId) -> Result<Option<Strategy>, StoreError>;
    /// Every stored strategy, ordered by id.
    fn list_strategies(&self) -> Result<Vec<Strategy>, StoreError>;
    fn get_artifact(&self, key: &ArtifactKey) -> Result<Option<ArtifactRecord>, StoreError>;
    fn put_artifact(&self, key: &ArtifactKey, record: &ArtifactRecord) -> Result<(), StoreError>;
}

// ── In-memory ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    designs: RwLock<HashMap<DesignId, Design>>,
    strategies: RwLock<HashMap<StrategyId, Strategy>>,
    artifacts: RwLock<HashMap<ArtifactKey, ArtifactRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.artifacts.read().map_or(0, |map| map.len())
    }
}

impl ArtifactStore for MemoryStore {
    fn put_design(&self, design: &Design) -> Result<(), StoreError> {
        let mut designs = self.designs.write().map_err(|_| StoreError::Poisoned)?;
        designs
            .entry(design.id().clone())
            .or_insert_with(|| design.clone());
        Ok(())
    }

    fn get_design(&self, id: &DesignId) -> Result<Option<Design>, StoreError> {
        let designs = self.designs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(designs.get(id).cloned())
    }

    fn put_strategy(&self, strategy: &Strategy) -> Result<(), StoreError> {
        let mut strategies = self.strategies.write().map_err(|_| StoreError::Poisoned)?;
        strategies
            .entry(strategy.id.clone())
            .or_insert_with(|| strategy.clone());
        Ok(())
    }

    fn get_strategy(&self, id: &StrategyId) -> Result<Option<Strategy>, StoreError> {
        let strategies = self.strategies.read().map_err(|_| StoreError::Poisoned)?;
        Ok(strategies.get(id).cloned())
    }

    fn list_strategies(&self) -> Result<Vec<Strategy>, StoreError> {
        let strategies = self.strategies.read().map_err(|_| StoreError::Poisoned)?;
        let mut all: Vec<Strategy> = strategies.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn get_artifact(&self, key: &ArtifactKey) -> Result<Option<ArtifactRecord>, StoreError> {
        let artifacts = self.artifacts.read().map_err(|_| StoreError::Poisoned)?;
        Ok(artifacts.get(key).cloned())
    }

    fn put_artifact(&self, key: &ArtifactKey, record: &ArtifactRecord) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.write().map_err(|_| StoreError::Poisoned)?;
        artifacts.insert(key.clone(), record.clone());
        Ok(())
    }
}
