//! Cached, concurrent access to the Ludics analyses.
//!
//! [`AnalysisService`] exposes every operation of the request/response
//! contract. Results are pure functions of content-addressed inputs, so
//! they are memoized in a single-flight cache and, optionally, persisted in
//! an [`ArtifactStore`]. The [`protocol`] module maps JSON batches onto the
//! service.

mod cache;
mod config;
mod error;
pub mod protocol;
mod service;
mod sqlite_store;
mod store;

pub use cache::SingleFlight;
pub use config::{
    CacheConfig, ConfigError, EngineConfig, EngineLimits, LudicsConfig, config_path,
    expand_env_vars,
};
pub use error::EngineError;
pub use protocol::{Batch, BatchOutput, Request, Response, run_batch};
pub use service::AnalysisService;
pub use sqlite_store::SqliteStore;
pub use store::{
    ArtifactKey, ArtifactKind, ArtifactRecord, ArtifactStore, MemoryStore, StoreError,
};
