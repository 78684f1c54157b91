//! Artifacts written by one service are served to the next one.

use std::path::Path;
use std::sync::Arc;

use ludics_engine::{AnalysisService, EngineLimits, SqliteStore};
use ludics_types::Polarity;

use crate::common::raw;

fn service_at(path: &Path) -> AnalysisService {
    let store = SqliteStore::open(path).expect("open store");
    AnalysisService::new(Arc::new(store), EngineLimits::default())
}

#[tokio::test]
async fn reopened_store_serves_designs_and_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("artifacts.db");

    let first = service_at(&path);
    let design = first
        .compile(
            "p",
            vec![
                raw(Polarity::Positive, "0", &[1]),
                raw(Polarity::Negative, "0.1", &[]),
            ],
        )
        .expect("valid design");
    let metrics = first.metrics(design.id()).await.expect("metrics");
    assert_eq!(first.computations(), 1);
    drop(first);

    let second = service_at(&path);
    let stored = second.design(design.id()).expect("stored design");
    assert_eq!(stored.id(), design.id());
    assert_eq!(stored.actions().len(), 2);
    assert!(second.strategy_of(design.id()).is_ok());

    let again = second.metrics(design.id()).await.expect("metrics");
    assert_eq!(again, metrics);
    assert_eq!(second.computations(), 0);

    // A different analysis of the same design still has to run.
    second.views(design.id()).await.expect("views");
    assert_eq!(second.computations(), 1);
}
