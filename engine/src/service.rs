//! The analysis service: every engine operation behind one async facade,
//! with derived artifacts memoized per content hash.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;
use ludics_core::completion::{CompletionStats, DesignMetrics, complete_design, design_metrics};
use ludics_core::typesys::{
    CheckMethod, IncarnationMode, IncarnationReport, InferenceMethod, TypeExpr, TypeInference,
    TypeJudgment, TypeParseError, check, check_incarnation, infer,
};
use ludics_core::{
    Behaviour, BehaviourInclusion, BehaviourSpace, BehaviourValidation, ClosureLimits,
    ClosureReport, CorrespondenceReport, DesignRegistry, Dispute, InnocenceReport,
    OrthogonalityReport, PropagationReport, Strategy, check_innocence, check_propagation,
    extract_chronicles, extract_views, interact, strategies_orthogonal, verify_correspondence,
};
use ludics_types::{Address, Chronicle, Design, DesignId, RawAction, StrategyId, View, hash_json};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::SingleFlight;
use crate::config::{EngineLimits, LudicsConfig};
use crate::error::EngineError;
use crate::sqlite_store::SqliteStore;
use crate::store::{ArtifactKey, ArtifactKind, ArtifactRecord, ArtifactStore, MemoryStore, StoreError};

type FlightKey = (ArtifactKey, String);

pub struct AnalysisService {
    store: Arc<dyn ArtifactStore>,
    limits: EngineLimits,
    caching: bool,
    artifacts: SingleFlight<FlightKey, serde_json::Value>,
    computations: AtomicUsize,
}

impl AnalysisService {
    pub fn new(store: Arc<dyn ArtifactStore>, limits: EngineLimits) -> Self {
        Self {
            store,
            limits,
            caching: true,
            artifacts: SingleFlight::new(),
            computations: AtomicUsize::new(0),
        }
    }

    /// Default limits over a fresh [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), EngineLimits::default())
    }

    /// Build from configuration. An SQLite store that cannot be opened is
    /// replaced by an in-memory one.
    #[must_use]
    pub fn from_config(config: &LudicsConfig) -> Self {
        let cache = config.cache();
        let store: Arc<dyn ArtifactStore> = match cache.resolved_sqlite_path() {
            Some(path) if cache.enabled => match SqliteStore::open(&path) {
                Ok(store) => {
                    tracing::debug!(path = %path.display(), "artifact store opened");
                    Arc::new(store)
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "Failed to open artifact store, using memory: {err:#}");
                    Arc::new(MemoryStore::new())
                }
            },
            _ => Arc::new(MemoryStore::new()),
        };
        Self::new(store, config.limits()).with_caching(cache.enabled)
    }

    /// With caching off every call recomputes and nothing is persisted
    /// except designs and strategies.
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching = enabled;
        self
    }

    #[must_use]
    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    /// Analyses actually run (cache misses).
    #[must_use]
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    // ── Designs and strategies ───────────────────────────────

    /// Compile and register a design together with its strategy.
    pub fn compile(
        &self,
        owner: impl Into<String>,
        acts: Vec<RawAction>,
    ) -> Result<Design, EngineError> {
        let design = Design::compile_raw(owner, acts)?;
        self.register(&design)?;
        Ok(design)
    }

    pub fn register(&self, design: &Design) -> Result<Strategy, EngineError> {
        let strategy = Strategy::from_design(design);
        self.store.put_design(design)?;
        self.store.put_strategy(&strategy)?;
        tracing::debug!(
            design = design.id().short(),
            strategy = strategy.id.short(),
            "design registered"
        );
        Ok(strategy)
    }

    pub fn design(&self, id: &DesignId) -> Result<Design, EngineError> {
        self.store
            .get_design(id)?
            .ok_or_else(|| EngineError::UnknownDesign(id.clone()))
    }

    pub fn strategy(&self, id: &StrategyId) -> Result<Strategy, EngineError> {
        self.store
            .get_strategy(id)?
            .ok_or_else(|| EngineError::UnknownStrategy(id.clone()))
    }

    /// The strategy induced by a registered design.
    pub fn strategy_of(&self, design: &DesignId) -> Result<Strategy, EngineError> {
        Ok(Strategy::from_design(&self.design(design)?))
    }

    // ── Interaction ──────────────────────────────────────────

    /// `fuel` defaults to the configured limit.
    pub async fn normalize(
        &self,
        positive: &DesignId,
        negative: &DesignId,
        fuel: Option<u32>,
        virtual_neg_foci: &[Address],
    ) -> Result<Dispute, EngineError> {
        let pos = self.design(positive)?;
        let neg = self.design(negative)?;
        let fuel = fuel.unwrap_or(self.limits.default_fuel);
        let foci = virtual_neg_foci.to_vec();
        let key = ArtifactKey::new(
            format!("{positive}|{negative}"),
            ArtifactKind::Dispute,
            &(fuel, &foci),
        )?;
        self.cached(key, input_hash(&(positive, negative))?, move || {
            Ok(interact(&pos, &neg, fuel, &foci)?)
        })
        .await
    }

    // ── Views, chronicles, strategies ────────────────────────

    pub async fn views(&self, design: &DesignId) -> Result<Vec<View>, EngineError> {
        let d = self.design(design)?;
        self.design_artifact(design, ArtifactKind::Views, &(), move || {
            Ok(extract_views(&d))
        })
        .await
    }

    pub async fn chronicles(&self, design: &DesignId) -> Result<Vec<Chronicle>, EngineError> {
        let d = self.design(design)?;
        self.design_artifact(design, ArtifactKind::Chronicles, &(), move || {
            Ok(extract_chronicles(&d))
        })
        .await
    }

    pub async fn innocence(&self, design: &DesignId) -> Result<InnocenceReport, EngineError> {
        let d = self.design(design)?;
        self.design_artifact(design, ArtifactKind::Innocence, &(), move || {
            Ok(check_innocence(&Strategy::from_design(&d)))
        })
        .await
    }

    pub async fn propagation(&self, design: &DesignId) -> Result<PropagationReport, EngineError> {
        let d = self.design(design)?;
        self.design_artifact(design, ArtifactKind::Propagation, &(), move || {
            Ok(check_propagation(&extract_views(&d)))
        })
        .await
    }

    /// Check a design against a strategy; without one, against its own.
    pub async fn correspondence(
        &self,
        design: &DesignId,
        strategy: Option<&StrategyId>,
    ) -> Result<CorrespondenceReport, EngineError> {
        let d = self.design(design)?;
        let s = match strategy {
            Some(id) => self.strategy(id)?,
            None => Strategy::from_design(&d),
        };
        let max_plays = self.limits.max_plays;
        let key = ArtifactKey::new(
            format!("{design}|{}", s.id),
            ArtifactKind::Correspondence,
            &max_plays,
        )?;
        self.cached(key, input_hash(&(design, &s.id))?, move || {
            Ok(verify_correspondence(&d, &s, max_plays))
        })
        .await
    }

    // ── Behaviours ───────────────────────────────────────────

    /// Strategies lifted from registered designs are checked through those
    /// designs rather than through their views.
    pub async fn orthogonality(
        &self,
        a: &StrategyId,
        b: &StrategyId,
    ) -> Result<OrthogonalityReport, EngineError> {
        let s = self.strategy(a)?;
        let t = self.strategy(b)?;
        let registry = self.registry_for([&s, &t])?;
        let fuel = self.limits.default_fuel;
        let max_counter_examples = self.limits.max_counter_examples;
        let key = ArtifactKey::new(
            format!("{a}|{b}"),
            ArtifactKind::Orthogonality,
            &(fuel, max_counter_examples),
        )?;
        self.cached(key, input_hash(&(a, b))?, move || {
            Ok(strategies_orthogonal(
                &s,
                &t,
                &registry,
                fuel,
                max_counter_examples,
            ))
        })
        .await
    }

    /// Several orthogonality checks at once; results keep the input order.
    pub async fn orthogonality_batch(
        &self,
        pairs: &[(StrategyId, StrategyId)],
    ) -> Vec<Result<OrthogonalityReport, EngineError>> {
        join_all(pairs.iter().map(|(a, b)| self.orthogonality(a, b))).await
    }

    /// `S⊥⊥` over every strategy the store knows, seeds included.
    pub async fn closure(&self, seeds: &[StrategyId]) -> Result<ClosureReport, EngineError> {
        let ids = seeds.to_vec();
        self.over_catalogue(ArtifactKind::Closure, "closure", &[seeds], move |space| {
            space.closure(&ids)
        })
        .await
    }

    pub async fn behaviour(&self, generators: &[StrategyId]) -> Result<Behaviour, EngineError> {
        let ids = generators.to_vec();
        self.over_catalogue(ArtifactKind::Behaviour, "behaviour", &[generators], move |space| {
            space.behaviour(&ids)
        })
        .await
    }

    pub async fn is_behaviour(&self, strategies: &[StrategyId]) -> Result<bool, EngineError> {
        let ids = strategies.to_vec();
        self.over_catalogue(ArtifactKind::Behaviour, "is_behaviour", &[strategies], move |space| {
            space.is_behaviour(&ids)
        })
        .await
    }

    /// Treat `members` as a claimed behaviour and recompute its closure.
    pub async fn validate_behaviour(
        &self,
        members: &[StrategyId],
    ) -> Result<BehaviourValidation, EngineError> {
        let mut ids = members.to_vec();
        ids.sort();
        ids.dedup();
        let claimed = Behaviour {
            generators: ids.clone(),
            members: ids,
            converged: true,
        };
        self.over_catalogue(ArtifactKind::Behaviour, "validate", &[members], move |space| {
            space.validate(&claimed)
        })
        .await
    }

    /// `B₁ ∩ B₂` for the behaviours generated by `a` and by `b`.
    pub async fn intersect_behaviours(
        &self,
        a: &[StrategyId],
        b: &[StrategyId],
    ) -> Result<Behaviour, EngineError> {
        let (left, right) = (a.to_vec(), b.to_vec());
        self.over_catalogue(ArtifactKind::Behaviour, "intersect", &[a, b], move |space| {
            let left = space.behaviour(&left);
            let right = space.behaviour(&right);
            space.intersect(&left, &right)
        })
        .await
    }

    /// Inclusion between the behaviours generated by `a` and by `b`.
    pub async fn compare_behaviours(
        &self,
        a: &[StrategyId],
        b: &[StrategyId],
    ) -> Result<BehaviourInclusion, EngineError> {
        let (left, right) = (a.to_vec(), b.to_vec());
        self.over_catalogue(ArtifactKind::Behaviour, "compare", &[a, b], move |space| {
            let left = space.behaviour(&left);
            let right = space.behaviour(&right);
            BehaviourInclusion::between(&left, &right)
        })
        .await
    }

    /// The behaviour generated by `B⊥`, for `B` generated by `generators`.
    pub async fn behaviour_complement(
        &self,
        generators: &[StrategyId],
    ) -> Result<Behaviour, EngineError> {
        let ids = generators.to_vec();
        self.over_catalogue(ArtifactKind::Behaviour, "complement", &[generators], move |space| {
            let behaviour = space.behaviour(&ids);
            space.complement(&behaviour)
        })
        .await
    }

    fn closure_limits(&self) -> ClosureLimits {
        ClosureLimits {
            fuel: self.limits.default_fuel,
            max_iterations: self.limits.max_closure_iterations,
        }
    }

    /// Registered designs behind the given strategies.
    fn registry_for<'a>(
        &self,
        strategies: impl IntoIterator<Item = &'a Strategy>,
    ) -> Result<DesignRegistry, EngineError> {
        let mut registry = DesignRegistry::new();
        for id in strategies.into_iter().filter_map(|s| s.design_id.as_ref()) {
            if let Some(design) = self.store.get_design(id)? {
                registry.insert(design);
            }
        }
        Ok(registry)
    }

    /// Run `compute` over a space holding every stored strategy. The key
    /// covers each group of ids as a set; the input hash covers the
    /// catalogue, so registering a strategy invalidates stored results.
    async fn over_catalogue<T, F>(
        &self,
        kind: ArtifactKind,
        op: &'static str,
        groups: &[&[StrategyId]],
        compute: F,
    ) -> Result<T, EngineError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(&mut BehaviourSpace) -> T + Send + 'static,
    {
        for id in groups.iter().flat_map(|ids| ids.iter()) {
            self.strategy(id)?;
        }
        let catalogue = self.store.list_strategies()?;
        let registry = self.registry_for(&catalogue)?;
        let mut catalogue_ids: Vec<&StrategyId> = catalogue.iter().map(|s| &s.id).collect();
        catalogue_ids.sort();
        let hash = input_hash(&catalogue_ids)?;

        let subject = groups
            .iter()
            .map(|ids| {
                let mut sorted: Vec<&str> = ids.iter().map(StrategyId::as_str).collect();
                sorted.sort_unstable();
                sorted.dedup();
                sorted.join("|")
            })
            .collect::<Vec<_>>()
            .join("/");
        let limits = self.closure_limits();
        let key = ArtifactKey::new(subject, kind, &(op, limits.fuel, limits.max_iterations))?;

        self.cached(key, hash, move || {
            let mut space = BehaviourSpace::new(catalogue, registry, limits);
            Ok(compute(&mut space))
        })
        .await
    }

    // ── Types ────────────────────────────────────────────────

    pub async fn type_infer(
        &self,
        design: &DesignId,
        method: InferenceMethod,
    ) -> Result<TypeInference, EngineError> {
        let d = self.design(design)?;
        self.design_artifact(design, ArtifactKind::TypeInference, &method, move || {
            Ok(infer(&d, method))
        })
        .await
    }

    pub async fn type_check(
        &self,
        design: &DesignId,
        target: &str,
        method: CheckMethod,
    ) -> Result<TypeJudgment, EngineError> {
        let target: TypeExpr = target
            .parse()
            .map_err(|err: TypeParseError| EngineError::InvalidType(err.to_string()))?;
        let d = self.design(design)?;
        let params = (target.to_string(), method);
        self.design_artifact(design, ArtifactKind::TypeCheck, &params, move || {
            Ok(check(&d, &target, method))
        })
        .await
    }

    pub async fn incarnation(
        &self,
        source: &DesignId,
        target: &DesignId,
        mode: IncarnationMode,
    ) -> Result<IncarnationReport, EngineError> {
        let s = self.design(source)?;
        let t = self.design(target)?;
        let key = ArtifactKey::new(
            format!("{source}|{target}"),
            ArtifactKind::Incarnation,
            &mode,
        )?;
        self.cached(key, input_hash(&(source, target))?, move || {
            Ok(check_incarnation(&s, &t, mode))
        })
        .await
    }

    // ── Completion and metrics ───────────────────────────────

    /// Complete a design with daimons and register the result.
    pub async fn complete(
        &self,
        design: &DesignId,
    ) -> Result<(Design, CompletionStats), EngineError> {
        let d = self.design(design)?;
        let (completed, stats) = run_blocking(move || Ok(complete_design(&d)?)).await?;
        if !stats.was_already_complete {
            self.register(&completed)?;
        }
        Ok((completed, stats))
    }

    pub async fn metrics(&self, design: &DesignId) -> Result<DesignMetrics, EngineError> {
        let d = self.design(design)?;
        self.design_artifact(design, ArtifactKind::Metrics, &(), move || {
            Ok(design_metrics(&d))
        })
        .await
    }

    // ── Cache plumbing ───────────────────────────────────────

    async fn design_artifact<T, P, F>(
        &self,
        design: &DesignId,
        kind: ArtifactKind,
        params: &P,
        compute: F,
    ) -> Result<T, EngineError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        P: Serialize + ?Sized,
        F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    {
        let key = ArtifactKey::new(design.as_str(), kind, params)?;
        self.cached(key, design.to_string(), compute).await
    }

    /// Memoized computation: in-process single flight first, then the
    /// store, then the computation itself on the blocking pool.
    async fn cached<T, F>(
        &self,
        key: ArtifactKey,
        input_hash: String,
        compute: F,
    ) -> Result<T, EngineError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    {
        if !self.caching {
            self.computations.fetch_add(1, Ordering::Relaxed);
            return run_blocking(compute).await;
        }

        let label = key.to_string();
        let flight_key = (key.clone(), input_hash.clone());
        let value = self
            .artifacts
            .get_or_try_init(flight_key, || async {
                if let Some(value) = self.stored(&key, &input_hash) {
                    return Ok(value);
                }
                self.computations.fetch_add(1, Ordering::Relaxed);
                let computed = run_blocking(compute).await?;
                let value = serde_json::to_value(&computed).map_err(|source| {
                    StoreError::Corrupt {
                        key: key.to_string(),
                        source,
                    }
                })?;
                self.persist(&key, &input_hash, &value);
                Ok::<_, EngineError>(value)
            })
            .await?;

        <T as Deserialize>::deserialize(value.as_ref()).map_err(|source| {
            EngineError::Store(StoreError::Corrupt { key: label, source })
        })
    }

    fn stored(&self, key: &ArtifactKey, input_hash: &str) -> Option<serde_json::Value> {
        match self.store.get_artifact(key) {
            Ok(Some(record)) if record.input_hash == input_hash => {
                tracing::debug!(%key, "artifact store hit");
                Some(record.value)
            }
            Ok(Some(_)) => {
                tracing::debug!(%key, "stored artifact is stale");
                None
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(%key, %err, "artifact store read failed; recomputing");
                None
            }
        }
    }

    fn persist(&self, key: &ArtifactKey, input_hash: &str, value: &serde_json::Value) {
        let record = ArtifactRecord::new(input_hash, value.clone());
        if let Err(err) = self.store.put_artifact(key, &record) {
            tracing::warn!(%key, %err, "artifact store write failed");
        }
    }
}

fn input_hash<T: Serialize + ?Sized>(value: &T) -> Result<String, EngineError> {
    hash_json(value).map_err(|err| EngineError::Store(StoreError::Encoding(err)))
}

async fn run_blocking<T, F>(compute: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    tokio::task::spawn_blocking(compute)
        .await
        .map_err(|err| EngineError::Task(err.to_string()))?
}
