//! Orthogonality, biorthogonal closure and behaviours over a finite
//! catalogue.

use std::collections::{BTreeSet, HashMap};

use ludics_types::{Address, Chronicle, Design, DesignId, Polarity, StrategyId};
use serde::{Deserialize, Serialize};

use crate::interaction::{DisputeStatus, interact};
use crate::strategy::Strategy;

// ── Designs ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterExample {
    pub positive: DesignId,
    pub negative: DesignId,
    /// Absent when the interaction itself failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DisputeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stuck_at: Option<Address>,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignOrthogonality {
    pub is_orthogonal: bool,
    /// Fuel ran out in at least one orientation.
    pub inconclusive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_example: Option<CounterExample>,
}

/// Whether two designs converge against each other.
///
/// The design opening with a positive act plays positive. When both
/// designs have the same polarity the pair is run in both orientations and
/// both must converge.
#[must_use]
pub fn designs_orthogonal(a: &Design, b: &Design, fuel: u32) -> DesignOrthogonality {
    let orientations = match (a.polarity(), b.polarity()) {
        (Polarity::Positive, Polarity::Negative) => vec![(a, b)],
        (Polarity::Negative, Polarity::Positive) => vec![(b, a)],
        _ if a.id() == b.id() => vec![(a, b)],
        _ => vec![(a, b), (b, a)],
    };

    for (pos, neg) in orientations {
        let counter = match interact(pos, neg, fuel, &[]) {
            Ok(dispute) if dispute.status.is_convergent() => continue,
            Ok(dispute) => CounterExample {
                positive: pos.id().clone(),
                negative: neg.id().clone(),
                status: Some(dispute.status),
                evidence: describe(dispute.status, dispute.pairs.len(), dispute.stuck_at.as_ref()),
                stuck_at: dispute.stuck_at,
            },
            Err(err) => CounterExample {
                positive: pos.id().clone(),
                negative: neg.id().clone(),
                status: None,
                stuck_at: None,
                evidence: err.to_string(),
            },
        };
        return DesignOrthogonality {
            is_orthogonal: false,
            inconclusive: counter.status.is_some_and(DisputeStatus::is_inconclusive),
            counter_example: Some(counter),
        };
    }

    DesignOrthogonality {
        is_orthogonal: true,
        inconclusive: false,
        counter_example: None,
    }
}

fn describe(status: DisputeStatus, pairs: usize, stuck_at: Option<&Address>) -> String {
    match stuck_at {
        Some(at) => format!("{status} after {pairs} pairs, stuck at {at}"),
        None => format!("{status} after {pairs} pairs"),
    }
}

// ── Strategies ───────────────────────────────────────────────

/// The designs a strategy plays: its maximal views compiled together as
/// one design. A view set that does not form a single justified tree is
/// split into one design per view, and views that fail on their own are
/// skipped.
#[must_use]
pub fn strategy_designs(strategy: &Strategy) -> Vec<Design> {
    let owner = format!("strategy:{}", strategy.id.short());
    let views = strategy.maximal_views();
    let chronicles: Vec<Chronicle> = views
        .iter()
        .map(|view| Chronicle::new(view.actions.clone(), strategy.player, true))
        .collect();
    match Design::from_chronicles(owner.clone(), &chronicles) {
        Ok(design) => return vec![design],
        Err(err) => {
            tracing::debug!(
                strategy = strategy.id.short(),
                %err,
                "views split into separate designs"
            );
        }
    }

    views
        .into_iter()
        .filter_map(|view| match Design::compile(owner.clone(), view.actions) {
            Ok(design) => Some(design),
            Err(err) => {
                tracing::debug!(strategy = strategy.id.short(), %err, "view skipped");
                None
            }
        })
        .collect()
}

/// Designs known by id. A strategy built from one of them plays it
/// directly instead of a design rebuilt from its views.
#[derive(Debug, Clone, Default)]
pub struct DesignRegistry {
    designs: HashMap<DesignId, Design>,
}

impl DesignRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, design: Design) {
        self.designs.insert(design.id().clone(), design);
    }

    #[must_use]
    pub fn get(&self, id: &DesignId) -> Option<&Design> {
        self.designs.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.designs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.designs.is_empty()
    }

    #[must_use]
    pub fn designs_for(&self, strategy: &Strategy) -> Vec<Design> {
        match strategy.design_id.as_ref().and_then(|id| self.designs.get(id)) {
            Some(design) => vec![design.clone()],
            None => strategy_designs(strategy),
        }
    }
}

impl FromIterator<Design> for DesignRegistry {
    fn from_iter<I: IntoIterator<Item = Design>>(iter: I) -> Self {
        let mut registry = Self::new();
        for design in iter {
            registry.insert(design);
        }
        registry
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrthogonalityReport {
    pub is_orthogonal: bool,
    pub inconclusive: bool,
    pub pairs_checked: usize,
    pub counter_examples: Vec<CounterExample>,
}

/// `S ⊥ T` iff every design of one is orthogonal to every design of the
/// other. Stops once `max_counter_examples` failures have been collected.
#[must_use]
pub fn strategies_orthogonal(
    s: &Strategy,
    t: &Strategy,
    registry: &DesignRegistry,
    fuel: u32,
    max_counter_examples: usize,
) -> OrthogonalityReport {
    designs_report(
        &registry.designs_for(s),
        &registry.designs_for(t),
        fuel,
        max_counter_examples,
    )
}

fn designs_report(
    left: &[Design],
    right: &[Design],
    fuel: u32,
    max_counter_examples: usize,
) -> OrthogonalityReport {
    let mut report = OrthogonalityReport {
        is_orthogonal: true,
        inconclusive: false,
        pairs_checked: 0,
        counter_examples: Vec::new(),
    };
    'outer: for d in left {
        for e in right {
            report.pairs_checked += 1;
            let verdict = designs_orthogonal(d, e, fuel);
            if verdict.is_orthogonal {
                continue;
            }
            report.is_orthogonal = false;
            report.inconclusive |= verdict.inconclusive;
            if report.counter_examples.len() >= max_counter_examples {
                break 'outer;
            }
            report.counter_examples.extend(verdict.counter_example);
            if report.counter_examples.len() >= max_counter_examples {
                break 'outer;
            }
        }
    }
    report
}

// ── Closure ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PairVerdict {
    orthogonal: bool,
    inconclusive: bool,
}

/// Pairwise verdicts keyed by unordered pair.
#[derive(Debug)]
pub struct OrthogonalityMemo {
    fuel: u32,
    registry: DesignRegistry,
    designs: HashMap<StrategyId, Vec<Design>>,
    verdicts: HashMap<(StrategyId, StrategyId), PairVerdict>,
    inconclusive: bool,
}

impl OrthogonalityMemo {
    #[must_use]
    pub fn new(fuel: u32) -> Self {
        Self::with_registry(fuel, DesignRegistry::new())
    }

    #[must_use]
    pub fn with_registry(fuel: u32, registry: DesignRegistry) -> Self {
        Self {
            fuel,
            registry,
            designs: HashMap::new(),
            verdicts: HashMap::new(),
            inconclusive: false,
        }
    }

    pub fn orthogonal(&mut self, s: &Strategy, t: &Strategy) -> bool {
        let key = if s.id <= t.id {
            (s.id.clone(), t.id.clone())
        } else {
            (t.id.clone(), s.id.clone())
        };
        if let Some(verdict) = self.verdicts.get(&key) {
            return verdict.orthogonal;
        }

        let left = self.designs_of(s);
        let right = self.designs_of(t);
        let report = designs_report(&left, &right, self.fuel, 0);
        let verdict = PairVerdict {
            orthogonal: report.is_orthogonal,
            inconclusive: report.inconclusive,
        };
        self.inconclusive |= verdict.inconclusive;
        self.verdicts.insert(key, verdict);
        verdict.orthogonal
    }

    /// Distinct pairs evaluated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    #[must_use]
    pub fn saw_inconclusive(&self) -> bool {
        self.inconclusive
    }

    fn designs_of(&mut self, strategy: &Strategy) -> Vec<Design> {
        let registry = &self.registry;
        self.designs
            .entry(strategy.id.clone())
            .or_insert_with(|| registry.designs_for(strategy))
            .clone()
    }
}

/// `S⊥` relative to `catalogue`. The orthogonal of the empty set is the
/// whole catalogue.
pub fn perp<'a>(
    set: &[&Strategy],
    catalogue: &'a [Strategy],
    memo: &mut OrthogonalityMemo,
) -> Vec<&'a Strategy> {
    catalogue
        .iter()
        .filter(|candidate| set.iter().all(|member| memo.orthogonal(candidate, member)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureLimits {
    pub fuel: u32,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureReport {
    /// Sorted ids of `S⊥⊥`.
    pub closure_ids: Vec<StrategyId>,
    /// Sorted ids of `S⊥` for the final set.
    pub orthogonal_ids: Vec<StrategyId>,
    pub iterations: usize,
    pub fixpoint_reached: bool,
    pub converged: bool,
    /// Some pair ran out of fuel; the sets may be too small.
    pub inconclusive: bool,
    pub pairs_checked: usize,
}

/// Grow `seeds` by `S ← S ∪ (S⊥)⊥` until nothing is added or the
/// iteration cap is reached. The seeds join the catalogue.
#[must_use]
pub fn biorthogonal_closure(
    seeds: &[Strategy],
    catalogue: &[Strategy],
    registry: &DesignRegistry,
    limits: ClosureLimits,
) -> ClosureReport {
    let seed_ids: Vec<StrategyId> = seeds.iter().map(|s| s.id.clone()).collect();
    let mut space = BehaviourSpace::new(
        catalogue.iter().chain(seeds).cloned(),
        registry.clone(),
        limits,
    );
    space.closure(&seed_ids)
}

// ── Behaviours ───────────────────────────────────────────────

/// A set of strategies closed under `⊥⊥`, named by its generators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behaviour {
    /// Sorted.
    pub generators: Vec<StrategyId>,
    /// Sorted ids of the closure of the generators.
    pub members: Vec<StrategyId>,
    /// False when the closure stopped at the iteration cap.
    pub converged: bool,
}

impl Behaviour {
    #[must_use]
    pub fn contains(&self, id: &StrategyId) -> bool {
        self.members.binary_search(id).is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviourValidation {
    pub is_closed: bool,
    pub iterations: usize,
    /// In the recomputed closure but not among the members.
    pub missing: Vec<StrategyId>,
    /// Among the members but not in the recomputed closure.
    pub extra: Vec<StrategyId>,
}

/// `B₁ ⊆ B₂` on members.
#[must_use]
pub fn behaviour_contained_in(inner: &Behaviour, outer: &Behaviour) -> bool {
    inner.members.iter().all(|id| outer.contains(id))
}

#[must_use]
pub fn behaviours_equal(a: &Behaviour, b: &Behaviour) -> bool {
    a.members == b.members
}

/// Inclusion in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviourInclusion {
    pub left_in_right: bool,
    pub right_in_left: bool,
    pub equal: bool,
}

impl BehaviourInclusion {
    #[must_use]
    pub fn between(left: &Behaviour, right: &Behaviour) -> Self {
        Self {
            left_in_right: behaviour_contained_in(left, right),
            right_in_left: behaviour_contained_in(right, left),
            equal: behaviours_equal(left, right),
        }
    }
}

/// A catalogue of strategies with shared pairwise verdicts. Ids outside
/// the catalogue are ignored.
#[derive(Debug)]
pub struct BehaviourSpace {
    universe: Vec<Strategy>,
    memo: OrthogonalityMemo,
    max_iterations: usize,
}

impl BehaviourSpace {
    /// Duplicate ids in `catalogue` keep their first strategy.
    pub fn new(
        catalogue: impl IntoIterator<Item = Strategy>,
        registry: DesignRegistry,
        limits: ClosureLimits,
    ) -> Self {
        let mut known = BTreeSet::new();
        let universe = catalogue
            .into_iter()
            .filter(|s| known.insert(s.id.clone()))
            .collect();
        Self {
            universe,
            memo: OrthogonalityMemo::with_registry(limits.fuel, registry),
            max_iterations: limits.max_iterations,
        }
    }

    #[must_use]
    pub fn catalogue(&self) -> &[Strategy] {
        &self.universe
    }

    #[must_use]
    pub fn memo(&self) -> &OrthogonalityMemo {
        &self.memo
    }

    /// `S⊥` over the catalogue.
    pub fn orthogonal(&mut self, ids: &BTreeSet<StrategyId>) -> BTreeSet<StrategyId> {
        let members = members_of(&self.universe, ids);
        perp(&members, &self.universe, &mut self.memo)
            .into_iter()
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn closure(&mut self, seeds: &[StrategyId]) -> ClosureReport {
        let mut current = self.known(seeds);
        let mut orthogonal = BTreeSet::new();
        let mut iterations = 0;
        let mut fixpoint_reached = false;

        while iterations < self.max_iterations {
            iterations += 1;
            orthogonal = self.orthogonal(&current);
            let bi = self.orthogonal(&orthogonal);

            let before = current.len();
            current.extend(bi);
            tracing::debug!(iteration = iterations, size = current.len(), "closure step");
            if current.len() == before {
                fixpoint_reached = true;
                break;
            }
        }

        if !fixpoint_reached {
            tracing::warn!(
                iterations,
                size = current.len(),
                "closure stopped at the iteration cap"
            );
            orthogonal = self.orthogonal(&current);
        }

        ClosureReport {
            closure_ids: current.into_iter().collect(),
            orthogonal_ids: orthogonal.into_iter().collect(),
            iterations,
            fixpoint_reached,
            converged: fixpoint_reached,
            inconclusive: self.memo.saw_inconclusive(),
            pairs_checked: self.memo.len(),
        }
    }

    /// The smallest behaviour containing `generators`.
    pub fn behaviour(&mut self, generators: &[StrategyId]) -> Behaviour {
        let report = self.closure(generators);
        Behaviour {
            generators: self.known(generators).into_iter().collect(),
            members: report.closure_ids,
            converged: report.converged,
        }
    }

    /// `S = S⊥⊥`.
    pub fn is_behaviour(&mut self, ids: &[StrategyId]) -> bool {
        let set: Vec<StrategyId> = self.known(ids).into_iter().collect();
        let report = self.closure(ids);
        report.converged && report.closure_ids == set
    }

    /// Recompute the closure of the members and compare.
    pub fn validate(&mut self, behaviour: &Behaviour) -> BehaviourValidation {
        let report = self.closure(&behaviour.members);
        let recomputed: BTreeSet<&StrategyId> = report.closure_ids.iter().collect();
        let missing: Vec<StrategyId> = report
            .closure_ids
            .iter()
            .filter(|id| !behaviour.contains(id))
            .cloned()
            .collect();
        let extra: Vec<StrategyId> = behaviour
            .members
            .iter()
            .filter(|id| !recomputed.contains(id))
            .cloned()
            .collect();
        BehaviourValidation {
            is_closed: report.converged && missing.is_empty() && extra.is_empty(),
            iterations: report.iterations,
            missing,
            extra,
        }
    }

    /// The behaviour generated by the members common to both.
    pub fn intersect(&mut self, a: &Behaviour, b: &Behaviour) -> Behaviour {
        let common: Vec<StrategyId> = a
            .members
            .iter()
            .filter(|id| b.contains(id))
            .cloned()
            .collect();
        self.behaviour(&common)
    }

    /// The behaviour generated by `B⊥`.
    pub fn complement(&mut self, behaviour: &Behaviour) -> Behaviour {
        let members = self.known(&behaviour.members);
        let orthogonal: Vec<StrategyId> = self.orthogonal(&members).into_iter().collect();
        self.behaviour(&orthogonal)
    }

    fn known(&self, ids: &[StrategyId]) -> BTreeSet<StrategyId> {
        ids.iter()
            .filter(|id| {
                let found = self.universe.iter().any(|s| &s.id == *id);
                if !found {
                    tracing::debug!(strategy = id.short(), "not in the catalogue");
                }
                found
            })
            .cloned()
            .collect()
    }
}

fn members_of<'a>(universe: &'a [Strategy], ids: &BTreeSet<StrategyId>) -> Vec<&'a Strategy> {
    universe.iter().filter(|s| ids.contains(&s.id)).collect()
}
