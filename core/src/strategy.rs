//! Strategies and innocence.

use std::collections::{BTreeMap, BTreeSet};

use ludics_types::{ActionKey, Design, DesignId, Polarity, StrategyId, View, content_hash};
use serde::{Deserialize, Serialize};

use crate::views::{extract_views, maximal_views, view_of};

/// A player's view set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: StrategyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_id: Option<DesignId>,
    pub player: Polarity,
    pub views: Vec<View>,
}

impl Strategy {
    #[must_use]
    pub fn from_design(design: &Design) -> Self {
        Self::from_views(
            design.polarity(),
            extract_views(design),
            Some(design.id().clone()),
        )
    }

    /// Build from explicit views. Duplicates (by action keys) are dropped;
    /// the id depends only on the player and the set of views.
    #[must_use]
    pub fn from_views(player: Polarity, views: Vec<View>, design_id: Option<DesignId>) -> Self {
        let mut seen = BTreeSet::new();
        let views: Vec<View> = views
            .into_iter()
            .map(|v| View::new(player, v.actions))
            .filter(|v| seen.insert(v.keys()))
            .collect();
        let id = strategy_id(player, &seen);
        Self {
            id,
            design_id,
            player,
            views,
        }
    }

    #[must_use]
    pub fn view_keys(&self) -> BTreeSet<Vec<ActionKey>> {
        self.views.iter().map(View::keys).collect()
    }

    #[must_use]
    pub fn maximal_views(&self) -> Vec<View> {
        maximal_views(&self.views)
    }

    /// Every non-empty prefix of every view is itself a view of the strategy.
    #[must_use]
    pub fn is_prefix_closed(&self) -> bool {
        let keys = self.view_keys();
        keys.iter()
            .all(|k| (1..k.len()).all(|len| keys.contains(&k[..len].to_vec())))
    }
}

/// One line per view, in key order, after the player.
fn strategy_id(player: Polarity, views: &BTreeSet<Vec<ActionKey>>) -> StrategyId {
    let mut text = player.to_string();
    for keys in views {
        text.push('\n');
        let line: Vec<String> = keys.iter().map(ToString::to_string).collect();
        text.push_str(&line.join(" "));
    }
    StrategyId::new(content_hash(text.as_bytes()))
}

// ── Innocence ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InnocenceViolationKind {
    NonDeterministic,
    NonViewStable,
    NotSaturated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnocenceViolation {
    pub kind: InnocenceViolationKind,
    /// Indices into the strategy's views.
    pub views: Vec<usize>,
    pub prefix_len: usize,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnocenceReport {
    pub is_innocent: bool,
    pub is_deterministic: bool,
    pub is_view_stable: bool,
    pub is_saturated: bool,
    pub is_prefix_closed: bool,
    pub violations: Vec<InnocenceViolation>,
}

/// Determinism, view-stability and saturation of a strategy. Never
/// fails: the violations list is the verdict.
#[must_use]
pub fn check_innocence(strategy: &Strategy) -> InnocenceReport {
    let mut violations = determinism_violations(strategy);
    let is_deterministic = violations.is_empty();

    let stability = stability_violations(strategy);
    let is_view_stable = stability.is_empty();
    violations.extend(stability);

    let saturation = saturation_violations(strategy);
    let is_saturated = saturation.is_empty();
    violations.extend(saturation);

    if !violations.is_empty() {
        tracing::debug!(
            strategy = strategy.id.short(),
            count = violations.len(),
            "innocence violations"
        );
    }

    InnocenceReport {
        is_innocent: is_deterministic && is_view_stable && is_saturated,
        is_deterministic,
        is_view_stable,
        is_saturated,
        is_prefix_closed: strategy.is_prefix_closed(),
        violations,
    }
}

/// Two views that agree up to some point and then differ on a player move.
/// Different opponent moves after a shared prefix are ordinary branching.
fn determinism_violations(strategy: &Strategy) -> Vec<InnocenceViolation> {
    let views = &strategy.views;
    let mut reported: BTreeSet<(Vec<ActionKey>, ActionKey, ActionKey)> = BTreeSet::new();
    let mut out = Vec::new();

    for i in 0..views.len() {
        for j in (i + 1)..views.len() {
            let k = views[i].common_prefix_len(&views[j]);
            let (Some(a), Some(b)) = (views[i].actions.get(k), views[j].actions.get(k)) else {
                continue;
            };
            if a.polarity != strategy.player || b.polarity != strategy.player {
                continue;
            }
            let (lo, hi) = if a.key() <= b.key() {
                (a.key(), b.key())
            } else {
                (b.key(), a.key())
            };
            if !reported.insert((views[i].prefix(k).keys(), lo, hi)) {
                continue;
            }
            out.push(InnocenceViolation {
                kind: InnocenceViolationKind::NonDeterministic,
                views: vec![i, j],
                prefix_len: k,
                evidence: format!("after {k} shared moves the player answers both {a} and {b}"),
            });
        }
    }
    out
}

/// Every view must be its own view, and positions that look the same to
/// the player must get the same answer.
fn stability_violations(strategy: &Strategy) -> Vec<InnocenceViolation> {
    let player = strategy.player;
    let mut out = Vec::new();

    for (i, view) in strategy.views.iter().enumerate() {
        let reduced = view_of(&view.actions, player);
        if reduced.keys() != view.keys() {
            out.push(InnocenceViolation {
                kind: InnocenceViolationKind::NonViewStable,
                views: vec![i],
                prefix_len: reduced.common_prefix_len(view),
                evidence: format!(
                    "view of length {} reduces to length {}",
                    view.len(),
                    reduced.len()
                ),
            });
        }
    }

    // Visible position -> (next player move, first view that played it).
    let mut answers: BTreeMap<Vec<ActionKey>, BTreeMap<ActionKey, usize>> = BTreeMap::new();
    for (i, view) in strategy.views.iter().enumerate() {
        for (pos, action) in view.actions.iter().enumerate() {
            if action.polarity != player {
                continue;
            }
            let visible = view_of(&view.actions[..pos], player).keys();
            answers
                .entry(visible)
                .or_default()
                .entry(action.key())
                .or_insert(i);
        }
    }
    for (visible, moves) in answers {
        if moves.len() < 2 {
            continue;
        }
        let rendered: Vec<String> = moves.keys().map(ToString::to_string).collect();
        out.push(InnocenceViolation {
            kind: InnocenceViolationKind::NonViewStable,
            views: moves.values().copied().collect(),
            prefix_len: visible.len(),
            evidence: format!(
                "the same visible position of length {} leads to {}",
                visible.len(),
                rendered.join(" and ")
            ),
        });
    }
    out
}

/// An opponent move depends only on the player move that justifies it, so
/// one that follows a player move in some view must follow it in every
/// view ending with that move.
fn saturation_violations(strategy: &Strategy) -> Vec<InnocenceViolation> {
    let player = strategy.player;
    let keys = strategy.view_keys();

    // Player move -> views ending with it.
    let mut endings: BTreeMap<ActionKey, Vec<usize>> = BTreeMap::new();
    for (i, view) in strategy.views.iter().enumerate() {
        if let Some(last) = view.last()
            && last.polarity == player
        {
            endings.entry(last.key()).or_default().push(i);
        }
    }

    let mut out = Vec::new();
    for (i, view) in strategy.views.iter().enumerate() {
        let n = view.len();
        if n < 2 {
            continue;
        }
        let (justifier, reply) = (&view.actions[n - 2], &view.actions[n - 1]);
        if reply.polarity == player || justifier.polarity != player {
            continue;
        }
        for &j in endings.get(&justifier.key()).into_iter().flatten() {
            let mut wanted = strategy.views[j].keys();
            wanted.push(reply.key());
            if keys.contains(&wanted) {
                continue;
            }
            out.push(InnocenceViolation {
                kind: InnocenceViolationKind::NotSaturated,
                views: vec![i, j],
                prefix_len: strategy.views[j].len(),
                evidence: format!(
                    "{reply} follows {justifier} in view {i} but not in view {j}"
                ),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ludics_types::{Action, Address};

    fn addr(s: &str) -> Address {
        Address::parse(s).expect("valid address")
    }

    fn design(acts: Vec<Action>) -> Design {
        Design::compile("p", acts).expect("valid design")
    }

    #[test]
    fn design_strategy_is_innocent() {
        let d = design(vec![
            Action::positive(addr("0"), [1, 2]),
            Action::negative(addr("0.1"), [1]),
            Action::positive(addr("0.1.1"), Vec::new()),
            Action::daimon(addr("0.2")),
        ]);
        let strategy = Strategy::from_design(&d);
        assert_eq!(strategy.design_id.as_ref(), Some(d.id()));
        let report = check_innocence(&strategy);
        assert!(report.is_innocent, "{:?}", report.violations);
        assert!(report.is_saturated);
        assert!(report.is_prefix_closed);
    }

    #[test]
    fn opponent_reply_missing_in_one_context_is_not_saturated() {
        let claim = Action::positive(addr("0"), [1]);
        let narrow = Action::negative(addr("0.1"), [1]);
        let wide = Action::negative(addr("0.1"), [1, 2]);
        let answer = Action::positive(addr("0.1.1"), [1]);
        let give_up = Action::daimon(addr("0.1.1.1"));
        let view = |acts: &[&Action]| {
            View::new(Polarity::Positive, acts.iter().map(|a| (*a).clone()).collect())
        };
        let strategy = Strategy::from_views(
            Polarity::Positive,
            vec![
                view(&[&claim]),
                view(&[&claim, &narrow]),
                view(&[&claim, &narrow, &answer]),
                view(&[&claim, &narrow, &answer, &give_up]),
                view(&[&claim, &wide]),
                view(&[&claim, &wide, &answer]),
            ],
            None,
        );

        let report = check_innocence(&strategy);
        assert!(report.is_deterministic);
        assert!(report.is_view_stable, "{:?}", report.violations);
        assert!(report.is_prefix_closed);
        assert!(!report.is_saturated);
        assert!(!report.is_innocent);
        let missing: Vec<&InnocenceViolation> = report
            .violations
            .iter()
            .filter(|v| v.kind == InnocenceViolationKind::NotSaturated)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].views, vec![3, 5]);
        assert_eq!(missing[0].prefix_len, 3);
    }

    #[test]
    fn two_answers_to_one_opponent_move_are_non_deterministic() {
        let d = design(vec![
            Action::positive(addr("0"), [1]),
            Action::negative(addr("0.1"), [1, 2]),
            Action::positive(addr("0.1.1"), Vec::new()),
            Action::positive(addr("0.1.2"), Vec::new()),
        ]);
        let report = check_innocence(&Strategy::from_design(&d));
        assert!(!report.is_deterministic);
        assert!(!report.is_innocent);
        let violation = &report.violations[0];
        assert_eq!(violation.kind, InnocenceViolationKind::NonDeterministic);
        assert_eq!(violation.prefix_len, 2);
        // Reported once even though several view pairs witness it.
        let count = report
            .violations
            .iter()
            .filter(|v| v.kind == InnocenceViolationKind::NonDeterministic)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn non_view_sequence_is_unstable() {
        let seq = vec![
            Action::positive(addr("0"), [1, 2]),
            Action::negative(addr("0.1"), [1]),
            Action::positive(addr("0.1.1"), [1]),
            Action::negative(addr("0.2"), Vec::new()),
        ];
        let strategy = Strategy::from_views(
            Polarity::Positive,
            vec![View::new(Polarity::Positive, seq)],
            None,
        );
        let report = check_innocence(&strategy);
        assert!(!report.is_view_stable);
        assert!(!report.is_prefix_closed);
        assert!(
            report
                .violations
                .iter()
                .any(|v| v.kind == InnocenceViolationKind::NonViewStable)
        );
    }

    #[test]
    fn id_ignores_order_and_duplicates() {
        let d = design(vec![
            Action::positive(addr("0"), [1]),
            Action::daimon(addr("0.1")),
        ]);
        let a = Strategy::from_design(&d);
        let mut reversed = a.views.clone();
        reversed.reverse();
        reversed.push(a.views[0].clone());
        let b = Strategy::from_views(Polarity::Positive, reversed, None);
        assert_eq!(a.id, b.id);
        assert_eq!(b.views.len(), 2);
    }
}
