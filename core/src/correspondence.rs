//! Design/strategy correspondence: the four isomorphisms.

use std::collections::BTreeSet;

use ludics_types::{ActionKey, Design, sequence_keys};
use serde::{Deserialize, Serialize};

use crate::plays::{PlaySet, plays_of, view_key_set, views_of_plays};
use crate::propagation::{PropagationReport, check_propagation};
use crate::strategy::{InnocenceReport, Strategy, check_innocence};
use crate::views::{extract_chronicles, maximal_views};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsomorphismCheck {
    pub checked: bool,
    pub holds: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl IsomorphismCheck {
    fn verdict(holds: bool, evidence: impl FnOnce() -> String) -> Self {
        Self {
            checked: true,
            holds,
            evidence: (!holds).then(evidence),
        }
    }

    fn unchecked(reason: impl Into<String>) -> Self {
        Self {
            checked: false,
            holds: false,
            evidence: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.checked && self.holds
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Isomorphisms {
    pub plays_views: IsomorphismCheck,
    pub views_plays: IsomorphismCheck,
    pub disp_ch: IsomorphismCheck,
    pub ch_disp: IsomorphismCheck,
}

impl Isomorphisms {
    #[must_use]
    pub fn all_hold(&self) -> bool {
        [
            &self.plays_views,
            &self.views_plays,
            &self.disp_ch,
            &self.ch_disp,
        ]
        .iter()
        .all(|c| c.passed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondenceReport {
    pub is_verified: bool,
    pub innocence: InnocenceReport,
    pub propagation: PropagationReport,
    pub isomorphisms: Isomorphisms,
}

/// Check `design` against `strategy`. `max_plays` bounds each play
/// enumeration; past it the affected checks are reported unchecked.
#[must_use]
pub fn verify_correspondence(
    design: &Design,
    strategy: &Strategy,
    max_plays: usize,
) -> CorrespondenceReport {
    let innocence = check_innocence(strategy);
    let propagation = check_propagation(&strategy.views);

    let plays = plays_of(&strategy.views, strategy.player, max_plays);
    let (plays_views, views_plays) = play_view_round_trips(strategy, &plays, max_plays);
    let disp_ch = disp_of_chronicles(design);
    let ch_disp = chronicles_of_disp(design, max_plays);

    let isomorphisms = Isomorphisms {
        plays_views,
        views_plays,
        disp_ch,
        ch_disp,
    };
    let is_verified =
        innocence.is_innocent && propagation.satisfies_propagation && isomorphisms.all_hold();

    CorrespondenceReport {
        is_verified,
        innocence,
        propagation,
        isomorphisms,
    }
}

/// `Views(Plays(S)) = S` and `Plays(Views(P)) = P` for `P = Plays(S)`.
fn play_view_round_trips(
    strategy: &Strategy,
    plays: &PlaySet,
    max_plays: usize,
) -> (IsomorphismCheck, IsomorphismCheck) {
    if !plays.complete {
        let reason = format!("more than {max_plays} plays");
        return (
            IsomorphismCheck::unchecked(reason.clone()),
            IsomorphismCheck::unchecked(reason),
        );
    }

    let recovered = views_of_plays(&plays.plays, strategy.player);
    let original = strategy.view_keys();
    let recovered_keys = view_key_set(&recovered);
    let plays_views = IsomorphismCheck::verdict(recovered_keys == original, || {
        describe_difference("views", &original, &recovered_keys)
    });

    let replayed = plays_of(&recovered, strategy.player, max_plays);
    let views_plays = if replayed.complete {
        let before = plays.keys();
        let after = replayed.keys();
        IsomorphismCheck::verdict(before == after, || {
            describe_difference("plays", &before, &after)
        })
    } else {
        IsomorphismCheck::unchecked(format!("more than {max_plays} plays"))
    };

    (plays_views, views_plays)
}

/// Rebuilding the design from its chronicles gives back the same tree.
fn disp_of_chronicles(design: &Design) -> IsomorphismCheck {
    let chronicles = extract_chronicles(design);
    match Design::from_chronicles(design.owner(), &chronicles) {
        Ok(rebuilt) => IsomorphismCheck::verdict(design.same_structure(&rebuilt), || {
            format!(
                "rebuilt design has {} actions, original {}",
                rebuilt.action_count(),
                design.action_count()
            )
        }),
        Err(err) => IsomorphismCheck::verdict(false, || format!("chronicles do not compile: {err}")),
    }
}

/// The maximal views of the design's plays are exactly its chronicles.
fn chronicles_of_disp(design: &Design, max_plays: usize) -> IsomorphismCheck {
    let strategy = Strategy::from_design(design);
    let plays = plays_of(&strategy.views, strategy.player, max_plays);
    if !plays.complete {
        return IsomorphismCheck::unchecked(format!("more than {max_plays} plays"));
    }
    let views = views_of_plays(&plays.plays, strategy.player);
    let recovered = view_key_set(&maximal_views(&views));
    let chronicles: BTreeSet<Vec<ActionKey>> = extract_chronicles(design)
        .iter()
        .map(|c| sequence_keys(&c.actions))
        .collect();
    IsomorphismCheck::verdict(recovered == chronicles, || {
        describe_difference("chronicles", &chronicles, &recovered)
    })
}

fn describe_difference(
    what: &str,
    expected: &BTreeSet<Vec<ActionKey>>,
    actual: &BTreeSet<Vec<ActionKey>>,
) -> String {
    let missing = expected.difference(actual).count();
    let extra = actual.difference(expected).count();
    let sample = expected
        .symmetric_difference(actual)
        .next()
        .map(|seq| {
            seq.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    format!("{what}: {missing} missing, {extra} unexpected; first difference [{sample}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ludics_types::{Action, Address, Polarity, View};

    fn addr(s: &str) -> Address {
        Address::parse(s).expect("valid address")
    }

    fn two_branches() -> Design {
        Design::compile(
            "p",
            vec![
                Action::positive(addr("0"), [1, 2]),
                Action::negative(addr("0.1"), [1]),
                Action::positive(addr("0.1.1"), Vec::new()),
                Action::negative(addr("0.2"), [1]),
                Action::positive(addr("0.2.1"), Vec::new()),
            ],
        )
        .expect("valid design")
    }

    #[test]
    fn design_and_its_strategy_correspond() {
        let design = two_branches();
        let strategy = Strategy::from_design(&design);
        let report = verify_correspondence(&design, &strategy, 1_000);
        assert!(report.isomorphisms.all_hold(), "{:?}", report.isomorphisms);
        assert!(report.is_verified);
    }

    #[test]
    fn strategy_missing_a_prefix_fails_plays_views() {
        let design = two_branches();
        let full = Strategy::from_design(&design);
        // Drop the root view: nothing can be played any more.
        let views: Vec<View> = full.views.iter().skip(1).cloned().collect();
        let partial = Strategy::from_views(Polarity::Positive, views, None);
        let report = verify_correspondence(&design, &partial, 1_000);
        assert!(!report.isomorphisms.plays_views.holds);
        assert!(report.isomorphisms.plays_views.checked);
        assert!(report.isomorphisms.plays_views.evidence.is_some());
        assert!(!report.is_verified);
        // The design side does not depend on the strategy.
        assert!(report.isomorphisms.disp_ch.passed());
        assert!(report.isomorphisms.ch_disp.passed());
    }

    #[test]
    fn tight_bound_leaves_checks_unchecked() {
        let design = two_branches();
        let strategy = Strategy::from_design(&design);
        let report = verify_correspondence(&design, &strategy, 3);
        assert!(!report.isomorphisms.plays_views.checked);
        assert!(!report.isomorphisms.ch_disp.checked);
        assert!(report.isomorphisms.disp_ch.passed());
        assert!(!report.is_verified);
    }
}
