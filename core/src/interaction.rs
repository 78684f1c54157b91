//! Normalization of a positive design against a negative one.
//!
//! The dispute starts at the positive design's base. Each step pairs a
//! positive action with the negative answer found at one of the loci it
//! opened, then looks for the positive continuation among the loci the
//! answer opened. Fuel counts pairs.

use std::fmt;

use ludics_types::{Action, Address, Design, DesignId, Polarity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionError {
    #[error("{side} design has {} candidate moves after {address}: {}", .candidates.len(), render(.candidates))]
    NonDeterministicDesign {
        side: Polarity,
        address: Address,
        candidates: Vec<Address>,
    },
}

impl InteractionError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NonDeterministicDesign { .. } => "NonDeterministicDesign",
        }
    }
}

fn render(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    /// A daimon (or a positive leaf) ended the exchange.
    Convergent,
    /// Someone had no move.
    Divergent,
    /// Fuel ran out first. Retry with more.
    Ongoing,
}

impl DisputeStatus {
    #[must_use]
    pub fn is_convergent(self) -> bool {
        self == Self::Convergent
    }

    #[must_use]
    pub fn is_inconclusive(self) -> bool {
        self == Self::Ongoing
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Convergent => "CONVERGENT",
            Self::Divergent => "DIVERGENT",
            Self::Ongoing => "ONGOING",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputePair {
    pub positive: Action,
    pub negative: Action,
    /// The negative side was a virtual focus, not an action of the negative design.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub positive_design: DesignId,
    pub negative_design: DesignId,
    pub status: DisputeStatus,
    pub pairs: Vec<DisputePair>,
    /// Alternating sequence of every action played.
    pub trace: Vec<Action>,
    /// Focus of the last action when nobody could answer it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stuck_at: Option<Address>,
    pub fuel_used: u32,
    /// Side that won a finished dispute. Absent while ONGOING.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Polarity>,
}

/// Whoever plays the daimon gives up; otherwise the side left without a
/// move after the last action loses.
#[must_use]
pub fn winner_of(status: DisputeStatus, trace: &[Action]) -> Option<Polarity> {
    if status.is_inconclusive() {
        return None;
    }
    Some(match trace.last() {
        Some(last) if last.is_daimon() => last.polarity.flip(),
        Some(last) => last.polarity,
        None => Polarity::Negative,
    })
}

struct Run {
    pairs: Vec<DisputePair>,
    trace: Vec<Action>,
    fuel_used: u32,
}

impl Run {
    fn finish(
        self,
        pos: &Design,
        neg: &Design,
        status: DisputeStatus,
        stuck_at: Option<Address>,
    ) -> Dispute {
        tracing::debug!(
            positive = pos.id().short(),
            negative = neg.id().short(),
            %status,
            pairs = self.pairs.len(),
            "dispute finished"
        );
        Dispute {
            positive_design: pos.id().clone(),
            negative_design: neg.id().clone(),
            status,
            winner: winner_of(status, &self.trace),
            pairs: self.pairs,
            trace: self.trace,
            stuck_at,
            fuel_used: self.fuel_used,
        }
    }
}

/// Interact `pos` with `neg` for at most `fuel` pairs.
///
/// Addresses in `virtual_neg_foci` answer with a daimon in place of
/// whatever the negative design holds there.
pub fn interact(
    pos: &Design,
    neg: &Design,
    fuel: u32,
    virtual_neg_foci: &[Address],
) -> Result<Dispute, InteractionError> {
    let mut run = Run {
        pairs: Vec::new(),
        trace: Vec::new(),
        fuel_used: 0,
    };

    let Some(mut positive) = pos.action_at(pos.base(), Polarity::Positive).cloned() else {
        return Ok(run.finish(pos, neg, DisputeStatus::Divergent, Some(pos.base().clone())));
    };

    loop {
        run.trace.push(positive.clone());
        if positive.is_positive_leaf() {
            return Ok(run.finish(pos, neg, DisputeStatus::Convergent, None));
        }

        let answers: Vec<(Action, bool)> = positive
            .opened()
            .filter_map(|locus| {
                if virtual_neg_foci.contains(&locus) {
                    Some((Action::daimon(locus), true))
                } else {
                    neg.action_at(&locus, Polarity::Negative)
                        .map(|a| (a.clone(), false))
                }
            })
            .collect();
        let Some((negative, is_virtual)) =
            select(answers, Polarity::Negative, &positive.focus, |(a, _)| &a.focus)?
        else {
            return Ok(run.finish(
                pos,
                neg,
                DisputeStatus::Divergent,
                Some(positive.focus.clone()),
            ));
        };

        if run.fuel_used >= fuel {
            return Ok(run.finish(pos, neg, DisputeStatus::Ongoing, None));
        }
        run.fuel_used += 1;
        run.trace.push(negative.clone());
        run.pairs.push(DisputePair {
            positive: positive.clone(),
            negative: negative.clone(),
            is_virtual,
        });

        if negative.is_daimon() {
            return Ok(run.finish(pos, neg, DisputeStatus::Convergent, None));
        }

        let continuations: Vec<Action> = negative
            .opened()
            .filter_map(|locus| pos.action_at(&locus, Polarity::Positive).cloned())
            .collect();
        match select(continuations, Polarity::Positive, &negative.focus, |a| &a.focus)? {
            Some(next) => positive = next,
            None => {
                return Ok(run.finish(
                    pos,
                    neg,
                    DisputeStatus::Divergent,
                    Some(negative.focus.clone()),
                ));
            }
        }
    }
}

/// At most one candidate may answer; several is a malformed design.
fn select<T>(
    mut candidates: Vec<T>,
    side: Polarity,
    after: &Address,
    focus: impl Fn(&T) -> &Address,
) -> Result<Option<T>, InteractionError> {
    if candidates.len() > 1 {
        return Err(InteractionError::NonDeterministicDesign {
            side,
            address: after.clone(),
            candidates: candidates.iter().map(|c| focus(c).clone()).collect(),
        });
    }
    Ok(candidates.pop())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::parse(s).expect("valid address")
    }

    fn design(owner: &str, acts: Vec<Action>) -> Design {
        Design::compile(owner, acts).expect("valid design")
    }

    fn claim() -> Design {
        design("p", vec![Action::positive(addr("0"), [1])])
    }

    #[test]
    fn single_pair_converges_on_daimon() {
        let neg = design("o", vec![Action::daimon(addr("0.1"))]);
        let dispute = interact(&claim(), &neg, 16, &[]).expect("deterministic");
        assert_eq!(dispute.status, DisputeStatus::Convergent);
        assert_eq!(dispute.pairs.len(), 1);
        assert_eq!(dispute.fuel_used, 1);
        assert_eq!(dispute.trace.len(), 2);
        assert_eq!(dispute.winner, Some(Polarity::Positive));
    }

    #[test]
    fn missing_answer_diverges() {
        let neg = design("o", vec![Action::daimon(addr("0.2"))]);
        let dispute = interact(&claim(), &neg, 16, &[]).expect("deterministic");
        assert_eq!(dispute.status, DisputeStatus::Divergent);
        assert_eq!(dispute.stuck_at, Some(addr("0")));
        assert!(dispute.pairs.is_empty());
        // The claim went unanswered.
        assert_eq!(dispute.winner, Some(Polarity::Positive));
    }

    #[test]
    fn longer_exchange_alternates() {
        let pos = design(
            "p",
            vec![
                Action::positive(addr("0"), [1]),
                Action::negative(addr("0.1"), [1]),
                Action::positive(addr("0.1.1"), [2]),
            ],
        );
        let neg = design(
            "o",
            vec![
                Action::negative(addr("0.1"), [1]),
                Action::positive(addr("0.1.1"), [2]),
                Action::daimon(addr("0.1.1.2")),
            ],
        );
        let dispute = interact(&pos, &neg, 16, &[]).expect("deterministic");
        assert_eq!(dispute.status, DisputeStatus::Convergent);
        assert_eq!(dispute.pairs.len(), 2);
        let polarities: Vec<Polarity> = dispute.trace.iter().map(|a| a.polarity).collect();
        assert_eq!(
            polarities,
            [Polarity::Positive, Polarity::Negative, Polarity::Positive, Polarity::Negative]
        );

        let starved = interact(&pos, &neg, 1, &[]).expect("deterministic");
        assert_eq!(starved.status, DisputeStatus::Ongoing);
        assert_eq!(starved.pairs.len(), 1);
        assert_eq!(starved.winner, None);
    }

    #[test]
    fn more_fuel_never_changes_a_convergent_outcome() {
        let neg = design("o", vec![Action::daimon(addr("0.1"))]);
        let statuses: Vec<DisputeStatus> = (0..6)
            .map(|fuel| interact(&claim(), &neg, fuel, &[]).expect("ok").status)
            .collect();
        assert_eq!(statuses[0], DisputeStatus::Ongoing);
        assert!(statuses[1..].iter().all(|s| s.is_convergent()));
    }

    #[test]
    fn virtual_focus_stands_in_for_the_negative_design() {
        let silent = design("o", vec![Action::negative(addr("0.7"), [1])]);
        let tested = interact(&claim(), &silent, 4, &[addr("0.1")]).expect("ok");
        assert_eq!(tested.status, DisputeStatus::Convergent);
        assert!(tested.pairs[0].is_virtual);
    }

    #[test]
    fn several_answers_are_rejected() {
        // A virtual focus at 0.1 plus a real daimon at 0.2.
        let pos = design("p", vec![Action::positive(addr("0"), [1, 2])]);
        let neg = design("o", vec![Action::daimon(addr("0.2"))]);
        let err = interact(&pos, &neg, 8, &[addr("0.1")]).expect_err("ambiguous");
        assert_eq!(
            err,
            InteractionError::NonDeterministicDesign {
                side: Polarity::Negative,
                address: addr("0"),
                candidates: vec![addr("0.1"), addr("0.2")],
            }
        );
        assert_eq!(err.kind(), "NonDeterministicDesign");
    }

    #[test]
    fn several_continuations_are_rejected() {
        let pos = design(
            "p",
            vec![
                Action::positive(addr("0"), [1]),
                Action::negative(addr("0.1"), [1, 2]),
                Action::positive(addr("0.1.1"), Vec::new()),
                Action::positive(addr("0.1.2"), Vec::new()),
            ],
        );
        let neg = design("o", vec![Action::negative(addr("0.1"), [1, 2])]);
        let err = interact(&pos, &neg, 8, &[]).expect_err("ambiguous");
        assert!(matches!(
            err,
            InteractionError::NonDeterministicDesign {
                side: Polarity::Positive,
                ..
            }
        ));
    }

    #[test]
    fn positive_leaf_converges_without_pairs() {
        let pos = design("p", vec![Action::positive(addr("0"), Vec::new())]);
        let neg = design("o", vec![Action::daimon(addr("0.1"))]);
        let dispute = interact(&pos, &neg, 0, &[]).expect("ok");
        assert_eq!(dispute.status, DisputeStatus::Convergent);
        assert!(dispute.pairs.is_empty());
    }

    #[test]
    fn negative_base_cannot_lead() {
        let neg_only = design("o", vec![Action::daimon(addr("0.1"))]);
        let dispute = interact(&neg_only, &claim(), 4, &[]).expect("ok");
        assert_eq!(dispute.status, DisputeStatus::Divergent);
        assert_eq!(dispute.stuck_at, Some(addr("0.1")));
        assert_eq!(dispute.winner, Some(Polarity::Negative));
    }

    #[test]
    fn stuck_positive_side_loses() {
        let neg = design("o", vec![Action::negative(addr("0.1"), [2])]);
        let dispute = interact(&claim(), &neg, 8, &[]).expect("ok");
        assert_eq!(dispute.status, DisputeStatus::Divergent);
        assert_eq!(dispute.stuck_at, Some(addr("0.1")));
        assert_eq!(dispute.winner, Some(Polarity::Negative));
    }
}
