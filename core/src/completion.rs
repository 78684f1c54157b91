//! Design completion and shape metrics.

use ludics_types::{Action, Address, Design, DesignError, Polarity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStats {
    pub daimons_added: usize,
    /// Loci that received a daimon, in order.
    pub completion_points: Vec<Address>,
    pub was_already_complete: bool,
}

/// Loci opened by a positive action that the design never answers.
#[must_use]
pub fn open_loci(design: &Design) -> Vec<Address> {
    design
        .actions()
        .iter()
        .filter(|a| a.polarity == Polarity::Positive)
        .flat_map(Action::opened)
        .filter(|locus| design.find(locus, Polarity::Negative).is_none())
        .collect()
}

#[must_use]
pub fn is_complete(design: &Design) -> bool {
    open_loci(design).is_empty()
}

/// A design that never gives up.
#[must_use]
pub fn is_winning(design: &Design) -> bool {
    !design.actions().iter().any(Action::is_daimon)
}

/// Close every unanswered locus with a daimon.
///
/// The owner is kept, so a design that was already complete comes back
/// with the same id.
pub fn complete_design(design: &Design) -> Result<(Design, CompletionStats), DesignError> {
    let points = open_loci(design);
    let stats = CompletionStats {
        daimons_added: points.len(),
        completion_points: points.clone(),
        was_already_complete: points.is_empty(),
    };
    if stats.was_already_complete {
        return Ok((design.clone(), stats));
    }

    let mut acts = design.actions().to_vec();
    acts.extend(points.into_iter().map(Action::daimon));
    let completed = Design::compile(design.owner(), acts)?;
    tracing::debug!(
        design = design.id().short(),
        added = stats.daimons_added,
        "design completed"
    );
    Ok((completed, stats))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignMetrics {
    pub depth: usize,
    /// Largest number of actions at one tree level.
    pub width: usize,
    pub action_count: usize,
    pub locus_count: usize,
    pub chronicle_count: usize,
    pub daimon_count: usize,
}

#[must_use]
pub fn design_metrics(design: &Design) -> DesignMetrics {
    let mut per_level: Vec<usize> = Vec::new();
    let mut frontier = design.roots().to_vec();
    while !frontier.is_empty() {
        per_level.push(frontier.len());
        frontier = frontier
            .iter()
            .flat_map(|id| design.children(*id).iter().copied())
            .collect();
    }

    DesignMetrics {
        depth: per_level.len(),
        width: per_level.iter().copied().max().unwrap_or(0),
        action_count: design.action_count(),
        locus_count: design.loci().len(),
        chronicle_count: design.branches().len(),
        daimon_count: design.actions().iter().filter(|a| a.is_daimon()).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::parse(s).expect("valid address")
    }

    fn open_claim() -> Design {
        Design::compile(
            "p",
            vec![
                Action::positive(addr("0"), [1, 2]),
                Action::negative(addr("0.1"), [1]),
                Action::positive(addr("0.1.1"), [3]),
            ],
        )
        .expect("valid design")
    }

    #[test]
    fn completion_adds_daimons_where_unanswered() {
        let design = open_claim();
        assert!(!is_complete(&design));
        assert!(is_winning(&design));

        let (completed, stats) = complete_design(&design).expect("completes");
        assert_eq!(stats.daimons_added, 2);
        assert_eq!(stats.completion_points, vec![addr("0.2"), addr("0.1.1.3")]);
        assert!(!stats.was_already_complete);
        assert!(is_complete(&completed));
        assert!(!is_winning(&completed));
        assert_eq!(completed.owner(), design.owner());
    }

    #[test]
    fn complete_design_is_returned_unchanged() {
        let (completed, _) = complete_design(&open_claim()).expect("completes");
        let (again, stats) = complete_design(&completed).expect("completes");
        assert!(stats.was_already_complete);
        assert_eq!(stats.daimons_added, 0);
        assert_eq!(again.id(), completed.id());
    }

    #[test]
    fn metrics_describe_shape() {
        let (completed, _) = complete_design(&open_claim()).expect("completes");
        let metrics = design_metrics(&completed);
        assert_eq!(
            metrics,
            DesignMetrics {
                depth: 4,
                width: 2,
                action_count: 5,
                locus_count: 5,
                chronicle_count: 2,
                daimon_count: 2,
            }
        );
    }
}
