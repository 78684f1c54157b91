//! Incarnation: containment of one design in another.

use std::collections::BTreeSet;

use ludics_types::{Action, ActionKey, Design, DesignId};
use serde::{Deserialize, Serialize};

use crate::views::extract_chronicles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncarnationMode {
    /// Every source action occurs in the target.
    Lax,
    /// Lax, and every target branch starts with some source branch.
    Sharp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncarnationReport {
    pub source: DesignId,
    pub target: DesignId,
    pub mode: IncarnationMode,
    pub is_valid: bool,
    /// Source actions found in the target.
    pub witness_actions: Vec<Action>,
    pub missing_actions: Vec<Action>,
    /// Target chronicles that extend no source chronicle. Always empty in
    /// lax mode.
    pub uncontained_chronicles: Vec<Vec<Action>>,
}

#[must_use]
pub fn check_incarnation(
    source: &Design,
    target: &Design,
    mode: IncarnationMode,
) -> IncarnationReport {
    let target_keys: BTreeSet<ActionKey> = target.action_keys().into_iter().collect();
    let (witness_actions, missing_actions): (Vec<Action>, Vec<Action>) = source
        .actions()
        .iter()
        .cloned()
        .partition(|a| target_keys.contains(&a.key()));

    let uncontained_chronicles = match mode {
        IncarnationMode::Lax => Vec::new(),
        IncarnationMode::Sharp => {
            let source_branches: Vec<Vec<ActionKey>> = extract_chronicles(source)
                .iter()
                .map(|c| c.keys())
                .collect();
            extract_chronicles(target)
                .into_iter()
                .filter(|c| {
                    let keys = c.keys();
                    !source_branches.iter().any(|s| keys.starts_with(s))
                })
                .map(|c| c.actions)
                .collect()
        }
    };

    IncarnationReport {
        source: source.id().clone(),
        target: target.id().clone(),
        mode,
        is_valid: missing_actions.is_empty() && uncontained_chronicles.is_empty(),
        witness_actions,
        missing_actions,
        uncontained_chronicles,
    }
}

/// The valid target with the fewest actions; ties go to the earlier one.
#[must_use]
pub fn most_specific_target<'a>(
    source: &Design,
    targets: &'a [Design],
    mode: IncarnationMode,
) -> Option<&'a Design> {
    targets
        .iter()
        .filter(|t| check_incarnation(source, t, mode).is_valid)
        .min_by_key(|t| t.action_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ludics_types::Address;

    fn addr(s: &str) -> Address {
        Address::parse(s).expect("valid address")
    }

    fn design(acts: Vec<Action>) -> Design {
        Design::compile("p", acts).expect("valid design")
    }

    fn small() -> Design {
        design(vec![
            Action::positive(addr("0"), [1]),
            Action::negative(addr("0.1"), [1]),
        ])
    }

    fn large() -> Design {
        design(vec![
            Action::positive(addr("0"), [1]),
            Action::negative(addr("0.1"), [1]),
            Action::positive(addr("0.1.1"), Vec::new()),
        ])
    }

    #[test]
    fn subset_incarnates_in_both_modes() {
        let lax = check_incarnation(&small(), &large(), IncarnationMode::Lax);
        assert!(lax.is_valid);
        assert_eq!(lax.witness_actions.len(), 2);
        assert!(lax.missing_actions.is_empty());

        let sharp = check_incarnation(&small(), &large(), IncarnationMode::Sharp);
        assert!(sharp.is_valid);
        assert_eq!(sharp.mode, IncarnationMode::Sharp);
    }

    #[test]
    fn missing_actions_are_listed() {
        let report = check_incarnation(&large(), &small(), IncarnationMode::Lax);
        assert!(!report.is_valid);
        assert_eq!(
            report.missing_actions,
            vec![Action::positive(addr("0.1.1"), Vec::new())]
        );
    }

    #[test]
    fn sharp_needs_branch_containment() {
        let source = design(vec![
            Action::positive(addr("0"), [1, 2]),
            Action::negative(addr("0.1"), [1]),
            Action::daimon(addr("0.2")),
        ]);
        let deeper = design(vec![
            Action::positive(addr("0"), [1, 2]),
            Action::negative(addr("0.1"), [1]),
            Action::positive(addr("0.1.1"), Vec::new()),
            Action::daimon(addr("0.2")),
        ]);
        assert!(check_incarnation(&source, &deeper, IncarnationMode::Sharp).is_valid);

        // The target's branch through 0.2 starts with no source branch.
        let narrow = design(vec![
            Action::positive(addr("0"), [1, 2]),
            Action::negative(addr("0.1"), [1]),
        ]);
        assert!(check_incarnation(&narrow, &source, IncarnationMode::Lax).is_valid);
        let report = check_incarnation(&narrow, &source, IncarnationMode::Sharp);
        assert!(!report.is_valid);
        assert!(report.missing_actions.is_empty());
        assert_eq!(
            report.uncontained_chronicles,
            vec![vec![
                Action::positive(addr("0"), [1, 2]),
                Action::daimon(addr("0.2")),
            ]]
        );
    }

    #[test]
    fn most_specific_prefers_fewer_actions() {
        let targets = vec![large(), small()];
        let best = most_specific_target(&small(), &targets, IncarnationMode::Lax).expect("found");
        assert_eq!(best.id(), small().id());
        assert!(most_specific_target(&large(), &[small()], IncarnationMode::Lax).is_none());
    }
}
