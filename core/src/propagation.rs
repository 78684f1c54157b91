//! Propagation: address discipline across diverging views.

use std::collections::{BTreeMap, BTreeSet};

use ludics_types::{Address, Polarity, View};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropagationViolationKind {
    SliceLinearity,
    PairPropagation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationViolation {
    pub kind: PropagationViolationKind,
    pub addresses: Vec<Address>,
    pub prefix_len: usize,
    pub views: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationReport {
    pub satisfies_propagation: bool,
    pub satisfies_slice_linearity: bool,
    pub satisfies_pair_propagation: bool,
    pub violations: Vec<PropagationViolation>,
}

#[must_use]
pub fn check_propagation(views: &[View]) -> PropagationReport {
    let mut violations = slice_linearity(views);
    let satisfies_slice_linearity = violations.is_empty();
    let pairing = pair_propagation(views);
    let satisfies_pair_propagation = pairing.is_empty();
    violations.extend(pairing);

    PropagationReport {
        satisfies_propagation: satisfies_slice_linearity && satisfies_pair_propagation,
        satisfies_slice_linearity,
        satisfies_pair_propagation,
        violations,
    }
}

/// Once two views part ways after a shared prefix, the loci each goes on to
/// use must be disjoint.
fn slice_linearity(views: &[View]) -> Vec<PropagationViolation> {
    let mut out = Vec::new();
    for i in 0..views.len() {
        for j in (i + 1)..views.len() {
            let (a, b) = (&views[i], &views[j]);
            let k = a.common_prefix_len(b);
            // k == 0: the views open with different actions on the base,
            // which both use. Nested views extend one another.
            if k == 0 || k == a.len() || k == b.len() {
                continue;
            }
            let after_a: BTreeSet<&Address> = a.actions[k..].iter().map(|x| &x.focus).collect();
            let after_b: BTreeSet<&Address> = b.actions[k..].iter().map(|x| &x.focus).collect();
            for shared in after_a.intersection(&after_b) {
                out.push(PropagationViolation {
                    kind: PropagationViolationKind::SliceLinearity,
                    addresses: vec![(*shared).clone()],
                    prefix_len: k,
                    views: vec![i, j],
                });
            }
        }
    }
    out
}

/// A negative locus is introduced right after the positive move that
/// opened it. It must follow the same positive locus everywhere it appears.
fn pair_propagation(views: &[View]) -> Vec<PropagationViolation> {
    // negative locus -> positive locus -> first view showing that pairing
    let mut partners: BTreeMap<&Address, BTreeMap<&Address, usize>> = BTreeMap::new();
    let mut unpaired: Vec<(&Address, usize)> = Vec::new();

    for (i, view) in views.iter().enumerate() {
        for (pos, action) in view.actions.iter().enumerate() {
            if action.polarity != Polarity::Negative {
                continue;
            }
            match pos.checked_sub(1).map(|p| &view.actions[p]) {
                Some(prev) if prev.polarity == Polarity::Positive => {
                    partners
                        .entry(&action.focus)
                        .or_default()
                        .entry(&prev.focus)
                        .or_insert(i);
                }
                _ => unpaired.push((&action.focus, i)),
            }
        }
    }

    let mut out = Vec::new();
    for (negative, positives) in &partners {
        if positives.len() < 2 {
            continue;
        }
        let mut addresses = vec![(*negative).clone()];
        addresses.extend(positives.keys().map(|p| (*p).clone()));
        let witnesses: Vec<usize> = positives.values().copied().collect();
        out.push(PropagationViolation {
            kind: PropagationViolationKind::PairPropagation,
            addresses,
            prefix_len: shared_prefix(views, &witnesses),
            views: witnesses,
        });
    }
    for (negative, i) in unpaired {
        let Some(positives) = partners.get(negative) else {
            continue;
        };
        let mut addresses = vec![negative.clone()];
        addresses.extend(positives.keys().map(|p| (*p).clone()));
        let mut witnesses = vec![i];
        witnesses.extend(positives.values().copied());
        out.push(PropagationViolation {
            kind: PropagationViolationKind::PairPropagation,
            addresses,
            prefix_len: shared_prefix(views, &witnesses),
            views: witnesses,
        });
    }
    out
}

fn shared_prefix(views: &[View], indices: &[usize]) -> usize {
    let Some((&first, rest)) = indices.split_first() else {
        return 0;
    };
    rest.iter()
        .map(|&j| views[first].common_prefix_len(&views[j]))
        .min()
        .unwrap_or(views[first].len())
}
