//! Views and chronicles.
//!
//! A view keeps what a player can see of a justified sequence: its own
//! moves, and for each opponent move only the part of the history that
//! leads to the move's justifier.

use std::collections::HashSet;

use ludics_types::{Action, ActionKey, Chronicle, Design, Polarity, View, sequence_keys};

/// Position of the move that justifies `seq[k]`: the latest earlier move
/// of the other polarity that opened its locus.
#[must_use]
pub fn justifier_index(seq: &[Action], k: usize) -> Option<usize> {
    let target = seq.get(k)?;
    seq[..k]
        .iter()
        .rposition(|a| a.polarity != target.polarity && a.opens(&target.focus))
}

/// The `player`-view of a justified sequence.
///
/// A player move extends the view of what precedes it. An opponent move
/// extends the view of the prefix ending at its justifier, or starts a
/// fresh view when it is initial.
#[must_use]
pub fn view_of(seq: &[Action], player: Polarity) -> View {
    let mut reversed = Vec::new();
    let mut end = seq.len();
    while end > 0 {
        let last = end - 1;
        let action = &seq[last];
        reversed.push(action.clone());
        if action.polarity == player {
            end = last;
        } else {
            match justifier_index(seq, last) {
                Some(j) => end = j + 1,
                None => break,
            }
        }
    }
    reversed.reverse();
    View::new(player, reversed)
}

/// Whether a sequence is its own view.
#[must_use]
pub fn is_view(seq: &[Action], player: Polarity) -> bool {
    view_of(seq, player).keys() == sequence_keys(seq)
}

/// All root-to-leaf branches of `design`, tagged for the design's player.
#[must_use]
pub fn extract_chronicles(design: &Design) -> Vec<Chronicle> {
    design
        .branches()
        .into_iter()
        .map(|branch| {
            let actions = branch
                .iter()
                .filter_map(|id| design.action(*id).cloned())
                .collect();
            Chronicle::new(actions, design.polarity(), true)
        })
        .collect()
}

/// Views of every non-empty prefix of every chronicle, without duplicates,
/// in discovery order.
#[must_use]
pub fn extract_views(design: &Design) -> Vec<View> {
    let player = design.polarity();
    let mut seen: HashSet<Vec<ActionKey>> = HashSet::new();
    let mut views = Vec::new();
    for chronicle in extract_chronicles(design) {
        for len in 1..=chronicle.len() {
            let view = view_of(&chronicle.actions[..len], player);
            if seen.insert(view.keys()) {
                views.push(view);
            }
        }
    }
    views
}

/// Views that are not a proper prefix of another view in the set.
#[must_use]
pub fn maximal_views(views: &[View]) -> Vec<View> {
    views
        .iter()
        .filter(|v| {
            !views
                .iter()
                .any(|w| w.len() > v.len() && v.is_prefix_of(w))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ludics_types::Address;

    fn addr(s: &str) -> Address {
        Address::parse(s).expect("valid address")
    }

    fn branching() -> Design {
        Design::compile(
            "p",
            vec![
                Action::positive(addr("0"), [1, 2]),
                Action::negative(addr("0.1"), [1]),
                Action::positive(addr("0.1.1"), Vec::new()),
                Action::daimon(addr("0.2")),
            ],
        )
        .expect("valid design")
    }

    fn rendered(view: &View) -> Vec<String> {
        view.actions.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn chronicles_are_branches() {
        let chronicles = extract_chronicles(&branching());
        assert_eq!(chronicles.len(), 2);
        assert!(chronicles.iter().all(|c| c.is_maximal));
        let lens: Vec<usize> = chronicles.iter().map(Chronicle::len).collect();
        assert_eq!(lens, [3, 2]);
        // The positive leaf closes the first branch for the positive player.
        assert!(chronicles[0].is_positive);
        assert!(!chronicles[1].is_positive);
    }

    #[test]
    fn views_cover_every_chronicle_prefix() {
        let views = extract_views(&branching());
        let all: Vec<Vec<String>> = views.iter().map(rendered).collect();
        assert_eq!(
            all,
            vec![
                vec!["+0{1,2}".to_string()],
                vec!["+0{1,2}".into(), "-0.1{1}".into()],
                vec!["+0{1,2}".into(), "-0.1{1}".into(), "+0.1.1{}".into()],
                vec!["+0{1,2}".into(), "†@0.2".into()],
            ]
        );
        assert_eq!(maximal_views(&views).len(), 2);
    }

    #[test]
    fn opponent_moves_jump_back_to_their_justifier() {
        // An interleaving: the opponent's second move answers the root, not
        // the player's last move.
        let seq = vec![
            Action::positive(addr("0"), [1, 2]),
            Action::negative(addr("0.1"), [1]),
            Action::positive(addr("0.1.1"), [1]),
            Action::negative(addr("0.2"), Vec::new()),
        ];
        let view = view_of(&seq, Polarity::Positive);
        assert_eq!(rendered(&view), ["+0{1,2}", "†@0.2"]);
        assert!(!is_view(&seq, Polarity::Positive));
        assert!(is_view(&view.actions, Polarity::Positive));
        assert_eq!(justifier_index(&seq, 3), Some(0));
        assert_eq!(justifier_index(&seq, 0), None);
    }

    #[test]
    fn initial_opponent_move_starts_a_fresh_view() {
        let seq = vec![
            Action::negative(addr("0"), [1]),
            Action::positive(addr("0.1"), [3]),
            Action::negative(addr("5"), Vec::new()),
        ];
        let view = view_of(&seq, Polarity::Positive);
        assert_eq!(rendered(&view), ["†@5"]);
    }
}
