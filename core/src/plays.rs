//! Reconstruction of plays from a view set.
//!
//! A play is a legal interleaving: alternating, linear (no locus is played
//! twice with the same polarity) and such that the view of every prefix
//! belongs to the view set. Enumeration is bounded; a truncated result is
//! reported, never silently returned as complete.

use std::collections::{BTreeSet, HashSet};

use ludics_types::{Action, ActionKey, Polarity, View, sequence_keys};
use serde::{Deserialize, Serialize};

use crate::views::view_of;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaySet {
    pub player: Polarity,
    /// Every non-empty play, prefix closed, in depth-first order.
    pub plays: Vec<Vec<Action>>,
    /// False when the bound cut the enumeration short.
    pub complete: bool,
}

impl PlaySet {
    #[must_use]
    pub fn keys(&self) -> BTreeSet<Vec<ActionKey>> {
        self.plays.iter().map(|p| sequence_keys(p)).collect()
    }

    /// Plays no other play extends.
    #[must_use]
    pub fn maximal(&self) -> Vec<&[Action]> {
        let keys: Vec<Vec<ActionKey>> = self.plays.iter().map(|p| sequence_keys(p)).collect();
        self.plays
            .iter()
            .zip(&keys)
            .filter(|(_, k)| {
                !keys
                    .iter()
                    .any(|other| other.len() > k.len() && other.starts_with(k))
            })
            .map(|(p, _)| p.as_slice())
            .collect()
    }
}

/// Enumerate the plays whose prefixes all have their view in `views`.
#[must_use]
pub fn plays_of(views: &[View], player: Polarity, max_plays: usize) -> PlaySet {
    let allowed: HashSet<Vec<ActionKey>> = views.iter().map(View::keys).collect();

    let mut seen = HashSet::new();
    let mut alphabet: Vec<Action> = views
        .iter()
        .flat_map(|v| v.actions.iter())
        .filter(|a| seen.insert(a.key()))
        .cloned()
        .collect();
    alphabet.sort_by_key(Action::key);

    let mut plays = Vec::new();
    let mut complete = true;
    let mut stack: Vec<Vec<Action>> = vec![Vec::new()];

    'search: while let Some(play) = stack.pop() {
        let mut extensions = Vec::new();
        for candidate in &alphabet {
            if let Some(last) = play.last()
                && last.polarity == candidate.polarity
            {
                continue;
            }
            let reused = play
                .iter()
                .any(|a| a.focus == candidate.focus && a.polarity == candidate.polarity);
            if reused {
                continue;
            }
            let mut next = play.clone();
            next.push(candidate.clone());
            if allowed.contains(&view_of(&next, player).keys()) {
                extensions.push(next);
            }
        }
        for next in extensions.into_iter().rev() {
            if plays.len() >= max_plays {
                complete = false;
                tracing::debug!(max_plays, "play enumeration truncated");
                break 'search;
            }
            plays.push(next.clone());
            stack.push(next);
        }
    }

    PlaySet {
        player,
        plays,
        complete,
    }
}

/// Views of every prefix of every play.
#[must_use]
pub fn views_of_plays(plays: &[Vec<Action>], player: Polarity) -> Vec<View> {
    let mut seen = HashSet::new();
    let mut views = Vec::new();
    for play in plays {
        for len in 1..=play.len() {
            let view = view_of(&play[..len], player);
            if seen.insert(view.keys()) {
                views.push(view);
            }
        }
    }
    views
}

/// Set form of a view collection, for equality checks.
#[must_use]
pub fn view_key_set(views: &[View]) -> BTreeSet<Vec<ActionKey>> {
    views.iter().map(View::keys).collect()
}
