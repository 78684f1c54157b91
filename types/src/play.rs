//! Sequences of actions derived from designs: chronicles and views.

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionKey, Polarity};

/// Semantic keys of a sequence of actions.
#[must_use]
pub fn sequence_keys(actions: &[Action]) -> Vec<ActionKey> {
    actions.iter().map(Action::key).collect()
}

/// Number of leading positions on which two sequences agree.
#[must_use]
pub fn common_prefix_len(a: &[Action], b: &[Action]) -> usize {
    a.iter()
        .zip(b)
        .take_while(|(x, y)| x.key() == y.key())
        .count()
}

/// A root-to-leaf branch of a design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chronicle {
    pub actions: Vec<Action>,
    pub is_maximal: bool,
    /// Ends with a terminal move of the design's own polarity.
    pub is_positive: bool,
}

impl Chronicle {
    /// Tag a branch for `player`.
    #[must_use]
    pub fn new(actions: Vec<Action>, player: Polarity, is_maximal: bool) -> Self {
        let is_positive = actions.last().is_some_and(|last| {
            last.polarity == player && (last.is_daimon() || last.is_positive_leaf())
        });
        Self {
            actions,
            is_maximal,
            is_positive,
        }
    }

    #[must_use]
    pub fn keys(&self) -> Vec<ActionKey> {
        sequence_keys(&self.actions)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Action> {
        self.actions.last()
    }

    #[must_use]
    pub fn ends_in_daimon(&self) -> bool {
        self.last().is_some_and(Action::is_daimon)
    }
}

/// One player's visible subsequence of a play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub player: Polarity,
    pub actions: Vec<Action>,
}

impl View {
    #[must_use]
    pub fn new(player: Polarity, actions: Vec<Action>) -> Self {
        Self { player, actions }
    }

    #[must_use]
    pub fn keys(&self) -> Vec<ActionKey> {
        sequence_keys(&self.actions)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Action> {
        self.actions.last()
    }

    #[must_use]
    pub fn common_prefix_len(&self, other: &Self) -> usize {
        common_prefix_len(&self.actions, &other.actions)
    }

    /// Non-strict prefix on action keys.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.common_prefix_len(other) == self.len()
    }

    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            player: self.player,
            actions: self.actions[..len.min(self.actions.len())].to_vec(),
        }
    }

    /// Whether the last move belongs to the view's player.
    #[must_use]
    pub fn ends_with_player(&self) -> bool {
        self.last().is_some_and(|a| a.polarity == self.player)
    }
}
