//! Compiled designs: immutable justification trees of actions.
//!
//! Construction goes through [`Design::compile`], which checks every
//! structural invariant. A design that exists is well formed; derived
//! artifacts (views, chronicles, strategies) never mutate it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{Action, ActionKey, Polarity};
use crate::address::{Address, AddressError};
use crate::ids::{DesignId, content_hash};
use crate::play::Chronicle;

// ── Errors ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignError {
    #[error("a design needs at least one action")]
    EmptyDesign,
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),
    #[error("action {position} at {focus} lists child {index} more than once")]
    InvalidRamification {
        position: usize,
        focus: Address,
        index: u32,
    },
    #[error("action {position} ({polarity} at {focus}) has no earlier action opening its locus")]
    UnjustifiedAction {
        position: usize,
        focus: Address,
        polarity: Polarity,
    },
    #[error("two {polarity} actions at {focus}")]
    DuplicateAction { focus: Address, polarity: Polarity },
    #[error("action at {focus} continues past the daimon at {daimon}")]
    MisplacedDaimon { focus: Address, daimon: Address },
}

impl DesignError {
    /// Stable name of the failure, used on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyDesign => "EmptyDesign",
            Self::InvalidAddress(_) => "InvalidAddress",
            Self::InvalidRamification { .. } => "InvalidRamification",
            Self::UnjustifiedAction { .. } => "UnjustifiedAction",
            Self::DuplicateAction { .. } => "DuplicateAction",
            Self::MisplacedDaimon { .. } => "MisplacedDaimon",
        }
    }
}

// ── Raw input ────────────────────────────────────────────────

/// An act as produced upstream, before its focus has been parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAction {
    pub polarity: Polarity,
    pub focus: String,
    #[serde(default)]
    pub ramification: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl TryFrom<RawAction> for Action {
    type Error = AddressError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        Ok(Self {
            polarity: raw.polarity,
            focus: Address::parse(&raw.focus)?,
            ramification: raw.ramification,
            expression: raw.expression,
        })
    }
}

// ── Arena ────────────────────────────────────────────────────

/// Index of an action inside one design's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(u32);

impl ActionId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Serialized form: the owner plus the acts in compile order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignRecord {
    pub owner: String,
    pub acts: Vec<Action>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(into = "DesignRecord")]
pub struct Design {
    id: DesignId,
    owner: String,
    base: Address,
    polarity: Polarity,
    actions: Vec<Action>,
    parents: Vec<Option<ActionId>>,
    children: Vec<Vec<ActionId>>,
    roots: Vec<ActionId>,
    index: HashMap<(Address, Polarity), ActionId>,
}

impl From<Design> for DesignRecord {
    fn from(design: Design) -> Self {
        Self {
            owner: design.owner,
            acts: design.actions,
        }
    }
}

impl<'de> Deserialize<'de> for Design {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let record = DesignRecord::deserialize(deserializer)?;
        Design::compile(record.owner, record.acts).map_err(D::Error::custom)
    }
}

impl PartialEq for Design {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Design {}

impl Design {
    /// Build the justification tree.
    ///
    /// The first act fixes the base locus. Acts focused on the base are
    /// initial; every other act at `p.i` must follow an act at `p` of the
    /// opposite polarity whose ramification contains `i`.
    pub fn compile(owner: impl Into<String>, acts: Vec<Action>) -> Result<Self, DesignError> {
        let owner = owner.into();
        let Some(first) = acts.first() else {
            return Err(DesignError::EmptyDesign);
        };
        let base = first.focus.clone();
        let polarity = first.polarity;

        let mut parents = Vec::with_capacity(acts.len());
        let mut children: Vec<Vec<ActionId>> = Vec::with_capacity(acts.len());
        let mut roots = Vec::new();
        let mut index: HashMap<(Address, Polarity), ActionId> = HashMap::new();

        for (position, act) in acts.iter().enumerate() {
            let mut seen = HashSet::new();
            if let Some(&repeated) = act.ramification.iter().find(|i| !seen.insert(**i)) {
                return Err(DesignError::InvalidRamification {
                    position,
                    focus: act.focus.clone(),
                    index: repeated,
                });
            }

            let slot = (act.focus.clone(), act.polarity);
            if index.contains_key(&slot) {
                return Err(DesignError::DuplicateAction {
                    focus: act.focus.clone(),
                    polarity: act.polarity,
                });
            }

            let id = ActionId(position as u32);
            let parent = if act.focus == base {
                roots.push(id);
                None
            } else {
                Some(justifier(&acts, &index, position, act)?)
            };
            if let Some(parent) = parent {
                children[parent.index()].push(id);
            }

            parents.push(parent);
            children.push(Vec::new());
            index.insert(slot, id);
        }

        for siblings in &mut children {
            siblings.sort_by(|a, b| acts[a.index()].key().cmp(&acts[b.index()].key()));
        }
        roots.sort_by(|a, b| acts[a.index()].key().cmp(&acts[b.index()].key()));

        let id = design_id(&owner, &base, &acts);
        Ok(Self {
            id,
            owner,
            base,
            polarity,
            actions: acts,
            parents,
            children,
            roots,
            index,
        })
    }

    /// Compile acts whose foci are still strings.
    pub fn compile_raw(owner: impl Into<String>, raw: Vec<RawAction>) -> Result<Self, DesignError> {
        let acts = raw
            .into_iter()
            .map(Action::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::compile(owner, acts)
    }

    /// Rebuild a design from branches. Actions shared by several
    /// chronicles are kept once, in first-seen order.
    pub fn from_chronicles(
        owner: impl Into<String>,
        chronicles: &[Chronicle],
    ) -> Result<Self, DesignError> {
        let mut seen = HashSet::new();
        let acts: Vec<Action> = chronicles
            .iter()
            .flat_map(|c| c.actions.iter())
            .filter(|a| seen.insert(a.key()))
            .cloned()
            .collect();
        Self::compile(owner, acts)
    }

    /// The same tree with every polarity flipped.
    #[must_use]
    pub fn dual(&self) -> Self {
        let actions: Vec<Action> = self.actions.iter().map(Action::flipped).collect();
        let index = self
            .index
            .iter()
            .map(|((focus, polarity), id)| ((focus.clone(), polarity.flip()), *id))
            .collect();
        Self {
            id: design_id(&self.owner, &self.base, &actions),
            owner: self.owner.clone(),
            base: self.base.clone(),
            polarity: self.polarity.flip(),
            actions,
            parents: self.parents.clone(),
            children: self.children.clone(),
            roots: self.roots.clone(),
            index,
        }
    }

    #[must_use]
    pub fn id(&self) -> &DesignId {
        &self.id
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn base(&self) -> &Address {
        &self.base
    }

    /// Polarity of the first initial action.
    #[must_use]
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(id.index())
    }

    pub fn action_ids(&self) -> impl Iterator<Item = ActionId> + '_ {
        (0..self.actions.len()).map(|i| ActionId(i as u32))
    }

    #[must_use]
    pub fn roots(&self) -> &[ActionId] {
        &self.roots
    }

    #[must_use]
    pub fn parent(&self, id: ActionId) -> Option<ActionId> {
        self.parents.get(id.index()).copied().flatten()
    }

    #[must_use]
    pub fn children(&self, id: ActionId) -> &[ActionId] {
        self.children.get(id.index()).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn find(&self, focus: &Address, polarity: Polarity) -> Option<ActionId> {
        self.index.get(&(focus.clone(), polarity)).copied()
    }

    #[must_use]
    pub fn action_at(&self, focus: &Address, polarity: Polarity) -> Option<&Action> {
        self.find(focus, polarity).and_then(|id| self.action(id))
    }

    /// Every distinct locus carrying an action.
    #[must_use]
    pub fn loci(&self) -> Vec<Address> {
        let mut loci: Vec<Address> = self.actions.iter().map(|a| a.focus.clone()).collect();
        loci.sort();
        loci.dedup();
        loci
    }

    /// Semantic action set (expressions ignored).
    #[must_use]
    pub fn action_keys(&self) -> Vec<ActionKey> {
        let mut keys: Vec<ActionKey> = self.actions.iter().map(Action::key).collect();
        keys.sort();
        keys
    }

    /// Justification edges keyed by action, used to compare designs up to
    /// labels and compile order.
    #[must_use]
    pub fn justification_edges(&self) -> BTreeMap<ActionKey, Option<ActionKey>> {
        self.action_ids()
            .map(|id| {
                let key = self.actions[id.index()].key();
                let parent = self.parent(id).map(|p| self.actions[p.index()].key());
                (key, parent)
            })
            .collect()
    }

    #[must_use]
    pub fn same_structure(&self, other: &Self) -> bool {
        self.justification_edges() == other.justification_edges()
    }

    /// Root-to-leaf paths of the justification tree, as arena ids.
    #[must_use]
    pub fn branches(&self) -> Vec<Vec<ActionId>> {
        let mut out = Vec::new();
        let mut stack: Vec<Vec<ActionId>> = self.roots.iter().rev().map(|r| vec![*r]).collect();
        while let Some(path) = stack.pop() {
            let Some(&last) = path.last() else {
                continue;
            };
            let kids = self.children(last);
            if kids.is_empty() {
                out.push(path);
                continue;
            }
            for kid in kids.iter().rev() {
                let mut next = path.clone();
                next.push(*kid);
                stack.push(next);
            }
        }
        out
    }

    /// Length of the longest branch.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.branches().iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Locate the action that opened `act.focus` among the acts before `position`.
fn justifier(
    acts: &[Action],
    index: &HashMap<(Address, Polarity), ActionId>,
    position: usize,
    act: &Action,
) -> Result<ActionId, DesignError> {
    let unjustified = || DesignError::UnjustifiedAction {
        position,
        focus: act.focus.clone(),
        polarity: act.polarity,
    };
    let parent_locus = act.focus.parent().ok_or_else(unjustified)?;

    if let Some(&candidate) = index.get(&(parent_locus.clone(), act.polarity.flip()))
        && acts[candidate.index()].opens(&act.focus)
    {
        return Ok(candidate);
    }

    let after_daimon = index
        .get(&(parent_locus.clone(), Polarity::Negative))
        .is_some_and(|id| acts[id.index()].is_daimon());
    if after_daimon {
        return Err(DesignError::MisplacedDaimon {
            focus: act.focus.clone(),
            daimon: parent_locus,
        });
    }
    Err(unjustified())
}

fn design_id(owner: &str, base: &Address, acts: &[Action]) -> DesignId {
    let mut canonical: Vec<&Action> = acts.iter().collect();
    canonical.sort_by(|a, b| {
        a.key()
            .cmp(&b.key())
            .then_with(|| a.expression.cmp(&b.expression))
    });
    let lines: Vec<String> = canonical
        .iter()
        .map(|act| format!("{} {:?}", act.key(), act.expression))
        .collect();
    let text = format!("{owner:?} {base}\n{}", lines.join("\n"));
    DesignId::new(content_hash(text.as_bytes()))
}
