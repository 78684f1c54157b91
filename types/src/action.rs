use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Polarity {
    #[serde(rename = "+", alias = "positive", alias = "P")]
    Positive,
    #[serde(rename = "-", alias = "negative", alias = "O")]
    Negative,
}

impl Polarity {
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }

    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            Self::Positive => '+',
            Self::Negative => '-',
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A move at a locus.
///
/// The ramification lists the child indices the action opens. A negative
/// action with an empty ramification is the daimon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub polarity: Polarity,
    pub focus: Address,
    #[serde(default)]
    pub ramification: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl Action {
    #[must_use]
    pub fn new(polarity: Polarity, focus: Address, ramification: impl Into<Vec<u32>>) -> Self {
        Self {
            polarity,
            focus,
            ramification: ramification.into(),
            expression: None,
        }
    }

    #[must_use]
    pub fn positive(focus: Address, ramification: impl Into<Vec<u32>>) -> Self {
        Self::new(Polarity::Positive, focus, ramification)
    }

    #[must_use]
    pub fn negative(focus: Address, ramification: impl Into<Vec<u32>>) -> Self {
        Self::new(Polarity::Negative, focus, ramification)
    }

    #[must_use]
    pub fn daimon(focus: Address) -> Self {
        Self::new(Polarity::Negative, focus, Vec::new())
    }

    #[must_use]
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    #[must_use]
    pub fn is_daimon(&self) -> bool {
        self.polarity == Polarity::Negative && self.ramification.is_empty()
    }

    /// A positive action that opens nothing ends its branch for the positive side.
    #[must_use]
    pub fn is_positive_leaf(&self) -> bool {
        self.polarity == Polarity::Positive && self.ramification.is_empty()
    }

    /// Whether this action is the one that opened `locus`.
    #[must_use]
    pub fn opens(&self, locus: &Address) -> bool {
        locus.parent().as_ref() == Some(&self.focus)
            && locus
                .last_index()
                .is_some_and(|i| self.ramification.contains(&i))
    }

    /// Child loci opened by this action, in ramification order.
    pub fn opened(&self) -> impl Iterator<Item = Address> + '_ {
        self.ramification.iter().map(|&i| self.focus.child(i))
    }

    #[must_use]
    pub fn key(&self) -> ActionKey {
        ActionKey {
            polarity: self.polarity,
            focus: self.focus.clone(),
            ramification: self.ramification.clone(),
        }
    }

    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            polarity: self.polarity.flip(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_daimon() {
            return write!(f, "†@{}", self.focus);
        }
        write!(f, "{}{}{{", self.polarity, self.focus)?;
        for (i, index) in self.ramification.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{index}")?;
        }
        f.write_str("}")
    }
}

/// Semantic identity of an action. Expressions are labels and never
/// take part in comparisons between views, chronicles or designs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionKey {
    pub polarity: Polarity,
    pub focus: Address,
    pub ramification: Vec<u32>,
}

impl From<&Action> for ActionKey {
    fn from(action: &Action) -> Self {
        action.key()
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = Action::new(self.polarity, self.focus.clone(), self.ramification.clone());
        fmt::Display::fmt(&action, f)
    }
}
