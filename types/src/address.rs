//! Loci: positions in a design's justification tree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Glyph used when rendering the empty address.
const ROOT_GLYPH: &str = "ε";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid address {input:?}: segment {segment:?} is not a natural number")]
pub struct AddressError {
    pub input: String,
    pub segment: String,
}

/// A locus, written `0.1.2`.
///
/// Ordering is lexicographic over the integer segments, so every address
/// sorts before its extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(Vec<u32>);

impl Address {
    /// The empty address. Dialogues conventionally use `0` as their base instead.
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn from_segments(segments: impl Into<Vec<u32>>) -> Self {
        Self(segments.into())
    }

    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == ROOT_GLYPH {
            return Ok(Self::root());
        }
        trimmed
            .split('.')
            .map(|segment| {
                segment.trim().parse::<u32>().map_err(|_| AddressError {
                    input: input.to_string(),
                    segment: segment.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    #[must_use]
    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Drops the last segment. `None` for the empty address.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    #[must_use]
    pub fn last_index(&self) -> Option<u32> {
        self.0.last().copied()
    }

    #[must_use]
    pub fn child(&self, index: u32) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(index);
        Self(segments)
    }

    /// Non-strict: every address is a prefix of itself.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Duality lives on polarities, so the locus is unchanged.
    #[must_use]
    pub fn dual(&self) -> Self {
        self.clone()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(ROOT_GLYPH);
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rendered = self
            .0
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".");
        serializer.serialize_str(&rendered)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
