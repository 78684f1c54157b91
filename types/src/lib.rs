//! Core domain types for the Ludics engine.
//!
//! Loci, actions, compiled designs and the sequences derived from them.
//! Pure data with no IO and no async; every other layer builds on this crate.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod action;
mod address;
mod design;
mod ids;
mod play;

pub use action::{Action, ActionKey, Polarity};
pub use address::{Address, AddressError};
pub use design::{ActionId, Design, DesignError, DesignRecord, RawAction};
pub use ids::{DesignId, StrategyId, content_hash, hash_json};
pub use play::{Chronicle, View, common_prefix_len, sequence_keys};
