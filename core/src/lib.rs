//! Ludics analyses over compiled designs.
//!
//! Interaction between designs, the view and chronicle readings of a
//! design, strategies and their innocence, orthogonality and behaviours,
//! and a small type system. Everything here is synchronous and pure; the
//! engine crate adds caching and concurrency on top.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

pub mod behaviour;
pub mod completion;
pub mod correspondence;
pub mod interaction;
pub mod plays;
pub mod propagation;
pub mod strategy;
pub mod typesys;
pub mod views;

pub use behaviour::{
    Behaviour, BehaviourInclusion, BehaviourSpace, BehaviourValidation, ClosureLimits,
    ClosureReport, CounterExample, DesignOrthogonality, DesignRegistry, OrthogonalityMemo,
    OrthogonalityReport, behaviour_contained_in, behaviours_equal, biorthogonal_closure,
    designs_orthogonal, perp, strategies_orthogonal, strategy_designs,
};
pub use completion::{
    CompletionStats, DesignMetrics, complete_design, design_metrics, is_complete, is_winning,
    open_loci,
};
pub use correspondence::{CorrespondenceReport, IsomorphismCheck, Isomorphisms, verify_correspondence};
pub use interaction::{
    Dispute, DisputePair, DisputeStatus, InteractionError, interact, winner_of,
};
pub use plays::{PlaySet, plays_of, views_of_plays};
pub use propagation::{PropagationReport, PropagationViolation, check_propagation};
pub use strategy::{
    InnocenceReport, InnocenceViolation, InnocenceViolationKind, Strategy, check_innocence,
};
pub use views::{extract_chronicles, extract_views, maximal_views, view_of};
