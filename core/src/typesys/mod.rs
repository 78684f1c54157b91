//! Simple types over designs: expressions, inference, incarnation and
//! checking.

mod check;
mod expr;
mod incarnation;
mod infer;

pub use check::{
    CheckMethod, InferenceAnalysis, StructuralAnalysis, TypeCheckAnalysis, TypeJudgment, check,
};
pub use expr::{Substitution, TypeExpr, TypeKind, TypeParseError, is_subtype, type_name, unify};
pub use incarnation::{IncarnationMode, IncarnationReport, check_incarnation, most_specific_target};
pub use infer::{InferenceMethod, TypeInference, infer, infer_behavioural, infer_structural};
