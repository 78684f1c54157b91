//! Type judgments `D : A`.

use ludics_types::{Action, Design, DesignId};
use serde::{Deserialize, Serialize};

use super::expr::{Substitution, TypeExpr, TypeKind, is_subtype, unify};
use super::infer::{InferenceMethod, infer, infer_structural};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMethod {
    /// Compare the design's shape with the target's constructor.
    Structural,
    /// Infer a type and compare it with the target.
    Inference,
    /// Average of both.
    Combined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralAnalysis {
    pub design_pattern: TypeKind,
    pub target_kind: TypeKind,
    pub matches: bool,
    pub depth: usize,
    pub root_branching: usize,
    pub depth_match: bool,
    pub branching_match: bool,
    pub mismatches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceAnalysis {
    pub inferred: TypeExpr,
    pub confidence: f64,
    pub exact_match: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unifier: Option<Substitution>,
    pub is_subtype: bool,
    pub types_match: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCheckAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structural: Option<StructuralAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference: Option<InferenceAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeJudgment {
    /// `D : A`, with the design's short id.
    pub judgment: String,
    pub design: DesignId,
    pub target: TypeExpr,
    pub method: CheckMethod,
    pub is_valid: bool,
    pub confidence: f64,
    pub analysis: TypeCheckAnalysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub suggestions: Vec<String>,
}

const STRUCTURAL_MATCH: f64 = 0.85;
const INFERENCE_MATCH: f64 = 0.75;

/// Check `design` against `target`. Never fails; a negative verdict
/// carries its reasons.
#[must_use]
pub fn check(design: &Design, target: &TypeExpr, method: CheckMethod) -> TypeJudgment {
    let structural = matches!(method, CheckMethod::Structural | CheckMethod::Combined)
        .then(|| structural_analysis(design, target));
    let inference = matches!(method, CheckMethod::Inference | CheckMethod::Combined)
        .then(|| inference_analysis(design, target));

    let mut scores = Vec::new();
    if let Some(s) = &structural {
        scores.push(if s.matches {
            STRUCTURAL_MATCH
        } else {
            1.0 - STRUCTURAL_MATCH
        });
    }
    if let Some(i) = &inference {
        scores.push(if i.types_match {
            INFERENCE_MATCH
        } else {
            1.0 - INFERENCE_MATCH
        });
    }
    let confidence = if scores.is_empty() {
        0.5
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    let is_valid = confidence > 0.5;

    let analysis = TypeCheckAnalysis {
        structural,
        inference,
    };
    let (failure_reason, suggestions) = if is_valid {
        (None, Vec::new())
    } else {
        (
            Some(failure_reason(&analysis, target)),
            suggestions(&analysis, target),
        )
    };

    tracing::debug!(
        design = design.id().short(),
        %target,
        is_valid,
        confidence,
        "type check"
    );

    TypeJudgment {
        judgment: format!("{} : {target}", design.id().short()),
        design: design.id().clone(),
        target: target.clone(),
        method,
        is_valid,
        confidence,
        analysis,
        failure_reason,
        suggestions,
    }
}

fn structural_analysis(design: &Design, target: &TypeExpr) -> StructuralAnalysis {
    let design_pattern = infer_structural(design).type_expr.kind();
    let target_kind = target.kind();
    let depth = design.depth();
    let root_branching = design
        .actions()
        .first()
        .map_or(0, |root| root.ramification.len());
    let lone_daimon =
        design.action_count() == 1 && design.actions().iter().all(Action::is_daimon);

    let mut depth_match = true;
    let mut branching_match = true;
    let mut mismatches = Vec::new();
    match target_kind {
        TypeKind::Arrow => {
            depth_match = depth >= 3;
            if !depth_match {
                mismatches.push(format!("an arrow needs at least 3 levels, found {depth}"));
            }
        }
        TypeKind::Product => {
            branching_match = root_branching >= 2;
            if !branching_match {
                mismatches.push(format!(
                    "a product needs at least 2 branches at the root, found {root_branching}"
                ));
            }
        }
        TypeKind::Sum => {
            branching_match = root_branching == 1;
            if !branching_match {
                mismatches.push(format!(
                    "a sum needs exactly one branch at the root, found {root_branching}"
                ));
            }
        }
        TypeKind::Unit => {
            branching_match = lone_daimon;
            if !branching_match {
                mismatches.push(format!(
                    "unit needs a lone daimon, found {} actions",
                    design.action_count()
                ));
            }
        }
        TypeKind::Base => {
            branching_match = root_branching == 0;
            if !branching_match {
                mismatches.push(format!(
                    "a base type needs a root that opens nothing, found {root_branching} branches"
                ));
            }
        }
        TypeKind::Void => {
            branching_match = false;
            mismatches.push("no design inhabits the empty type".to_string());
        }
        TypeKind::Variable => {}
    }

    let kind_match = target_kind == TypeKind::Variable || design_pattern == target_kind;
    StructuralAnalysis {
        design_pattern,
        target_kind,
        matches: kind_match && depth_match && branching_match,
        depth,
        root_branching,
        depth_match,
        branching_match,
        mismatches,
    }
}

fn inference_analysis(design: &Design, target: &TypeExpr) -> InferenceAnalysis {
    let inferred = infer(design, InferenceMethod::Auto).type_expr;
    let exact_match = &inferred == target;
    let unifier = unify(&inferred, target);
    let is_subtype = is_subtype(&inferred, target);
    InferenceAnalysis {
        types_match: exact_match || unifier.is_some() || is_subtype,
        confidence: INFERENCE_MATCH,
        exact_match,
        unifier,
        is_subtype,
        inferred,
    }
}

fn failure_reason(analysis: &TypeCheckAnalysis, target: &TypeExpr) -> String {
    let mut reasons = Vec::new();
    if let Some(s) = analysis.structural.as_ref().filter(|s| !s.matches) {
        reasons.push(format!(
            "design has {} shape, expected {}",
            s.design_pattern, s.target_kind
        ));
        reasons.extend(s.mismatches.iter().cloned());
    }
    if let Some(i) = analysis.inference.as_ref().filter(|i| !i.types_match) {
        reasons.push(format!("inferred type {} does not match {target}", i.inferred));
    }
    reasons.join("; ")
}

fn suggestions(analysis: &TypeCheckAnalysis, target: &TypeExpr) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(s) = &analysis.structural {
        match target.kind() {
            TypeKind::Arrow if !s.depth_match => {
                out.push(
                    "add answers at deeper loci so the design runs from input to output"
                        .to_string(),
                );
            }
            TypeKind::Product if !s.branching_match => {
                out.push("open at least two loci at the root".to_string());
            }
            TypeKind::Unit if s.design_pattern != TypeKind::Unit => {
                out.push("reduce the design to a single daimon".to_string());
            }
            _ => {}
        }
    }
    if let Some(i) = &analysis.inference
        && i.inferred.kind() != target.kind()
    {
        out.push(format!(
            "the design reads as {}; try checking it against {}",
            i.inferred.kind(),
            i.inferred
        ));
    }
    out
}
