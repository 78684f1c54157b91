//! Type inference from the shape of a design and from its chronicles.

use ludics_types::{Action, Design};
use serde::{Deserialize, Serialize};

use super::expr::{TypeExpr, TypeKind, type_name};
use crate::views::extract_chronicles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMethod {
    Structural,
    Behavioural,
    /// Run both, keep the more confident.
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInference {
    #[serde(rename = "type")]
    pub type_expr: TypeExpr,
    pub confidence: f64,
    /// Method that produced `type_expr`; never `auto`.
    pub method: InferenceMethod,
    pub alternatives: Vec<TypeExpr>,
}

/// Alternatives below this confidence are not listed.
const MIN_ALTERNATIVE_CONFIDENCE: f64 = 0.5;

#[must_use]
pub fn infer(design: &Design, method: InferenceMethod) -> TypeInference {
    match method {
        InferenceMethod::Structural => infer_structural(design),
        InferenceMethod::Behavioural => {
            let structural = infer_structural(design);
            let mut behavioural = infer_behavioural(design, structural.type_expr.kind());
            offer(&mut behavioural, &structural);
            behavioural
        }
        InferenceMethod::Auto => {
            let structural = infer_structural(design);
            let behavioural = infer_behavioural(design, structural.type_expr.kind());
            let (mut chosen, other) = if behavioural.confidence > structural.confidence {
                (behavioural, structural)
            } else {
                (structural, behavioural)
            };
            offer(&mut chosen, &other);
            chosen
        }
    }
}

fn offer(chosen: &mut TypeInference, other: &TypeInference) {
    if other.confidence >= MIN_ALTERNATIVE_CONFIDENCE
        && other.type_expr != chosen.type_expr
        && !chosen.alternatives.contains(&other.type_expr)
    {
        chosen.alternatives.push(other.type_expr.clone());
    }
}

// ── Structural ───────────────────────────────────────────────

/// Read a type off the root action: what it opens and how deep the tree
/// goes below it.
#[must_use]
pub fn infer_structural(design: &Design) -> TypeInference {
    let acts = design.actions();
    let (type_expr, alternatives) = match acts {
        [] => (TypeExpr::Unit, Vec::new()),
        [only] if only.is_daimon() => (TypeExpr::Unit, Vec::new()),
        [root, ..] => shape_of(design, root),
    };

    let mut confidence: f64 = 0.6;
    if !acts.is_empty() {
        confidence += 0.1;
    }
    if acts.len() >= 2 && acts.windows(2).all(|w| w[0].polarity != w[1].polarity) {
        confidence += 0.1;
    }
    match type_expr.kind() {
        TypeKind::Arrow => confidence += 0.15,
        TypeKind::Product => confidence += 0.1,
        _ => {}
    }

    TypeInference {
        type_expr,
        confidence: confidence.min(1.0),
        method: InferenceMethod::Structural,
        alternatives,
    }
}

fn shape_of(design: &Design, root: &Action) -> (TypeExpr, Vec<TypeExpr>) {
    let named = |act: &Action, fallback: &str| match &act.expression {
        Some(text) => TypeExpr::base(type_name(text)),
        None => TypeExpr::var(fallback),
    };

    match root.ramification.len() {
        0 => {
            let name = root.expression.as_deref().map_or_else(|| "atom".to_string(), type_name);
            (TypeExpr::base(name), Vec::new())
        }
        1 if design.depth() >= 3 => {
            let last = deepest_leaf(design).unwrap_or(root);
            let arrow = TypeExpr::arrow(named(root, "A"), named(last, "B"));
            (arrow, vec![TypeExpr::sum(TypeExpr::var("A"), TypeExpr::var("B"))])
        }
        1 => (
            TypeExpr::sum(TypeExpr::var("A"), TypeExpr::var("B")),
            vec![TypeExpr::arrow(TypeExpr::var("A"), TypeExpr::var("B"))],
        ),
        _ => {
            let answer = root.polarity.flip();
            let components = root.ramification.iter().enumerate().map(|(k, &i)| {
                let child = design.action_at(&root.focus.child(i), answer);
                match child.and_then(|a| a.expression.as_deref()) {
                    Some(text) => TypeExpr::base(type_name(text)),
                    None => TypeExpr::var(format!("T{k}")),
                }
            });
            let product = components
                .reduce(TypeExpr::product)
                .unwrap_or(TypeExpr::Unit);
            (product, Vec::new())
        }
    }
}

/// Last action of the first longest branch.
fn deepest_leaf(design: &Design) -> Option<&Action> {
    let branches = design.branches();
    let longest = branches.iter().map(Vec::len).max()?;
    let branch = branches.iter().find(|b| b.len() == longest)?;
    design.action(*branch.last()?)
}

// ── Behavioural ──────────────────────────────────────────────

/// Read a type off how the design's branches end.
///
/// Mixed endings read as a choice, several winning branches as a pair, and
/// one long exchange as a function. `structural` corroborates.
#[must_use]
pub fn infer_behavioural(design: &Design, structural: TypeKind) -> TypeInference {
    let chronicles = extract_chronicles(design);
    let positive = chronicles.iter().filter(|c| c.is_positive).count();

    let type_expr = if positive > 0 && positive < chronicles.len() {
        TypeExpr::sum(TypeExpr::var("Left"), TypeExpr::var("Right"))
    } else if chronicles.len() > 1 && positive == chronicles.len() {
        TypeExpr::product(TypeExpr::var("Fst"), TypeExpr::var("Snd"))
    } else if chronicles.len() == 1 && chronicles[0].len() >= 3 {
        TypeExpr::arrow(TypeExpr::var("Input"), TypeExpr::var("Output"))
    } else {
        let name = design
            .actions()
            .first()
            .and_then(|a| a.expression.as_deref())
            .map_or_else(|| "Base".to_string(), type_name);
        TypeExpr::base(name)
    };

    let mut confidence: f64 = 0.7;
    if chronicles.len() > 3 {
        confidence += 0.1;
    }
    if type_expr.kind() == structural {
        confidence += 0.15;
    }

    TypeInference {
        type_expr,
        confidence: confidence.min(1.0),
        method: InferenceMethod::Behavioural,
        alternatives: Vec::new(),
    }
}
