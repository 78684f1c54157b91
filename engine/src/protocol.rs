//! JSON request/response contract.
//!
//! A batch names its designs up front; requests refer to a design by that
//! name or by its id, and to a strategy by a design reference (meaning the
//! design's own strategy) or by a strategy id.

use std::collections::HashMap;

use ludics_core::Strategy;
use ludics_core::typesys::{CheckMethod, IncarnationMode, InferenceMethod};
use ludics_types::{Address, Design, DesignId, Polarity, RawAction, StrategyId};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::service::AnalysisService;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Compile {
        name: String,
        #[serde(default)]
        owner: Option<String>,
        acts: Vec<RawAction>,
    },
    Normalize {
        positive: String,
        negative: String,
        #[serde(default)]
        fuel: Option<u32>,
        #[serde(default)]
        virtual_neg_foci: Vec<String>,
    },
    Views {
        design: String,
    },
    Chronicles {
        design: String,
    },
    Innocence {
        design: String,
    },
    Propagation {
        design: String,
    },
    Correspondence {
        design: String,
        #[serde(default)]
        strategy: Option<String>,
    },
    Orthogonality {
        a: String,
        b: String,
    },
    Closure {
        strategies: Vec<String>,
    },
    /// The closure of the generators, as a behaviour.
    Behaviour {
        strategies: Vec<String>,
    },
    IsBehaviour {
        strategies: Vec<String>,
    },
    ValidateBehaviour {
        strategies: Vec<String>,
    },
    IntersectBehaviours {
        a: Vec<String>,
        b: Vec<String>,
    },
    CompareBehaviours {
        a: Vec<String>,
        b: Vec<String>,
    },
    BehaviourComplement {
        strategies: Vec<String>,
    },
    TypeInfer {
        design: String,
        #[serde(default)]
        method: Option<InferenceMethod>,
    },
    TypeCheck {
        design: String,
        target: String,
        #[serde(default)]
        method: Option<CheckMethod>,
    },
    Incarnation {
        source: String,
        target: String,
        #[serde(default)]
        mode: Option<IncarnationMode>,
    },
    Complete {
        design: String,
    },
    Metrics {
        design: String,
    },
}

impl Request {
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Compile { .. } => "compile",
            Self::Normalize { .. } => "normalize",
            Self::Views { .. } => "views",
            Self::Chronicles { .. } => "chronicles",
            Self::Innocence { .. } => "innocence",
            Self::Propagation { .. } => "propagation",
            Self::Correspondence { .. } => "correspondence",
            Self::Orthogonality { .. } => "orthogonality",
            Self::Closure { .. } => "closure",
            Self::Behaviour { .. } => "behaviour",
            Self::IsBehaviour { .. } => "is_behaviour",
            Self::ValidateBehaviour { .. } => "validate_behaviour",
            Self::IntersectBehaviours { .. } => "intersect_behaviours",
            Self::CompareBehaviours { .. } => "compare_behaviours",
            Self::BehaviourComplement { .. } => "behaviour_complement",
            Self::TypeInfer { .. } => "type_infer",
            Self::TypeCheck { .. } => "type_check",
            Self::Incarnation { .. } => "incarnation",
            Self::Complete { .. } => "complete",
            Self::Metrics { .. } => "metrics",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok {
        op: String,
        result: serde_json::Value,
    },
    Error {
        op: String,
        error: ErrorBody,
    },
}

impl Response {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    #[must_use]
    pub fn result(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Ok { result, .. } => Some(result),
            Self::Error { .. } => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { error, .. } => Some(error),
        }
    }

    fn failure(op: &str, err: &EngineError) -> Self {
        Self::Error {
            op: op.to_string(),
            error: ErrorBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignInput {
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub acts: Vec<RawAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default)]
    pub designs: Vec<DesignInput>,
    #[serde(default)]
    pub requests: Vec<Request>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    /// One `compile` response per design input, in order.
    pub designs: Vec<Response>,
    pub responses: Vec<Response>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub id: DesignId,
    pub strategy: StrategyId,
    pub owner: String,
    pub base: Address,
    pub polarity: Polarity,
    pub action_count: usize,
}

impl DesignSummary {
    fn of(name: Option<String>, design: &Design, strategy: StrategyId) -> Self {
        Self {
            name,
            id: design.id().clone(),
            strategy,
            owner: design.owner().to_string(),
            base: design.base().clone(),
            polarity: design.polarity(),
            action_count: design.action_count(),
        }
    }
}

/// Name bindings for one batch.
pub struct Session<'a> {
    service: &'a AnalysisService,
    names: HashMap<String, DesignId>,
}

impl<'a> Session<'a> {
    #[must_use]
    pub fn new(service: &'a AnalysisService) -> Self {
        Self {
            service,
            names: HashMap::new(),
        }
    }

    pub async fn handle(&mut self, request: Request) -> Response {
        let op = request.op();
        let outcome = self.dispatch(request).await;
        match outcome {
            Ok(result) => Response::Ok {
                op: op.to_string(),
                result,
            },
            Err(err) => {
                tracing::debug!(op, kind = err.kind(), %err, "request failed");
                Response::failure(op, &err)
            }
        }
    }

    fn design_ref(&self, reference: &str) -> DesignId {
        self.names
            .get(reference)
            .cloned()
            .unwrap_or_else(|| DesignId::new(reference))
    }

    /// A design reference resolves to that design's strategy; anything
    /// else is taken as a strategy id.
    fn strategy_ref(&self, reference: &str) -> Result<StrategyId, EngineError> {
        let design = self.design_ref(reference);
        match self.service.strategy_of(&design) {
            Ok(strategy) => Ok(strategy.id),
            Err(EngineError::UnknownDesign(_)) => Ok(StrategyId::new(reference)),
            Err(err) => Err(err),
        }
    }

    fn strategy_refs(&self, references: &[String]) -> Result<Vec<StrategyId>, EngineError> {
        references.iter().map(|r| self.strategy_ref(r)).collect()
    }

    async fn dispatch(&mut self, request: Request) -> Result<serde_json::Value, EngineError> {
        let svc = self.service;
        match request {
            Request::Compile { name, owner, acts } => {
                let owner = owner.unwrap_or_else(|| name.clone());
                let design = svc.compile(owner, acts)?;
                let strategy = Strategy::from_design(&design).id;
                self.names.insert(name.clone(), design.id().clone());
                to_json(&DesignSummary::of(Some(name), &design, strategy))
            }
            Request::Normalize {
                positive,
                negative,
                fuel,
                virtual_neg_foci,
            } => {
                let foci = virtual_neg_foci
                    .iter()
                    .map(|f| Address::parse(f))
                    .collect::<Result<Vec<_>, _>>()?;
                let pos = self.design_ref(&positive);
                let neg = self.design_ref(&negative);
                to_json(&svc.normalize(&pos, &neg, fuel, &foci).await?)
            }
            Request::Views { design } => to_json(&svc.views(&self.design_ref(&design)).await?),
            Request::Chronicles { design } => {
                to_json(&svc.chronicles(&self.design_ref(&design)).await?)
            }
            Request::Innocence { design } => {
                to_json(&svc.innocence(&self.design_ref(&design)).await?)
            }
            Request::Propagation { design } => {
                to_json(&svc.propagation(&self.design_ref(&design)).await?)
            }
            Request::Correspondence { design, strategy } => {
                let strategy = strategy.map(|s| self.strategy_ref(&s)).transpose()?;
                let design = self.design_ref(&design);
                to_json(&svc.correspondence(&design, strategy.as_ref()).await?)
            }
            Request::Orthogonality { a, b } => {
                let a = self.strategy_ref(&a)?;
                let b = self.strategy_ref(&b)?;
                to_json(&svc.orthogonality(&a, &b).await?)
            }
            Request::Closure { strategies } => {
                to_json(&svc.closure(&self.strategy_refs(&strategies)?).await?)
            }
            Request::Behaviour { strategies } => {
                to_json(&svc.behaviour(&self.strategy_refs(&strategies)?).await?)
            }
            Request::IsBehaviour { strategies } => {
                let ids = self.strategy_refs(&strategies)?;
                Ok(serde_json::json!({ "is_behaviour": svc.is_behaviour(&ids).await? }))
            }
            Request::ValidateBehaviour { strategies } => {
                to_json(&svc.validate_behaviour(&self.strategy_refs(&strategies)?).await?)
            }
            Request::IntersectBehaviours { a, b } => {
                let (a, b) = (self.strategy_refs(&a)?, self.strategy_refs(&b)?);
                to_json(&svc.intersect_behaviours(&a, &b).await?)
            }
            Request::CompareBehaviours { a, b } => {
                let (a, b) = (self.strategy_refs(&a)?, self.strategy_refs(&b)?);
                to_json(&svc.compare_behaviours(&a, &b).await?)
            }
            Request::BehaviourComplement { strategies } => {
                to_json(&svc.behaviour_complement(&self.strategy_refs(&strategies)?).await?)
            }
            Request::TypeInfer { design, method } => {
                let method = method.unwrap_or(InferenceMethod::Auto);
                to_json(&svc.type_infer(&self.design_ref(&design), method).await?)
            }
            Request::TypeCheck {
                design,
                target,
                method,
            } => {
                let method = method.unwrap_or(CheckMethod::Combined);
                to_json(
                    &svc.type_check(&self.design_ref(&design), &target, method)
                        .await?,
                )
            }
            Request::Incarnation {
                source,
                target,
                mode,
            } => {
                let mode = mode.unwrap_or(IncarnationMode::Lax);
                let source = self.design_ref(&source);
                let target = self.design_ref(&target);
                to_json(&svc.incarnation(&source, &target, mode).await?)
            }
            Request::Complete { design } => {
                let (completed, stats) = svc.complete(&self.design_ref(&design)).await?;
                let strategy = Strategy::from_design(&completed).id;
                Ok(serde_json::json!({
                    "design": DesignSummary::of(None, &completed, strategy),
                    "acts": completed.actions(),
                    "stats": stats,
                }))
            }
            Request::Metrics { design } => to_json(&svc.metrics(&self.design_ref(&design)).await?),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, EngineError> {
    serde_json::to_value(value).map_err(|err| EngineError::Task(format!("encoding failed: {err}")))
}

/// Compile the batch's designs, then answer its requests in order.
pub async fn run_batch(service: &AnalysisService, batch: Batch) -> BatchOutput {
    let mut session = Session::new(service);
    let mut designs = Vec::with_capacity(batch.designs.len());
    for input in batch.designs {
        let request = Request::Compile {
            name: input.name,
            owner: input.owner,
            acts: input.acts,
        };
        designs.push(session.handle(request).await);
    }

    let mut responses = Vec::with_capacity(batch.requests.len());
    for request in batch.requests {
        responses.push(session.handle(request).await);
    }
    tracing::debug!(
        designs = designs.len(),
        responses = responses.len(),
        "batch finished"
    );
    BatchOutput { designs, responses }
}
