//! Shared test utilities and fixtures

#![allow(dead_code)]

use ludics_engine::{AnalysisService, Batch, BatchOutput, run_batch};
use ludics_types::{Action, Address, Design, Polarity, RawAction};
use serde_json::{Value, json};

pub fn addr(s: &str) -> Address {
    Address::parse(s).expect("valid address")
}

pub fn raw(polarity: Polarity, focus: &str, ramification: &[u32]) -> RawAction {
    RawAction {
        polarity,
        focus: focus.to_string(),
        ramification: ramification.to_vec(),
        expression: None,
    }
}

pub fn design(owner: &str, acts: Vec<Action>) -> Design {
    Design::compile(owner, acts).expect("valid design")
}

/// `+0{1}`
pub fn claim() -> Value {
    json!({"name": "claim", "acts": [{"polarity": "+", "focus": "0", "ramification": [1]}]})
}

/// `†0.1`
pub fn concede() -> Value {
    json!({"name": "concede", "acts": [{"polarity": "-", "focus": "0.1", "ramification": []}]})
}

/// `-0.1{1}`
pub fn challenge() -> Value {
    json!({"name": "challenge", "acts": [{"polarity": "-", "focus": "0.1", "ramification": [1]}]})
}

/// `+0{1}, †0.1`
pub fn self_dual() -> Value {
    json!({"name": "self_dual", "acts": [
        {"polarity": "+", "focus": "0", "ramification": [1]},
        {"polarity": "-", "focus": "0.1", "ramification": []}
    ]})
}

/// Two answered branches, each closed by a positive leaf.
pub fn two_branches() -> Value {
    json!({"name": "two_branches", "acts": [
        {"polarity": "+", "focus": "0", "ramification": [1, 2]},
        {"polarity": "-", "focus": "0.1", "ramification": [1]},
        {"polarity": "+", "focus": "0.1.1", "ramification": []},
        {"polarity": "-", "focus": "0.2", "ramification": [1]},
        {"polarity": "+", "focus": "0.2.1", "ramification": []}
    ]})
}

pub async fn run(service: &AnalysisService, designs: Vec<Value>, requests: Vec<Value>) -> BatchOutput {
    let batch: Batch = serde_json::from_value(json!({"designs": designs, "requests": requests}))
        .expect("valid batch");
    run_batch(service, batch).await
}

/// The result of the `index`th request, which must have succeeded.
pub fn ok(output: &BatchOutput, index: usize) -> &Value {
    let response = &output.responses[index];
    response
        .result()
        .unwrap_or_else(|| panic!("request {index} failed: {response:?}"))
}

pub fn error_kind(output: &BatchOutput, index: usize) -> String {
    output.responses[index]
        .error()
        .map(|e| e.kind.clone())
        .unwrap_or_else(|| panic!("request {index} succeeded"))
}
