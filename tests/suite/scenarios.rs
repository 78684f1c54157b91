//! End-to-end scenarios through the JSON protocol.

use ludics_core::check_propagation;
use ludics_core::propagation::PropagationViolationKind;
use ludics_engine::AnalysisService;
use ludics_types::{Action, Polarity, View};
use serde_json::json;

use crate::common::{
    addr, challenge, claim, concede, error_kind, ok, run, self_dual, two_branches,
};

#[tokio::test]
async fn claim_against_concession_converges_in_one_pair() {
    let service = AnalysisService::in_memory();
    let output = run(
        &service,
        vec![claim(), concede()],
        vec![json!({"op": "normalize", "positive": "claim", "negative": "concede", "fuel": 16})],
    )
    .await;

    let dispute = ok(&output, 0);
    assert_eq!(dispute["status"], "CONVERGENT");
    assert_eq!(dispute["pairs"].as_array().map(Vec::len), Some(1));
    assert_eq!(dispute["pairs"][0]["negative"]["focus"], "0.1");
}

#[tokio::test]
async fn duplicate_locus_and_polarity_is_rejected() {
    let service = AnalysisService::in_memory();
    let output = run(
        &service,
        vec![json!({"name": "dup", "acts": [
            {"polarity": "+", "focus": "0", "ramification": [1]},
            {"polarity": "-", "focus": "0.1", "ramification": [1]},
            {"polarity": "-", "focus": "0.1", "ramification": []}
        ]})],
        vec![json!({"op": "views", "design": "dup"})],
    )
    .await;

    let compile = output.designs[0].error().expect("compile fails");
    assert_eq!(compile.kind, "DuplicateAction");
    // The name never got bound.
    assert_eq!(error_kind(&output, 0), "UnknownDesign");
}

#[test]
fn diverging_views_on_one_address_break_slice_linearity() {
    let a = Action::positive(addr("0"), [1]);
    let b = Action::negative(addr("0.1"), [1]);
    let c = Action::negative(addr("0.1"), [2]);
    let views = [
        View::new(Polarity::Positive, vec![a.clone(), b]),
        View::new(Polarity::Positive, vec![a, c]),
    ];

    let report = check_propagation(&views);
    assert!(!report.satisfies_slice_linearity);
    let violation = report
        .violations
        .iter()
        .find(|v| v.kind == PropagationViolationKind::SliceLinearity)
        .expect("slice-linearity violation");
    assert_eq!(violation.addresses, vec![addr("0.1")]);
    assert_eq!(violation.prefix_len, 1);
}

#[tokio::test]
async fn design_with_matching_daimons_is_self_orthogonal() {
    let service = AnalysisService::in_memory();
    let output = run(
        &service,
        vec![self_dual()],
        vec![json!({"op": "orthogonality", "a": "self_dual", "b": "self_dual"})],
    )
    .await;

    let report = ok(&output, 0);
    assert_eq!(report["is_orthogonal"], true);
    assert_eq!(report["counter_examples"], json!([]));
}

#[tokio::test]
async fn every_operation_answers() {
    let service = AnalysisService::in_memory();
    let output = run(
        &service,
        vec![claim(), concede(), challenge(), self_dual(), two_branches()],
        vec![
            json!({"op": "views", "design": "two_branches"}),
            json!({"op": "chronicles", "design": "two_branches"}),
            json!({"op": "innocence", "design": "two_branches"}),
            json!({"op": "propagation", "design": "two_branches"}),
            json!({"op": "correspondence", "design": "two_branches"}),
            json!({"op": "orthogonality", "a": "claim", "b": "challenge"}),
            json!({"op": "closure", "strategies": ["claim"]}),
            json!({"op": "type_infer", "design": "two_branches"}),
            json!({"op": "type_check", "design": "two_branches", "target": "A * B"}),
            json!({"op": "incarnation", "source": "claim", "target": "self_dual"}),
            json!({"op": "complete", "design": "claim"}),
            json!({"op": "metrics", "design": "two_branches"}),
        ],
    )
    .await;

    assert_eq!(ok(&output, 0).as_array().map(Vec::len), Some(5));
    assert_eq!(ok(&output, 1).as_array().map(Vec::len), Some(2));
    assert_eq!(ok(&output, 2)["is_innocent"], true);
    assert_eq!(ok(&output, 3)["satisfies_propagation"], true);
    assert_eq!(ok(&output, 4)["is_verified"], true);

    let orth = ok(&output, 5);
    assert_eq!(orth["is_orthogonal"], false);
    assert_eq!(orth["counter_examples"][0]["status"], "DIVERGENT");
    assert_eq!(orth["counter_examples"][0]["stuck_at"], "0.1");

    let closure = ok(&output, 6);
    assert_eq!(closure["fixpoint_reached"], true);
    // claim, self_dual and two_branches all converge against concede.
    assert_eq!(closure["closure_ids"].as_array().map(Vec::len), Some(3));
    assert_eq!(closure["orthogonal_ids"].as_array().map(Vec::len), Some(1));

    assert_eq!(ok(&output, 7)["type"]["kind"], "product");
    assert_eq!(ok(&output, 8)["is_valid"], true);
    assert_eq!(ok(&output, 9)["is_valid"], true);
    assert_eq!(ok(&output, 10)["stats"]["daimons_added"], 1);
    assert_eq!(ok(&output, 11)["depth"], 3);
}

#[tokio::test]
async fn nondeterminism_and_bad_types_surface_as_errors() {
    let service = AnalysisService::in_memory();
    let output = run(
        &service,
        vec![
            json!({"name": "fork", "acts": [
                {"polarity": "+", "focus": "0", "ramification": [1]},
                {"polarity": "-", "focus": "0.1", "ramification": [1, 2]},
                {"polarity": "+", "focus": "0.1.1", "ramification": []},
                {"polarity": "+", "focus": "0.1.2", "ramification": []}
            ]}),
            json!({"name": "open", "acts": [
                {"polarity": "-", "focus": "0.1", "ramification": [1, 2]}
            ]}),
        ],
        vec![
            json!({"op": "normalize", "positive": "fork", "negative": "open"}),
            json!({"op": "type_check", "design": "fork", "target": "(A"}),
        ],
    )
    .await;

    assert_eq!(error_kind(&output, 0), "NonDeterministicDesign");
    assert_eq!(error_kind(&output, 1), "InvalidType");
}

#[tokio::test]
async fn disputes_name_their_winner() {
    let service = AnalysisService::in_memory();
    let output = run(
        &service,
        vec![claim(), challenge(), two_branches()],
        vec![
            json!({"op": "normalize", "positive": "two_branches", "negative": "challenge"}),
            json!({"op": "normalize", "positive": "claim", "negative": "challenge"}),
            json!({"op": "orthogonality", "a": "two_branches", "b": "challenge"}),
        ],
    )
    .await;

    let answered = ok(&output, 0);
    assert_eq!(answered["status"], "CONVERGENT");
    assert_eq!(answered["winner"], "+");

    let stuck = ok(&output, 1);
    assert_eq!(stuck["status"], "DIVERGENT");
    assert_eq!(stuck["winner"], "-");

    // The strategy is checked through the registered design, so it agrees
    // with the dispute above.
    assert_eq!(ok(&output, 2)["is_orthogonal"], true);
}

#[tokio::test]
async fn behaviour_of_a_claim_and_its_complement() {
    let service = AnalysisService::in_memory();
    let output = run(
        &service,
        vec![claim(), concede(), challenge(), self_dual()],
        vec![
            json!({"op": "behaviour", "strategies": ["claim"]}),
            json!({"op": "behaviour_complement", "strategies": ["claim"]}),
            json!({"op": "is_behaviour", "strategies": ["claim", "self_dual"]}),
            json!({"op": "compare_behaviours", "a": ["claim"], "b": ["claim", "self_dual"]}),
        ],
    )
    .await;

    let strategy = |index: usize| {
        output.designs[index].result().expect("compiled")["strategy"].clone()
    };
    let members = ok(&output, 0)["members"].as_array().cloned().expect("members");
    assert!(members.contains(&strategy(0)));
    assert!(members.contains(&strategy(3)));
    assert_eq!(members.len(), 2);

    assert_eq!(ok(&output, 1)["members"], json!([strategy(1)]));
    assert_eq!(ok(&output, 2)["is_behaviour"], true);
    assert_eq!(ok(&output, 3)["equal"], true);
}
