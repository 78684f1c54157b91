//! Algebraic properties of the analyses, checked through the service.

use ludics_core::DisputeStatus;
use ludics_engine::AnalysisService;
use ludics_types::{Design, Polarity, RawAction, StrategyId};
use serde_json::json;

use crate::common::{challenge, claim, concede, ok, raw, run, self_dual, two_branches};

fn compile(service: &AnalysisService, owner: &str, acts: Vec<RawAction>) -> Design {
    service.compile(owner, acts).expect("valid design")
}

#[tokio::test]
async fn innocent_strategies_round_trip_through_plays() {
    let service = AnalysisService::in_memory();
    let output = run(
        &service,
        vec![two_branches()],
        vec![
            json!({"op": "innocence", "design": "two_branches"}),
            json!({"op": "correspondence", "design": "two_branches"}),
        ],
    )
    .await;

    assert_eq!(ok(&output, 0)["is_innocent"], true);
    let isos = &ok(&output, 1)["isomorphisms"];
    for name in ["plays_views", "views_plays", "disp_ch", "ch_disp"] {
        assert_eq!(isos[name]["checked"], true, "{name}");
        assert_eq!(isos[name]["holds"], true, "{name}");
    }
}

#[tokio::test]
async fn more_fuel_never_undoes_convergence() {
    let service = AnalysisService::in_memory();
    let pos = compile(
        &service,
        "p",
        vec![
            raw(Polarity::Positive, "0", &[1]),
            raw(Polarity::Negative, "0.1", &[1]),
            raw(Polarity::Positive, "0.1.1", &[1]),
        ],
    );
    let neg = compile(
        &service,
        "o",
        vec![
            raw(Polarity::Negative, "0.1", &[1]),
            raw(Polarity::Positive, "0.1.1", &[1]),
            raw(Polarity::Negative, "0.1.1.1", &[]),
        ],
    );

    let mut converged_at = None;
    for fuel in 0..8 {
        let dispute = service
            .normalize(pos.id(), neg.id(), Some(fuel), &[])
            .await
            .expect("deterministic designs");
        match (converged_at, dispute.status) {
            (None, DisputeStatus::Convergent) => converged_at = Some(fuel),
            (None, status) => assert_eq!(status, DisputeStatus::Ongoing, "fuel {fuel}"),
            (Some(_), status) => assert_eq!(status, DisputeStatus::Convergent, "fuel {fuel}"),
        }
    }
    assert_eq!(converged_at, Some(2));
}

#[tokio::test]
async fn innocent_views_agree_on_player_moves() {
    let service = AnalysisService::in_memory();
    let design = compile(
        &service,
        "p",
        vec![
            raw(Polarity::Positive, "0", &[1, 2]),
            raw(Polarity::Negative, "0.1", &[1]),
            raw(Polarity::Positive, "0.1.1", &[]),
            raw(Polarity::Negative, "0.2", &[]),
        ],
    );

    let innocence = service.innocence(design.id()).await.expect("report");
    assert!(innocence.is_innocent);
    let views = service.views(design.id()).await.expect("views");
    for (i, v) in views.iter().enumerate() {
        for w in &views[i + 1..] {
            let k = v.common_prefix_len(w);
            if let (Some(a), Some(b)) = (v.actions.get(k), w.actions.get(k))
                && a.polarity == Polarity::Positive
                && b.polarity == Polarity::Positive
            {
                assert_eq!(a, b);
            }
        }
    }
}

#[tokio::test]
async fn closure_is_idempotent() {
    let service = AnalysisService::in_memory();
    let output = run(
        &service,
        vec![claim(), concede(), challenge(), self_dual()],
        vec![json!({"op": "closure", "strategies": ["claim"]})],
    )
    .await;
    let first = ok(&output, 0);
    assert_eq!(first["converged"], true);

    let ids: Vec<StrategyId> =
        serde_json::from_value(first["closure_ids"].clone()).expect("strategy ids");
    let again = service.closure(&ids).await.expect("closure");
    assert!(again.fixpoint_reached);
    assert_eq!(again.iterations, 1);
    assert_eq!(again.closure_ids, ids);
}

#[tokio::test]
async fn orthogonality_batch_keeps_order() {
    let service = AnalysisService::in_memory();
    let output = run(&service, vec![claim(), concede(), challenge()], vec![]).await;
    let strategy = |i: usize| -> StrategyId {
        let summary = output.designs[i].result().expect("compiled");
        serde_json::from_value(summary["strategy"].clone()).expect("strategy id")
    };

    let pairs = vec![(strategy(0), strategy(1)), (strategy(0), strategy(2))];
    let results = service.orthogonality_batch(&pairs).await;
    let verdicts: Vec<bool> = results
        .into_iter()
        .map(|r| r.expect("report").is_orthogonal)
        .collect();
    assert_eq!(verdicts, vec![true, false]);
}
