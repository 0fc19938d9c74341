use serde_json::json;
use stagehook::testing::{FnHook, HookOutput, StubAuction, TestPayloads, ok_no_action};
use stagehook::{
    Activity, ActivityResult, Endpoint, ExecutionPlan, ExecutionStatus, HookExecutionContext,
    HookId, HookRegistry, HookStageExecutor, InvocationContext, InvocationResult, Payload,
    PayloadUpdate, RequestOrchestrator, Stage, StageExecutionPlan, StageHook, Tags,
};
use std::time::Duration;

mod common;
use common::{MODULE, add_stage, appending, group, plan, rejecting};

fn orchestrator(
    registry: HookRegistry<TestPayloads>,
    bidders: &[&str],
) -> RequestOrchestrator<TestPayloads, StubAuction> {
    RequestOrchestrator::new(
        HookStageExecutor::new(registry),
        StubAuction::new(bidders.iter().copied()),
    )
}

#[tokio::test(start_paused = true)]
async fn reject_at_raw_auction_request_skips_everything_after() {
    let processed = FnHook::new("processed", ok_no_action::<String>);
    let processed_calls = processed.calls();
    let registry = HookRegistry::<TestPayloads>::builder()
        .hook(MODULE, StageHook::raw_auction_request(rejecting("gate", "invalid request")))
        .hook(MODULE, StageHook::processed_auction_request(processed))
        .build();
    let orchestrator = orchestrator(registry, &["a", "b"]);
    let plan = add_stage(
        plan(Stage::RawAuctionRequest, vec![group(100, &["gate"])]),
        Stage::ProcessedAuctionRequest,
        vec![group(100, &["processed"])],
    );

    let result = orchestrator
        .run(String::from("req"), common::context(plan))
        .await
        .unwrap();

    let rejection = result.rejection().unwrap();
    assert_eq!(rejection.stage, Stage::RawAuctionRequest);
    assert_eq!(rejection.hook_id, HookId::new(MODULE, "gate"));
    assert_eq!(rejection.reason, "invalid request");
    assert!(result.response().is_none());
    assert!(orchestrator.auction().bidder_calls().is_empty());
    assert_eq!(processed_calls.count(), 0);
    assert!(
        result
            .context
            .stage_outcomes()
            .get(Stage::ProcessedAuctionRequest)
            .is_empty()
    );
}

#[tokio::test(start_paused = true)]
async fn reject_at_entrypoint_ends_the_request() {
    let raw = FnHook::new("raw", ok_no_action::<String>);
    let raw_calls = raw.calls();
    let registry = HookRegistry::<TestPayloads>::builder()
        .hook(MODULE, StageHook::entrypoint(rejecting("gate", "bad traffic")))
        .hook(MODULE, StageHook::raw_auction_request(raw))
        .hook(MODULE, StageHook::exitpoint(appending("tag", "!")))
        .build();
    let orchestrator = orchestrator(registry, &["a", "b"]);
    let plan = add_stage(
        add_stage(
            plan(Stage::Entrypoint, vec![group(100, &["gate"])]),
            Stage::RawAuctionRequest,
            vec![group(100, &["raw"])],
        ),
        Stage::Exitpoint,
        vec![group(100, &["tag"])],
    );

    let result = orchestrator
        .run(String::from("req"), common::context(plan))
        .await
        .unwrap();

    let rejection = result.rejection().unwrap();
    assert_eq!(rejection.stage, Stage::Entrypoint);
    assert_eq!(rejection.hook_id, HookId::new(MODULE, "gate"));
    assert_eq!(rejection.reason, "bad traffic");
    assert!(result.response().is_none());
    assert!(orchestrator.auction().bidder_calls().is_empty());
    assert_eq!(raw_calls.count(), 0);
    let stages: Vec<_> = result
        .context
        .stage_outcomes()
        .iter()
        .map(|(stage, _)| stage)
        .collect();
    assert_eq!(stages, vec![Stage::Entrypoint]);
}

/// A no-op hook named after the stage it serves.
fn noop<P: Payload>(stage: Stage) -> FnHook<fn(&P, &InvocationContext) -> HookOutput<P>> {
    let func: fn(&P, &InvocationContext) -> HookOutput<P> = ok_no_action::<P>;
    FnHook::new(stage.as_str(), func)
}

#[tokio::test(start_paused = true)]
async fn every_endpoint_runs_the_full_stage_order() {
    let registry = HookRegistry::<TestPayloads>::builder()
        .hook(MODULE, StageHook::entrypoint(noop(Stage::Entrypoint)))
        .hook(MODULE, StageHook::raw_auction_request(noop(Stage::RawAuctionRequest)))
        .hook(
            MODULE,
            StageHook::processed_auction_request(noop(Stage::ProcessedAuctionRequest)),
        )
        .hook(MODULE, StageHook::bidder_request(noop(Stage::BidderRequest)))
        .hook(MODULE, StageHook::raw_bidder_response(noop(Stage::RawBidderResponse)))
        .hook(
            MODULE,
            StageHook::processed_bidder_response(noop(Stage::ProcessedBidderResponse)),
        )
        .hook(MODULE, StageHook::auction_response(noop(Stage::AuctionResponse)))
        .hook(MODULE, StageHook::exitpoint(noop(Stage::Exitpoint)))
        .build();
    let orchestrator = orchestrator(registry, &["a"]);

    for endpoint in [Endpoint::Auction, Endpoint::Amp, Endpoint::Video] {
        let plan = Stage::ALL.iter().fold(ExecutionPlan::default(), |plan, stage| {
            plan.with_stage(
                endpoint,
                *stage,
                StageExecutionPlan::new(vec![group(100, &[stage.as_str()])]),
            )
        });
        let context = HookExecutionContext::new(endpoint).with_plan(plan);

        let result = orchestrator
            .run(String::from("req"), context)
            .await
            .unwrap();

        assert_eq!(result.response().map(String::as_str), Some("bid-a"));
        let stages: Vec<_> = result
            .context
            .stage_outcomes()
            .iter()
            .map(|(stage, _)| stage)
            .collect();
        assert_eq!(stages, Stage::ALL.to_vec(), "endpoint: {endpoint}");
    }
}

#[tokio::test(start_paused = true)]
async fn reject_at_auction_response_does_not_stop_the_request() {
    let registry = HookRegistry::<TestPayloads>::builder()
        .hook(
            MODULE,
            StageHook::auction_response(FnHook::new(
                "gate",
                |_: &Vec<String>, _: &InvocationContext| -> HookOutput<Vec<String>> {
                    Ok(InvocationResult::reject("no bids for you"))
                },
            )),
        )
        .build();
    let orchestrator = orchestrator(registry, &["a"]);

    let result = orchestrator
        .run(
            String::from("req"),
            common::context(plan(Stage::AuctionResponse, vec![group(100, &["gate"])])),
        )
        .await
        .unwrap();

    assert!(result.rejection().is_none());
    assert_eq!(result.response().map(String::as_str), Some("bid-a"));
    let gate = &result.context.stage_outcomes().get(Stage::AuctionResponse)[0].groups[0].hooks[0];
    assert_eq!(gate.status, ExecutionStatus::Failure);
    assert_eq!(
        gate.message.as_deref(),
        Some("Rejection is not supported during this stage")
    );
}

#[tokio::test(start_paused = true)]
async fn bidder_branches_keep_their_own_module_context() {
    let remember = FnHook::new("remember", |_: &String, context: &InvocationContext| -> HookOutput<String> {
        Ok(InvocationResult::no_action().with_module_context(context.entity().to_string()))
    });
    let recall = FnHook::new(
        "recall",
        |_: &Vec<String>, context: &InvocationContext| -> HookOutput<Vec<String>> {
            let seen = context
                .module_context_as::<String>()
                .cloned()
                .unwrap_or_default();
            Ok(InvocationResult::update(PayloadUpdate::map(
                move |bids: &Vec<String>| bids.iter().map(|bid| format!("{bid}:{seen}")).collect(),
            )))
        },
    )
    .delayed(Duration::from_millis(5));
    let registry = HookRegistry::<TestPayloads>::builder()
        .hook(MODULE, StageHook::bidder_request(remember))
        .hook(MODULE, StageHook::raw_bidder_response(recall))
        .build();
    let orchestrator = orchestrator(registry, &["a", "b"]);
    let plan = add_stage(
        plan(Stage::BidderRequest, vec![group(100, &["remember"])]),
        Stage::RawBidderResponse,
        vec![group(100, &["recall"])],
    );

    let result = orchestrator
        .run(String::from("req"), common::context(plan))
        .await
        .unwrap();

    assert_eq!(result.response().map(String::as_str), Some("bid-a:a,bid-b:b"));
    let entities: Vec<_> = result
        .context
        .stage_outcomes()
        .get(Stage::RawBidderResponse)
        .iter()
        .map(|outcome| outcome.entity.as_str())
        .collect();
    assert_eq!(entities, vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn hooks_see_the_request_as_rewritten_by_earlier_stages() {
    let seen = FnHook::new("seen", |request: &String, _: &InvocationContext| -> HookOutput<String> {
        Ok(InvocationResult::no_action().with_module_context(request.clone()))
    });
    let registry = HookRegistry::<TestPayloads>::builder()
        .hook(MODULE, StageHook::entrypoint(appending("entry-tag", "+entry")))
        .hook(
            MODULE,
            StageHook::processed_auction_request(appending("processed-tag", "+processed")),
        )
        .hook(MODULE, StageHook::bidder_request(seen))
        .hook(MODULE, StageHook::exitpoint(appending("exit-tag", "!")))
        .build();
    let orchestrator = orchestrator(registry, &["a"]);
    let mut plan = plan(Stage::Entrypoint, vec![group(100, &["entry-tag"])]);
    for (stage, code) in [
        (Stage::ProcessedAuctionRequest, "processed-tag"),
        (Stage::BidderRequest, "seen"),
        (Stage::Exitpoint, "exit-tag"),
    ] {
        plan = add_stage(plan, stage, vec![group(100, &[code])]);
    }

    let result = orchestrator
        .run(String::from("req"), common::context(plan))
        .await
        .unwrap();

    assert_eq!(result.response().map(String::as_str), Some("bid-a!"));
    assert_eq!(
        result
            .context
            .module_contexts()
            .get_as::<String>(MODULE)
            .map(String::as_str),
        Some("req+entry+processed|a")
    );
}

#[tokio::test(start_paused = true)]
async fn trace_is_returned_only_in_debug_mode() {
    let tagging = FnHook::new("tagging", |_: &String, _: &InvocationContext| -> HookOutput<String> {
        Ok(InvocationResult::no_action()
            .with_warnings(vec![String::from("careful")])
            .with_analytics_tags(Tags::new(vec![Activity::new(
                "inspect",
                "success",
                vec![ActivityResult::new("success-allow")],
            )])))
    })
    .delayed(Duration::from_millis(10));
    let registry = HookRegistry::<TestPayloads>::builder()
        .hook(MODULE, StageHook::bidder_request(tagging))
        .build();
    let orchestrator = orchestrator(registry, &["a", "b"]);

    for debug in [false, true] {
        let context = HookExecutionContext::new(Endpoint::Auction)
            .with_debug_enabled(debug)
            .with_plan(plan(Stage::BidderRequest, vec![group(100, &["tagging"])]));

        let result = orchestrator
            .run(String::from("req"), context)
            .await
            .unwrap();

        let tags: Vec<_> = result.analytics_tags().collect();
        assert_eq!(tags.len(), 2, "debug: {debug}");
        assert_eq!(tags[0].0, &HookId::new(MODULE, "tagging"));
        assert_eq!(tags[0].1.activities[0].name, "inspect");

        let Some(output) = result.debug_output() else {
            assert!(!debug);
            continue;
        };
        assert!(debug);
        let rendered = serde_json::to_value(&output).unwrap();
        assert_eq!(rendered["warnings"], json!({"m": {"tagging": ["careful", "careful"]}}));
        assert_eq!(rendered["trace"]["executiontimemillis"], json!(20));
        let stage = &rendered["trace"]["stages"][0];
        assert_eq!(stage["stage"], json!("bidder-request"));
        assert_eq!(stage["executiontimemillis"], json!(20));
        assert_eq!(stage["outcomes"][0]["entity"], json!("a"));
        assert_eq!(stage["outcomes"][1]["entity"], json!("b"));
        assert_eq!(
            stage["outcomes"][0]["groups"][0]["invocationresults"][0]["analyticstags"]["activities"]
                [0]["results"][0]["status"],
            json!("success-allow")
        );
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_hook_in_plan_is_skipped() {
    let registry = HookRegistry::<TestPayloads>::builder()
        .hook(MODULE, StageHook::entrypoint(appending("known", "+")))
        .build();
    let plan = plan(Stage::Entrypoint, vec![group(100, &["missing", "known"])]);
    assert!(registry.validate(&plan).is_err());
    let orchestrator = orchestrator(registry, &["a"]);

    let result = orchestrator
        .run(String::from("req"), common::context(plan))
        .await
        .unwrap();

    assert_eq!(result.response().map(String::as_str), Some("bid-a"));
    let hooks = &result.context.stage_outcomes().get(Stage::Entrypoint)[0].groups[0].hooks;
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0].hook_id, HookId::new(MODULE, "known"));
}
