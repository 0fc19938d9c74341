//! The blocking module driven through a whole request.

use serde_json::json;
use stagehook::{
    AccountHooksConfig, Endpoint, ExecutionPlan, HookExecutionContext, HookRegistry,
    HookStageExecutor, RequestOrchestrator, Stage,
};
use stagehook_ortb2_blocking::hooks::{BIDDER_REQUEST_HOOK_CODE, RAW_BIDDER_RESPONSE_HOOK_CODE};
use stagehook_ortb2_blocking::openrtb::Bid;
use stagehook_ortb2_blocking::{BidType, BidderBid, MODULE_CODE, Ortb2BlockingModule};

mod common;
use common::{OrtbAuction, OrtbPayloads};

fn plan() -> ExecutionPlan {
    let group = |hook: &str| {
        json!({"groups": [{
            "timeout": 50,
            "hook-sequence": [{"module-code": MODULE_CODE, "hook-impl-code": hook}]
        }]})
    };
    let plan = json!({"endpoints": {"/openrtb2/auction": {"stages": {
        "bidder-request": group(BIDDER_REQUEST_HOOK_CODE),
        "raw-bidder-response": group(RAW_BIDDER_RESPONSE_HOOK_CODE),
    }}}});
    ExecutionPlan::parse(&plan.to_string()).unwrap()
}

fn account() -> AccountHooksConfig {
    AccountHooksConfig::new("acc-1").with_module(
        MODULE_CODE,
        json!({"attributes": {"badv": {
            "enforce-blocks": true,
            "blocked-adomain": ["bad.com"],
            "action-overrides": {"blocked-adomain": [
                {"conditions": {"bidders": ["bidder2"]}, "override": ["worse.com"]}
            ]}
        }}}),
    )
}

fn bid(id: &str, adomain: &str) -> BidderBid {
    BidderBid::new(
        Bid {
            adomain: Some(vec![adomain.to_string()]),
            ..Bid::new(id, "imp1")
        },
        BidType::Banner,
        "USD",
    )
}

fn orchestrator() -> RequestOrchestrator<OrtbPayloads, OrtbAuction> {
    let registry = HookRegistry::<OrtbPayloads>::builder()
        .module(Ortb2BlockingModule)
        .build();
    registry.validate(&plan()).unwrap();

    let auction = OrtbAuction::default()
        .bidder("bidder1", vec![bid("b1", "good.com"), bid("b2", "bad.com")])
        .bidder("bidder2", vec![bid("b3", "bad.com"), bid("b4", "worse.com")]);
    RequestOrchestrator::new(HookStageExecutor::new(registry), auction)
}

fn request() -> String {
    json!({"id": "req-1", "imp": [{"id": "imp1", "banner": {}}]}).to_string()
}

#[tokio::test]
async fn blocked_values_reach_each_bidder_and_violating_bids_are_dropped() {
    let orchestrator = orchestrator();
    let context = HookExecutionContext::new(Endpoint::Auction)
        .with_plan(plan())
        .with_account(account());

    let result = orchestrator.run(request(), context).await.unwrap();

    assert_eq!(result.response().map(String::as_str), Some("b1,b3"));
    let auction = orchestrator.auction();
    assert_eq!(
        auction.request_for("bidder1").and_then(|request| request.badv),
        Some(vec![String::from("bad.com")])
    );
    assert_eq!(
        auction.request_for("bidder2").and_then(|request| request.badv),
        Some(vec![String::from("worse.com")])
    );
    assert!(result.debug_output().is_none());

    let statuses: Vec<_> = result
        .analytics_tags()
        .flat_map(|(_, tags)| &tags.activities)
        .flat_map(|activity| &activity.results)
        .map(|result| result.status.as_str())
        .collect();
    assert_eq!(
        statuses,
        vec!["success-allow", "success-blocked", "success-allow", "success-blocked"]
    );
}

#[tokio::test]
async fn debug_trace_explains_rejected_bids() {
    let orchestrator = orchestrator();
    let context = HookExecutionContext::new(Endpoint::Auction)
        .with_debug_enabled(true)
        .with_plan(plan())
        .with_account(account());

    let result = orchestrator.run(request(), context).await.unwrap();

    let rendered = serde_json::to_value(result.debug_output().unwrap()).unwrap();
    let stages = rendered["trace"]["stages"].as_array().unwrap();
    let raw = stages
        .iter()
        .find(|stage| stage["stage"] == json!("raw-bidder-response"))
        .unwrap();
    let messages: Vec<_> = raw["outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|outcome| outcome["groups"][0]["invocationresults"][0]["debugmessages"].clone())
        .collect();
    assert_eq!(
        messages,
        vec![
            json!(["Bid 1 from bidder bidder1 has been rejected, failed checks: [badv]"]),
            json!(["Bid 1 from bidder bidder2 has been rejected, failed checks: [badv]"]),
        ]
    );
    assert_eq!(
        result
            .context
            .stage_outcomes()
            .get(Stage::BidderRequest)
            .len(),
        2
    );
}

#[tokio::test]
async fn account_without_module_config_leaves_the_auction_alone() {
    let orchestrator = orchestrator();
    let context = HookExecutionContext::new(Endpoint::Auction)
        .with_plan(plan())
        .with_account(AccountHooksConfig::new("acc-2"));

    let result = orchestrator.run(request(), context).await.unwrap();

    assert_eq!(result.response().map(String::as_str), Some("b1,b2,b3,b4"));
    assert_eq!(
        orchestrator
            .auction()
            .request_for("bidder1")
            .and_then(|request| request.badv),
        None
    );
}
