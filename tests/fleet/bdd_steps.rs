//! BDD step definitions for fleet lifecycle behaviour.

use betaboot::test_support::record;
use betaboot::{BatchResult, InstanceStatus, LifecycleAction, LifecycleError};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{FleetContext, FleetOutcome, create_request, orchestrator};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a provider offering zones \"{zones}\"")]
fn provider_offering_zones(mut fleet_context: FleetContext, zones: String) -> FleetContext {
    let names: Vec<&str> = zones.split(',').map(str::trim).collect();
    fleet_context.provider = fleet_context.provider.with_zones(&names);
    fleet_context
}

#[given("the provider accepts only the first {count:u32} operations")]
fn provider_accepts_first(mut fleet_context: FleetContext, count: u32) -> FleetContext {
    let limit = usize::try_from(count).unwrap_or(usize::MAX);
    fleet_context.provider = fleet_context.provider.succeeding_first(limit);
    fleet_context
}

#[given("the provider cannot be reached for instance \"{name}\"")]
fn provider_unreachable_for(mut fleet_context: FleetContext, name: String) -> FleetContext {
    fleet_context.provider = fleet_context.provider.transport_failure_for(name.trim());
    fleet_context
}

#[given("a fleet with running instance \"{running}\" and terminated instance \"{terminated}\"")]
fn fleet_with_instances(
    mut fleet_context: FleetContext,
    running: String,
    terminated: String,
) -> FleetContext {
    fleet_context.provider = fleet_context.provider.with_instances(vec![
        record(running.trim(), "z-1", InstanceStatus::Running),
        record(terminated.trim(), "z-1", InstanceStatus::Terminated),
    ]);
    fleet_context
}

fn settle(
    action: LifecycleAction,
    result: Result<BatchResult, LifecycleError>,
) -> FleetOutcome {
    match result {
        Ok(summary) => FleetOutcome::Completed(action, summary),
        Err(LifecycleError::Transport { result, .. }) => FleetOutcome::Transport(action, result),
        Err(err) => FleetOutcome::Failure(err.to_string()),
    }
}

fn create(
    mut fleet_context: FleetContext,
    count: u32,
    tag: &str,
    zone: Option<&str>,
) -> FleetContext {
    let fleet = orchestrator(&fleet_context.provider);
    let request = create_request(tag, count, zone);
    fleet_context.outcome = Some(match Runtime::new() {
        Ok(runtime) => {
            let result = runtime.block_on(async move { fleet.create(&request).await });
            settle(LifecycleAction::Create, result)
        }
        Err(err) => FleetOutcome::Failure(err.to_string()),
    });
    fleet_context
}

#[when("I create {count:u32} instances of \"{tag}\" in zone \"{zone}\"")]
fn create_in_zone(
    fleet_context: FleetContext,
    count: u32,
    tag: String,
    zone: String,
) -> FleetContext {
    create(fleet_context, count, tag.trim(), Some(zone.trim()))
}

#[when("I create {count:u32} instances of \"{tag}\" in any zone")]
fn create_in_any_zone(fleet_context: FleetContext, count: u32, tag: String) -> FleetContext {
    create(fleet_context, count, tag.trim(), None)
}

#[when("I restart the fleet")]
fn restart_fleet(mut fleet_context: FleetContext) -> FleetContext {
    let fleet = orchestrator(&fleet_context.provider);
    fleet_context.outcome = Some(match Runtime::new() {
        Ok(runtime) => {
            let result = runtime.block_on(async move { fleet.restart().await });
            settle(LifecycleAction::Restart, result)
        }
        Err(err) => FleetOutcome::Failure(err.to_string()),
    });
    fleet_context
}

#[then("the summary reads \"{summary}\"")]
fn summary_reads(fleet_context: &FleetContext, summary: String) -> Result<(), StepError> {
    let Some(outcome) = fleet_context.outcome.as_ref() else {
        return Err(StepError::Assertion(String::from("missing outcome")));
    };
    let FleetOutcome::Completed(action, result) = outcome else {
        return Err(StepError::Assertion(format!(
            "expected completion, got: {outcome:?}"
        )));
    };
    let actual = result.summary(*action);
    if actual == summary.trim() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected summary `{summary}`, got `{actual}`"
        )))
    }
}

#[then("every created instance is placed in zone \"{zone}\"")]
fn every_instance_in_zone(fleet_context: &FleetContext, zone: String) -> Result<(), StepError> {
    let creates = fleet_context.provider.calls().creates;
    if creates.is_empty() {
        return Err(StepError::Assertion(String::from("no instances created")));
    }
    match creates.iter().find(|spec| spec.zone != zone.trim()) {
        None => Ok(()),
        Some(spec) => Err(StepError::Assertion(format!(
            "{} was placed in {}",
            spec.name, spec.zone
        ))),
    }
}

fn expect_zone_listings(fleet_context: &FleetContext, expected: usize) -> Result<(), StepError> {
    let calls = fleet_context.provider.calls().list_zones;
    if calls == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected} zone listings, got {calls}"
        )))
    }
}

#[then("the provider was never asked for zones")]
fn zones_never_listed(fleet_context: &FleetContext) -> Result<(), StepError> {
    expect_zone_listings(fleet_context, 0)
}

#[then("the provider was asked for zones {times:u32} times")]
fn zones_listed_times(fleet_context: &FleetContext, times: u32) -> Result<(), StepError> {
    expect_zone_listings(fleet_context, times as usize)
}

#[then("only \"{name}\" was started")]
fn only_started(fleet_context: &FleetContext, name: String) -> Result<(), StepError> {
    let starts = fleet_context.provider.calls().starts;
    if starts == [name.trim().to_owned()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected only {name} to start, got {starts:?}"
        )))
    }
}

#[then(
    "the batch fails with a transport error after {succeeded:u32} of {attempted:u32} succeeded"
)]
fn fails_with_transport(
    fleet_context: &FleetContext,
    succeeded: u32,
    attempted: u32,
) -> Result<(), StepError> {
    let Some(outcome) = fleet_context.outcome.as_ref() else {
        return Err(StepError::Assertion(String::from("missing outcome")));
    };
    let FleetOutcome::Transport(_, result) = outcome else {
        return Err(StepError::Assertion(format!(
            "expected transport failure, got: {outcome:?}"
        )));
    };
    if result.succeeded == succeeded as usize && result.attempted == attempted as usize {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {succeeded} of {attempted}, got {result:?}"
        )))
    }
}
