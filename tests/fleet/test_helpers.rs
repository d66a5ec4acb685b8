//! Shared fixtures and helpers for fleet BDD scenarios.

use std::num::NonZeroUsize;

use betaboot::test_support::StubProvider;
use betaboot::{BatchRequest, BatchResult, FleetOrchestrator, LifecycleAction, ZoneSelector};
use rstest::fixture;

#[derive(Clone, Debug)]
pub enum FleetOutcome {
    Completed(LifecycleAction, BatchResult),
    Transport(LifecycleAction, BatchResult),
    Failure(String),
}

#[derive(Clone, Debug)]
pub struct FleetContext {
    pub provider: StubProvider,
    pub outcome: Option<FleetOutcome>,
}

#[fixture]
pub fn fleet_context() -> FleetContext {
    FleetContext {
        provider: StubProvider::new(),
        outcome: None,
    }
}

pub fn orchestrator(provider: &StubProvider) -> FleetOrchestrator<StubProvider> {
    FleetOrchestrator::new(provider.clone()).with_zone_selector(ZoneSelector::with_seed(17))
}

pub fn create_request(tag: &str, count: u32, zone: Option<&str>) -> BatchRequest {
    let instances = usize::try_from(count)
        .ok()
        .and_then(NonZeroUsize::new)
        .unwrap_or_else(|| panic!("scenario count must be positive: {count}"));
    BatchRequest {
        workload_tag: tag.to_owned(),
        count: instances,
        zone: zone.map(str::to_owned),
    }
}
