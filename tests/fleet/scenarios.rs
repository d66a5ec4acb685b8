//! BDD scenarios for fleet lifecycle operations.

use rstest_bdd_macros::scenario;

use super::test_helpers::{FleetContext, fleet_context};

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Create a batch in an explicit zone"
)]
fn scenario_create_in_explicit_zone(fleet_context: FleetContext) {
    let _ = fleet_context;
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Sample a zone for each instance"
)]
fn scenario_sample_zone_per_instance(fleet_context: FleetContext) {
    let _ = fleet_context;
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Report partial success without rolling back"
)]
fn scenario_partial_success(fleet_context: FleetContext) {
    let _ = fleet_context;
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Restart only terminated instances"
)]
fn scenario_restart_terminated(fleet_context: FleetContext) {
    let _ = fleet_context;
}

#[scenario(
    path = "tests/features/fleet.feature",
    name = "Surface an unreachable provider after siblings finish"
)]
fn scenario_transport_failure(fleet_context: FleetContext) {
    let _ = fleet_context;
}
