//! BDD coverage for the fleet orchestrator.

mod bdd_steps;
mod scenarios;
mod test_helpers;
