//! Command-line interface definitions for the `betaboot` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `betaboot` binary.
///
/// Flags combine; they run in the order create, stop, restart, delete, list.
#[derive(Debug, Default, Parser)]
#[command(
    name = "betaboot",
    about = "Manage Compute Engine instances running a containerised Nano beta node",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Create instances for one or more workload tags.
    ///
    /// Takes repeated `TAG COUNT [ZONE]` groups. Without a zone, each
    /// instance is placed in a randomly chosen available zone.
    ///
    /// The token after COUNT is a zone only when it is not a number and the
    /// token after it is not a number either. Otherwise it starts the next
    /// group: `a 2 europe-west1-b 5` creates 2 of `a` and 5 of
    /// `europe-west1-b`.
    #[arg(long, num_args = 2.., value_name = "TAG COUNT [ZONE]")]
    pub(crate) create: Vec<String>,
    /// Stop every instance.
    #[arg(long)]
    pub(crate) stop: bool,
    /// Start every terminated instance.
    #[arg(long)]
    pub(crate) restart: bool,
    /// Delete every instance.
    #[arg(long)]
    pub(crate) delete: bool,
    /// List every instance with its zone and status.
    #[arg(long)]
    pub(crate) list: bool,
}
