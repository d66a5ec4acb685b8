//! Core library for the betaboot fleet tool.
//!
//! The crate manages a fleet of Compute Engine instances that each run one
//! containerised Nano beta node. Instance names derive from the workload tag,
//! zones are sampled from those the provider reports, and every lifecycle
//! operation fans out concurrently and reports an aggregate count.

pub mod batch;
pub mod command;
pub mod config;
pub mod lifecycle;
pub mod naming;
pub mod provider;
pub mod startup_script;
pub mod test_support;
pub mod zone;

pub use batch::{BatchParseError, parse_batch_requests, run_batches};
pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{BetabootConfig, ConfigError};
pub use lifecycle::{
    BatchRequest, BatchResult, FleetOrchestrator, LifecycleAction, LifecycleError,
};
pub use naming::{SAFE_NAME_MAX_LEN, SafeName, names_for, normalize};
pub use provider::{
    DEFAULT_GCLOUD_BIN, GcloudProvider, GcloudSettings, InstanceRecord, InstanceSpec,
    InstanceStatus, OperationOutcome, Provider, ProviderError,
};
pub use startup_script::{StartupScriptError, StartupScripts};
pub use zone::ZoneSelector;
