//! Provider abstraction for listing and mutating fleet instances.
//!
//! Each operation is one request/response call with no retry. Mutating calls
//! distinguish a provider-side refusal ([`OperationOutcome::Rejected`]) from a
//! call that could not be made at all ([`ProviderError`]).

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use thiserror::Error;

use crate::command::CommandError;
use crate::startup_script::StartupScriptError;

mod gcloud;

pub use gcloud::{DEFAULT_GCLOUD_BIN, GcloudProvider, GcloudSettings};

/// Provider-reported lifecycle state of an instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(from = "String")]
pub enum InstanceStatus {
    /// The instance is up.
    Running,
    /// The instance is stopped and can be started again.
    Terminated,
    /// Any other provider state (for example `STOPPING`).
    Other(String),
}

impl From<String> for InstanceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "RUNNING" => Self::Running,
            "TERMINATED" => Self::Terminated,
            _ => Self::Other(value),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("RUNNING"),
            Self::Terminated => f.write_str("TERMINATED"),
            Self::Other(status) => f.write_str(status),
        }
    }
}

/// Read-only projection of an instance as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceRecord {
    /// Instance name.
    pub name: String,
    /// Zone name (last segment of the provider's zone URL).
    pub zone: String,
    /// Current lifecycle state.
    pub status: InstanceStatus,
}

/// Parameters for creating one instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceSpec {
    /// Instance name derived from the workload tag.
    pub name: String,
    /// Zone the instance is placed in.
    pub zone: String,
    /// Container image tag the instance runs.
    pub workload_tag: String,
}

/// Outcome of a mutating provider call that ran to completion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OperationOutcome {
    /// The provider accepted the operation.
    Succeeded,
    /// The provider ran but refused the operation.
    Rejected {
        /// Diagnostic text reported by the provider.
        reason: String,
    },
}

impl OperationOutcome {
    /// Returns `true` for [`OperationOutcome::Succeeded`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Errors raised when a provider call cannot be completed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// The provider CLI could not be invoked.
    #[error(transparent)]
    Transport(#[from] CommandError),
    /// A listing call exited with a non-zero status.
    #[error("{operation} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Operation being performed (for example `list instances`).
        operation: String,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Listing output could not be parsed.
    #[error("failed to parse {resource} output: {message}")]
    Parse {
        /// Resource being parsed (for example `instances`).
        resource: String,
        /// Parser error message.
        message: String,
    },
    /// The provider reported no available zones.
    #[error("provider reported no available zones")]
    NoZonesAvailable,
    /// The startup script for a create could not be prepared.
    #[error(transparent)]
    StartupScript(#[from] StartupScriptError),
}

impl ProviderError {
    /// Returns `true` when the provider CLI could not be invoked at all.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Interface implemented by instance providers.
pub trait Provider: Send + Sync {
    /// Lists every instance currently known to the provider.
    fn list_instances(&self) -> ProviderFuture<'_, Vec<InstanceRecord>>;

    /// Lists the zones new instances can be placed in.
    fn list_zones(&self) -> ProviderFuture<'_, Vec<String>>;

    /// Creates one instance.
    fn create_instance<'a>(&'a self, spec: &'a InstanceSpec)
    -> ProviderFuture<'a, OperationOutcome>;

    /// Stops a running instance.
    fn stop_instance<'a>(
        &'a self,
        record: &'a InstanceRecord,
    ) -> ProviderFuture<'a, OperationOutcome>;

    /// Starts a stopped instance.
    fn start_instance<'a>(
        &'a self,
        record: &'a InstanceRecord,
    ) -> ProviderFuture<'a, OperationOutcome>;

    /// Deletes an instance.
    fn delete_instance<'a>(
        &'a self,
        record: &'a InstanceRecord,
    ) -> ProviderFuture<'a, OperationOutcome>;
}
