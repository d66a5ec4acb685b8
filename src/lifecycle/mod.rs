//! Fleet lifecycle orchestration.
//!
//! Every lifecycle operation fans out one provider call per target instance
//! and waits for all of them before aggregating. A failing instance never
//! cancels its siblings and nothing is rolled back: a batch that creates 3 of
//! 5 instances leaves the 3 running.
//!
//! There is no timeout at this layer. A provider call that never returns
//! holds up the aggregation of its whole batch.

use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::naming::names_for;
use crate::provider::{
    InstanceRecord, InstanceSpec, InstanceStatus, OperationOutcome, Provider, ProviderError,
};
use crate::zone::ZoneSelector;

/// One unit of create work: `count` instances of `workload_tag`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchRequest {
    /// Container image tag the instances run.
    pub workload_tag: String,
    /// Number of instances to create.
    pub count: NonZeroUsize,
    /// Zone shared by every instance; sampled per instance when absent.
    pub zone: Option<String>,
}

/// Lifecycle operations that fan out over a set of instances.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleAction {
    /// Create new instances.
    Create,
    /// Stop every instance.
    Stop,
    /// Start every terminated instance.
    Restart,
    /// Delete every instance.
    Delete,
}

impl LifecycleAction {
    /// Past-tense verb used in summaries.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Stop => "stopped",
            Self::Restart => "restarted",
            Self::Delete => "deleted",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Aggregate outcome of one fan-out.
///
/// `attempted` always equals `succeeded + rejected + errored`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchResult {
    /// Operations dispatched.
    pub attempted: usize,
    /// Operations the provider accepted.
    pub succeeded: usize,
    /// Operations the provider ran and refused.
    pub rejected: usize,
    /// Operations that could not be completed.
    pub errored: usize,
}

impl BatchResult {
    /// One-line summary such as `3 instances created out of 5`.
    #[must_use]
    pub fn summary(&self, action: LifecycleAction) -> String {
        format!(
            "{} instances {} out of {}",
            self.succeeded,
            action.verb(),
            self.attempted
        )
    }

    fn record(
        &mut self,
        action: LifecycleAction,
        outcome: &Result<OperationOutcome, ProviderError>,
    ) {
        self.attempted += 1;
        match outcome {
            Ok(OperationOutcome::Succeeded) => self.succeeded += 1,
            Ok(OperationOutcome::Rejected { .. }) => self.rejected += 1,
            Err(err) => {
                self.errored += 1;
                if err.is_transport() {
                    error!(%action, "provider call failed: {err}");
                } else {
                    warn!(%action, "operation failed: {err}");
                }
            }
        }
    }
}

/// Errors that abort a lifecycle operation.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Listing the fleet failed, so there is nothing to operate on.
    #[error("failed to list instances: {0}")]
    Listing(#[source] ProviderError),
    /// At least one provider call could not be invoked.
    ///
    /// Raised only after every sibling operation has finished.
    #[error(
        "{action} batch could not reach the provider ({} of {} succeeded): {source}",
        .result.succeeded,
        .result.attempted
    )]
    Transport {
        /// Operation that was running.
        action: LifecycleAction,
        /// Counts gathered from every dispatched operation.
        result: BatchResult,
        /// First transport failure observed.
        #[source]
        source: ProviderError,
    },
}

/// Runs lifecycle operations against a provider.
#[derive(Debug)]
pub struct FleetOrchestrator<P> {
    provider: P,
    zones: ZoneSelector,
    max_concurrency: Option<NonZeroUsize>,
}

impl<P: Provider> FleetOrchestrator<P> {
    /// Creates an orchestrator with unbounded fan-out.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            zones: ZoneSelector::new(),
            max_concurrency: None,
        }
    }

    /// Replaces the zone selector (for example with a seeded one).
    #[must_use]
    pub fn with_zone_selector(mut self, zones: ZoneSelector) -> Self {
        self.zones = zones;
        self
    }

    /// Caps how many provider calls run at once; `None` is unbounded.
    #[must_use]
    pub const fn with_max_concurrency(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.max_concurrency = limit;
        self
    }

    /// Creates `request.count` instances of `request.workload_tag`.
    ///
    /// Each instance resolves its zone independently unless the request
    /// names one.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Transport`] when any create could not reach
    /// the provider.
    pub async fn create(&self, request: &BatchRequest) -> Result<BatchResult, LifecycleError> {
        let explicit_zone = request.zone.as_deref();
        let operations = names_for(&request.workload_tag, request.count.get())
            .into_iter()
            .map(|name| async move {
                let zone = self
                    .zones
                    .resolve_zone(&self.provider, explicit_zone)
                    .await?;
                let spec = InstanceSpec {
                    name,
                    zone,
                    workload_tag: request.workload_tag.clone(),
                };
                self.provider.create_instance(&spec).await
            });
        self.fan_out(LifecycleAction::Create, operations).await
    }

    /// Stops every instance the provider lists.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Listing`] when the fleet cannot be listed,
    /// or [`LifecycleError::Transport`] when any stop could not reach the
    /// provider.
    pub async fn stop(&self) -> Result<BatchResult, LifecycleError> {
        let records = self.list().await?;
        let operations = records
            .iter()
            .map(|record| self.provider.stop_instance(record));
        self.fan_out(LifecycleAction::Stop, operations).await
    }

    /// Starts every instance whose status is `TERMINATED`.
    ///
    /// # Errors
    ///
    /// Same as [`FleetOrchestrator::stop`].
    pub async fn restart(&self) -> Result<BatchResult, LifecycleError> {
        let records = self.list().await?;
        let operations = records
            .iter()
            .filter(|record| record.status == InstanceStatus::Terminated)
            .map(|record| self.provider.start_instance(record));
        self.fan_out(LifecycleAction::Restart, operations).await
    }

    /// Deletes every instance the provider lists.
    ///
    /// # Errors
    ///
    /// Same as [`FleetOrchestrator::stop`].
    pub async fn delete(&self) -> Result<BatchResult, LifecycleError> {
        let records = self.list().await?;
        let operations = records
            .iter()
            .map(|record| self.provider.delete_instance(record));
        self.fan_out(LifecycleAction::Delete, operations).await
    }

    /// Fetches a fresh listing of the fleet.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Listing`] when the provider call fails.
    pub async fn list(&self) -> Result<Vec<InstanceRecord>, LifecycleError> {
        self.provider
            .list_instances()
            .await
            .map_err(LifecycleError::Listing)
    }

    async fn fan_out<I, F>(
        &self,
        action: LifecycleAction,
        operations: I,
    ) -> Result<BatchResult, LifecycleError>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<OperationOutcome, ProviderError>>,
    {
        let limit = self.max_concurrency.map_or(usize::MAX, NonZeroUsize::get);
        let outcomes: Vec<_> = stream::iter(operations)
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut result = BatchResult::default();
        let mut transport = None;
        for outcome in outcomes {
            result.record(action, &outcome);
            if let Err(err) = outcome
                && err.is_transport()
                && transport.is_none()
            {
                transport = Some(err);
            }
        }

        info!(%action, "{}", result.summary(action));
        match transport {
            Some(source) => Err(LifecycleError::Transport {
                action,
                result,
                source,
            }),
            None => Ok(result),
        }
    }
}
