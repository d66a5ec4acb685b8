//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::command::{CommandError, CommandFuture, CommandOutput, CommandRunner};
use crate::provider::{
    InstanceRecord, InstanceSpec, InstanceStatus, OperationOutcome, Provider, ProviderError,
    ProviderFuture,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32, stderr: impl Into<String>) {
        self.push_output(Some(code), "", stderr);
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> CommandFuture<'a> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        let response = lock(&self.responses)
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            });
        Box::pin(async move { response })
    }
}

/// Produces a JSON payload shaped like `gcloud compute instances list --format json`.
#[must_use]
pub fn json_instances(instances: &[(&str, &str, &str)]) -> String {
    let items = instances
        .iter()
        .map(|(name, zone, status)| {
            format!(
                concat!(
                    "{{\"name\":\"{name}\",",
                    "\"zone\":\"https://www.googleapis.com/compute/v1/projects/demo/zones/{zone}\",",
                    "\"status\":\"{status}\"}}"
                ),
                name = name,
                zone = zone,
                status = status
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("[{items}]")
}

/// Produces a JSON payload shaped like `gcloud compute zones list --format json`.
#[must_use]
pub fn json_zones(zones: &[(&str, &str)]) -> String {
    let items = zones
        .iter()
        .map(|(name, status)| format!("{{\"name\":\"{name}\",\"status\":\"{status}\"}}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{items}]")
}

/// Builds an [`InstanceRecord`] for tests.
#[must_use]
pub fn record(name: &str, zone: &str, status: InstanceStatus) -> InstanceRecord {
    InstanceRecord {
        name: name.to_owned(),
        zone: zone.to_owned(),
        status,
    }
}

/// Calls observed by a [`StubProvider`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StubCalls {
    /// Number of `list_instances` calls.
    pub list_instances: usize,
    /// Number of `list_zones` calls.
    pub list_zones: usize,
    /// Specs passed to `create_instance`, in call order.
    pub creates: Vec<InstanceSpec>,
    /// Names passed to `stop_instance`, in call order.
    pub stops: Vec<String>,
    /// Names passed to `start_instance`, in call order.
    pub starts: Vec<String>,
    /// Names passed to `delete_instance`, in call order.
    pub deletes: Vec<String>,
}

#[derive(Debug, Default)]
struct StubState {
    instances: Vec<InstanceRecord>,
    zones: Vec<String>,
    listing_error: Option<ProviderError>,
    zones_error: Option<ProviderError>,
    succeed_first: Option<usize>,
    transport_failures: Vec<String>,
    calls: StubCalls,
}

/// In-memory provider with programmable outcomes.
///
/// Every mutating call yields to the scheduler once so concurrent dispatch
/// can be observed through [`StubProvider::max_in_flight`].
#[derive(Clone, Debug, Default)]
pub struct StubProvider {
    state: Arc<Mutex<StubState>>,
    mutations: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl StubProvider {
    /// Creates a provider with no instances and no zones.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instances returned by `list_instances`.
    #[must_use]
    pub fn with_instances(self, instances: Vec<InstanceRecord>) -> Self {
        lock(&self.state).instances = instances;
        self
    }

    /// Sets the zones returned by `list_zones`.
    #[must_use]
    pub fn with_zones(self, zones: &[&str]) -> Self {
        lock(&self.state).zones = zones.iter().map(|zone| (*zone).to_owned()).collect();
        self
    }

    /// Makes `list_instances` fail with `error`.
    #[must_use]
    pub fn failing_listing(self, error: ProviderError) -> Self {
        lock(&self.state).listing_error = Some(error);
        self
    }

    /// Makes `list_zones` fail with `error`.
    #[must_use]
    pub fn failing_zones(self, error: ProviderError) -> Self {
        lock(&self.state).zones_error = Some(error);
        self
    }

    /// Accepts only the first `count` mutating calls; later ones are rejected.
    #[must_use]
    pub fn succeeding_first(self, count: usize) -> Self {
        lock(&self.state).succeed_first = Some(count);
        self
    }

    /// Makes any mutating call on `name` fail with a transport error.
    #[must_use]
    pub fn transport_failure_for(self, name: &str) -> Self {
        lock(&self.state).transport_failures.push(name.to_owned());
        self
    }

    /// Snapshot of the calls observed so far.
    #[must_use]
    pub fn calls(&self) -> StubCalls {
        lock(&self.state).calls.clone()
    }

    /// Highest number of mutating calls that were in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn mutation<'a>(&'a self, name: String) -> ProviderFuture<'a, OperationOutcome> {
        let ordinal = self.mutations.fetch_add(1, Ordering::SeqCst);
        let (transport_failure, accepted) = {
            let state = lock(&self.state);
            (
                state.transport_failures.contains(&name),
                state.succeed_first.is_none_or(|limit| ordinal < limit),
            )
        };

        Box::pin(async move {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if transport_failure {
                return Err(ProviderError::Transport(CommandError::Spawn {
                    program: String::from("stub"),
                    message: format!("transport failure for {name}"),
                }));
            }
            if accepted {
                Ok(OperationOutcome::Succeeded)
            } else {
                Ok(OperationOutcome::Rejected {
                    reason: format!("stub rejected {name}"),
                })
            }
        })
    }
}

impl Provider for StubProvider {
    fn list_instances(&self) -> ProviderFuture<'_, Vec<InstanceRecord>> {
        let mut state = lock(&self.state);
        state.calls.list_instances += 1;
        let result = state
            .listing_error
            .clone()
            .map_or_else(|| Ok(state.instances.clone()), Err);
        Box::pin(async move { result })
    }

    fn list_zones(&self) -> ProviderFuture<'_, Vec<String>> {
        let mut state = lock(&self.state);
        state.calls.list_zones += 1;
        let result = state
            .zones_error
            .clone()
            .map_or_else(|| Ok(state.zones.clone()), Err);
        Box::pin(async move { result })
    }

    fn create_instance<'a>(
        &'a self,
        spec: &'a InstanceSpec,
    ) -> ProviderFuture<'a, OperationOutcome> {
        lock(&self.state).calls.creates.push(spec.clone());
        self.mutation(spec.name.clone())
    }

    fn stop_instance<'a>(
        &'a self,
        record: &'a InstanceRecord,
    ) -> ProviderFuture<'a, OperationOutcome> {
        lock(&self.state).calls.stops.push(record.name.clone());
        self.mutation(record.name.clone())
    }

    fn start_instance<'a>(
        &'a self,
        record: &'a InstanceRecord,
    ) -> ProviderFuture<'a, OperationOutcome> {
        lock(&self.state).calls.starts.push(record.name.clone());
        self.mutation(record.name.clone())
    }

    fn delete_instance<'a>(
        &'a self,
        record: &'a InstanceRecord,
    ) -> ProviderFuture<'a, OperationOutcome> {
        lock(&self.state).calls.deletes.push(record.name.clone());
        self.mutation(record.name.clone())
    }
}
