//! Compute Engine provider that shells out to the `gcloud` CLI.

use std::ffi::OsString;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::{
    InstanceRecord, InstanceSpec, InstanceStatus, OperationOutcome, Provider, ProviderError,
    ProviderFuture,
};
use crate::command::{CommandOutput, CommandRunner, ProcessCommandRunner};
use crate::startup_script::StartupScripts;

/// Default `gcloud` binary name.
pub const DEFAULT_GCLOUD_BIN: &str = "gcloud";

/// Settings injected into [`GcloudProvider`] once at construction.
///
/// Project and account are passed explicitly on every call instead of being
/// read from the ambient `gcloud` configuration inside operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GcloudSettings {
    /// Path to the `gcloud` executable.
    pub gcloud_bin: String,
    /// Project passed as `--project`, when set.
    pub project: Option<String>,
    /// Account passed as `--account`, when set.
    pub account: Option<String>,
    /// Machine type for new instances (for example `e2-small`).
    pub machine_type: String,
    /// Image family for the boot disk.
    pub image_family: String,
    /// Project that publishes the image family.
    pub image_project: String,
    /// Service account scopes granted to new instances.
    pub scopes: String,
}

impl Default for GcloudSettings {
    fn default() -> Self {
        Self {
            gcloud_bin: DEFAULT_GCLOUD_BIN.to_owned(),
            project: None,
            account: None,
            machine_type: String::from("e2-small"),
            image_family: String::from("ubuntu-2204-lts"),
            image_project: String::from("ubuntu-os-cloud"),
            scopes: String::from("default"),
        }
    }
}

/// Provider backed by `gcloud compute`.
#[derive(Debug)]
pub struct GcloudProvider<R: CommandRunner> {
    settings: GcloudSettings,
    runner: R,
    scripts: StartupScripts,
}

impl GcloudProvider<ProcessCommandRunner> {
    /// Creates a provider wired to the real process runner.
    #[must_use]
    pub fn with_process_runner(settings: GcloudSettings, scripts: StartupScripts) -> Self {
        Self::new(settings, ProcessCommandRunner, scripts)
    }
}

impl<R: CommandRunner> GcloudProvider<R> {
    /// Creates a provider using the given settings, runner and script cache.
    #[must_use]
    pub const fn new(settings: GcloudSettings, runner: R, scripts: StartupScripts) -> Self {
        Self {
            settings,
            runner,
            scripts,
        }
    }

    fn command_args(&self, parts: &[&str]) -> Vec<OsString> {
        let mut args: Vec<OsString> = parts.iter().map(|part| OsString::from(*part)).collect();
        if let Some(project) = &self.settings.project {
            args.push(OsString::from(format!("--project={project}")));
        }
        if let Some(account) = &self.settings.account {
            args.push(OsString::from(format!("--account={account}")));
        }
        args
    }

    async fn list_json<T: DeserializeOwned>(
        &self,
        parts: &[&str],
        resource: &str,
    ) -> Result<Vec<T>, ProviderError> {
        let args = self.command_args(parts);
        let output = self.runner.run(&self.settings.gcloud_bin, &args).await?;
        if !output.is_success() {
            return Err(ProviderError::CommandFailure {
                operation: format!("list {resource}"),
                status_text: output.status_text(),
                stderr: output.stderr.trim().to_owned(),
            });
        }
        serde_json::from_str::<Vec<T>>(&output.stdout).map_err(|err| ProviderError::Parse {
            resource: resource.to_owned(),
            message: err.to_string(),
        })
    }

    async fn list_instances_impl(&self) -> Result<Vec<InstanceRecord>, ProviderError> {
        let instances: Vec<GcloudInstance> = self
            .list_json(
                &["compute", "instances", "list", "--format", "json"],
                "instances",
            )
            .await?;
        Ok(instances.into_iter().map(InstanceRecord::from).collect())
    }

    async fn list_zones_impl(&self) -> Result<Vec<String>, ProviderError> {
        let zones: Vec<GcloudZone> = self
            .list_json(&["compute", "zones", "list", "--format", "json"], "zones")
            .await?;
        Ok(zones
            .into_iter()
            .filter(GcloudZone::is_available)
            .map(|zone| zone.name)
            .collect())
    }

    async fn create_impl(&self, spec: &InstanceSpec) -> Result<OperationOutcome, ProviderError> {
        let script = self.scripts.ensure(&spec.workload_tag)?;
        let metadata = format!("startup-script={script}");
        let args = self.command_args(&[
            "compute",
            "instances",
            "create",
            spec.name.as_str(),
            "--metadata-from-file",
            metadata.as_str(),
            "--scopes",
            self.settings.scopes.as_str(),
            "--image-family",
            self.settings.image_family.as_str(),
            "--image-project",
            self.settings.image_project.as_str(),
            "--machine-type",
            self.settings.machine_type.as_str(),
            "--zone",
            spec.zone.as_str(),
        ]);
        info!(instance = %spec.name, zone = %spec.zone, "creating instance");
        self.mutate("create", &spec.name, &args).await
    }

    async fn record_action(
        &self,
        action: &str,
        record: &InstanceRecord,
        extra: &[&str],
    ) -> Result<OperationOutcome, ProviderError> {
        let mut parts = vec![
            "compute",
            "instances",
            action,
            record.name.as_str(),
            "--zone",
            record.zone.as_str(),
        ];
        parts.extend_from_slice(extra);
        let args = self.command_args(&parts);
        info!(instance = %record.name, zone = %record.zone, action, "updating instance");
        self.mutate(action, &record.name, &args).await
    }

    async fn mutate(
        &self,
        action: &str,
        instance: &str,
        args: &[OsString],
    ) -> Result<OperationOutcome, ProviderError> {
        let output = self.runner.run(&self.settings.gcloud_bin, args).await?;
        if output.is_success() {
            return Ok(OperationOutcome::Succeeded);
        }

        let reason = rejection_reason(&output);
        warn!(
            instance,
            action,
            status = %output.status_text(),
            "provider rejected operation: {reason}"
        );
        Ok(OperationOutcome::Rejected { reason })
    }
}

impl<R: CommandRunner> Provider for GcloudProvider<R> {
    fn list_instances(&self) -> ProviderFuture<'_, Vec<InstanceRecord>> {
        Box::pin(self.list_instances_impl())
    }

    fn list_zones(&self) -> ProviderFuture<'_, Vec<String>> {
        Box::pin(self.list_zones_impl())
    }

    fn create_instance<'a>(
        &'a self,
        spec: &'a InstanceSpec,
    ) -> ProviderFuture<'a, OperationOutcome> {
        Box::pin(self.create_impl(spec))
    }

    fn stop_instance<'a>(
        &'a self,
        record: &'a InstanceRecord,
    ) -> ProviderFuture<'a, OperationOutcome> {
        Box::pin(self.record_action("stop", record, &[]))
    }

    fn start_instance<'a>(
        &'a self,
        record: &'a InstanceRecord,
    ) -> ProviderFuture<'a, OperationOutcome> {
        Box::pin(self.record_action("start", record, &[]))
    }

    fn delete_instance<'a>(
        &'a self,
        record: &'a InstanceRecord,
    ) -> ProviderFuture<'a, OperationOutcome> {
        Box::pin(self.record_action("delete", record, &["--quiet"]))
    }
}

fn rejection_reason(output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("exited with status {}", output.status_text())
    } else {
        stderr.to_owned()
    }
}

#[derive(Clone, Debug, Deserialize)]
struct GcloudInstance {
    name: String,
    zone: String,
    status: InstanceStatus,
}

impl From<GcloudInstance> for InstanceRecord {
    fn from(value: GcloudInstance) -> Self {
        let zone = value
            .zone
            .rsplit('/')
            .next()
            .map_or_else(|| value.zone.clone(), str::to_owned);
        Self {
            name: value.name,
            zone,
            status: value.status,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct GcloudZone {
    name: String,
    #[serde(default)]
    status: Option<String>,
}

impl GcloudZone {
    fn is_available(&self) -> bool {
        self.status.as_deref().is_none_or(|status| status == "UP")
    }
}
