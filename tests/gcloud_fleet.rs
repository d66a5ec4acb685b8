//! End-to-end orchestration over the gcloud provider with a scripted runner.

use std::num::NonZeroUsize;

use betaboot::test_support::{ScriptedRunner, json_instances, json_zones};
use betaboot::{
    BatchRequest, FleetOrchestrator, GcloudProvider, GcloudSettings, LifecycleError,
    StartupScripts, ZoneSelector,
};
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Harness {
    _tmp: TempDir,
    script_dir: Utf8PathBuf,
    runner: ScriptedRunner,
    fleet: FleetOrchestrator<GcloudProvider<ScriptedRunner>>,
}

#[fixture]
fn harness() -> Harness {
    let tmp = TempDir::new().expect("tempdir");
    let script_dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf8 path");
    let runner = ScriptedRunner::new();
    let settings = GcloudSettings {
        project: Some(String::from("nano-beta")),
        ..GcloudSettings::default()
    };
    let provider = GcloudProvider::new(
        settings,
        runner.clone(),
        StartupScripts::new(script_dir.clone()),
    );
    let fleet = FleetOrchestrator::new(provider)
        .with_zone_selector(ZoneSelector::with_seed(5))
        .with_max_concurrency(NonZeroUsize::new(1));
    Harness {
        _tmp: tmp,
        script_dir,
        runner,
        fleet,
    }
}

fn commands(runner: &ScriptedRunner) -> Vec<String> {
    runner
        .invocations()
        .iter()
        .map(betaboot::test_support::CommandInvocation::command_string)
        .collect()
}

#[rstest]
#[tokio::test]
async fn create_samples_zone_and_writes_one_script(harness: Harness) {
    harness.runner.push_output(
        Some(0),
        json_zones(&[("europe-west1-b", "UP"), ("europe-west1-c", "DOWN")]),
        "",
    );
    harness.runner.push_success();
    harness.runner.push_output(Some(0), json_zones(&[("europe-west1-b", "UP")]), "");
    harness.runner.push_success();
    let request = BatchRequest {
        workload_tag: String::from("nanocurrency/nano-beta:V1"),
        count: NonZeroUsize::new(2).expect("positive"),
        zone: None,
    };

    let result = harness.fleet.create(&request).await.expect("no transport failure");

    assert_eq!(result.succeeded, 2);
    let issued = commands(&harness.runner);
    assert_eq!(issued.len(), 4);
    let script = harness
        .script_dir
        .join("startup-script_nanocurrency-nano-beta-v1.sh");
    assert_eq!(
        issued.get(1).map(String::as_str),
        Some(
            format!(
                "gcloud compute instances create nanocurrency-nano-beta-v1-0 \
                 --metadata-from-file startup-script={script} --scopes default \
                 --image-family ubuntu-2204-lts --image-project ubuntu-os-cloud \
                 --machine-type e2-small --zone europe-west1-b --project=nano-beta"
            )
            .as_str()
        )
    );
    let contents = std::fs::read_to_string(script.as_std_path()).expect("script written");
    assert!(contents.contains("nanocurrency/nano-beta:V1"));
}

#[rstest]
#[tokio::test]
async fn delete_acts_on_every_listed_instance(harness: Harness) {
    harness.runner.push_output(
        Some(0),
        json_instances(&[
            ("node-0", "europe-west1-b", "RUNNING"),
            ("node-1", "europe-west1-c", "TERMINATED"),
        ]),
        "",
    );
    harness.runner.push_success();
    harness.runner.push_failure(1, "resource is busy");

    let result = harness.fleet.delete().await.expect("no transport failure");

    assert_eq!(result.attempted, 2);
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.rejected, 1);
    assert_eq!(
        commands(&harness.runner),
        vec![
            String::from("gcloud compute instances list --format json --project=nano-beta"),
            String::from(
                "gcloud compute instances delete node-0 --zone europe-west1-b --quiet --project=nano-beta"
            ),
            String::from(
                "gcloud compute instances delete node-1 --zone europe-west1-c --quiet --project=nano-beta"
            ),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn listing_failure_aborts_before_any_mutation(harness: Harness) {
    harness.runner.push_failure(1, "permission denied");

    let err = harness.fleet.stop().await.expect_err("listing should fail");

    assert!(matches!(err, LifecycleError::Listing(_)));
    assert!(err.to_string().contains("permission denied"));
    assert_eq!(harness.runner.invocations().len(), 1);
}
