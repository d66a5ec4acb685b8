//! Configuration loading via `ortho-config`.

use std::num::NonZeroUsize;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::provider::{DEFAULT_GCLOUD_BIN, GcloudSettings};

/// Fleet configuration derived from environment variables, configuration
/// files, and defaults.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "BETABOOT")]
pub struct BetabootConfig {
    /// Path to the `gcloud` executable.
    #[ortho_config(default = DEFAULT_GCLOUD_BIN.to_owned())]
    pub gcloud_bin: String,
    /// Google Cloud project passed to every `gcloud` call. When unset,
    /// `gcloud` falls back to its own configured project.
    pub project: Option<String>,
    /// Account passed to every `gcloud` call, when set.
    pub account: Option<String>,
    /// Machine type for new instances.
    #[ortho_config(default = "e2-small".to_owned())]
    pub machine_type: String,
    /// Image family for the boot disk.
    #[ortho_config(default = "ubuntu-2204-lts".to_owned())]
    pub image_family: String,
    /// Project that publishes the image family.
    #[ortho_config(default = "ubuntu-os-cloud".to_owned())]
    pub image_project: String,
    /// Service account scopes granted to new instances.
    #[ortho_config(default = "default".to_owned())]
    pub scopes: String,
    /// Directory that receives startup scripts.
    #[ortho_config(default = ".".to_owned())]
    pub script_dir: String,
    /// Maximum number of provider calls in flight per batch. Unbounded when
    /// unset.
    pub max_concurrency: Option<usize>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl BetabootConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to betaboot.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("betaboot")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty,
    /// or [`ConfigError::InvalidConcurrency`] when the concurrency limit is
    /// zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (
                &self.gcloud_bin,
                FieldMetadata::new("gcloud binary", "BETABOOT_GCLOUD_BIN", "gcloud_bin"),
            ),
            (
                &self.machine_type,
                FieldMetadata::new("machine type", "BETABOOT_MACHINE_TYPE", "machine_type"),
            ),
            (
                &self.image_family,
                FieldMetadata::new("image family", "BETABOOT_IMAGE_FAMILY", "image_family"),
            ),
            (
                &self.image_project,
                FieldMetadata::new("image project", "BETABOOT_IMAGE_PROJECT", "image_project"),
            ),
            (
                &self.scopes,
                FieldMetadata::new("instance scopes", "BETABOOT_SCOPES", "scopes"),
            ),
            (
                &self.script_dir,
                FieldMetadata::new(
                    "startup script directory",
                    "BETABOOT_SCRIPT_DIR",
                    "script_dir",
                ),
            ),
        ];
        for (value, metadata) in &required {
            Self::require_field(value, metadata)?;
        }
        if self.max_concurrency == Some(0) {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }

    /// Builds the provider settings injected into the gcloud provider.
    ///
    /// Blank `project` or `account` values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn gcloud_settings(&self) -> Result<GcloudSettings, ConfigError> {
        self.validate()?;
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|trimmed| !trimmed.is_empty())
                .map(str::to_owned)
        };
        Ok(GcloudSettings {
            gcloud_bin: self.gcloud_bin.trim().to_owned(),
            project: non_blank(&self.project),
            account: non_blank(&self.account),
            machine_type: self.machine_type.trim().to_owned(),
            image_family: self.image_family.trim().to_owned(),
            image_project: self.image_project.trim().to_owned(),
            scopes: self.scopes.trim().to_owned(),
        })
    }

    /// Directory that receives startup scripts.
    #[must_use]
    pub fn script_directory(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.script_dir.trim())
    }

    /// Concurrency limit for fan-out; `None` means unbounded.
    #[must_use]
    pub fn concurrency_limit(&self) -> Option<NonZeroUsize> {
        self.max_concurrency.and_then(NonZeroUsize::new)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Raised when `max_concurrency` is zero.
    #[error("max_concurrency must be at least 1; unset it for unbounded fan-out")]
    InvalidConcurrency,
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
