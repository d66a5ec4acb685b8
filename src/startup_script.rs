//! Guest bootstrap scripts passed to new instances as metadata.
//!
//! The script only depends on the workload tag, so it is written once per
//! normalised tag and reused by every create for that tag. Two raw tags that
//! normalise to the same name would share a file; the second one is refused
//! instead of overwriting the first tag's content.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::naming::{SafeName, normalize};

/// Errors raised while materialising a startup script.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StartupScriptError {
    /// Raised when the script directory cannot be opened or written.
    #[error("failed to write startup script `{path}`: {message}")]
    Io {
        /// Path of the script that failed to write.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Raised when two different tags normalise to the same file name.
    #[error("workload tag `{requested}` collides with `{existing}` on startup script name `{name}`")]
    TagCollision {
        /// Shared normalised name.
        name: SafeName,
        /// Tag that already owns the script.
        existing: String,
        /// Tag that was refused.
        requested: String,
    },
}

/// Renders the startup script for a workload tag.
#[must_use]
pub fn render(workload_tag: &str) -> String {
    format!(
        concat!(
            "#!/bin/bash\n",
            "apt-get update\n",
            "apt-get install -y docker.io\n",
            "systemctl start docker\n",
            "systemctl enable docker\n",
            "docker run --restart=unless-stopped -d -p 54000:54000 ",
            "-p 127.0.0.1:55000:55000 -p 127.0.0.1:57000:57000 -v nano:/root ",
            "--name nanobeta {tag} nano_node daemon --network=beta\n",
        ),
        tag = workload_tag
    )
}

/// File name used for a normalised tag's script.
#[must_use]
pub fn file_name(name: &SafeName) -> String {
    format!("startup-script_{name}.sh")
}

/// Write-once cache of startup scripts keyed by normalised tag.
///
/// `ensure` holds a `std::sync::Mutex` across a blocking file write. This
/// assumes every create of a fan-out is polled on the same task; calling it
/// from several spawned tasks would stall runtime workers on the lock.
#[derive(Debug)]
pub struct StartupScripts {
    dir: Utf8PathBuf,
    written: Mutex<HashMap<SafeName, String>>,
}

impl StartupScripts {
    /// Creates a cache that writes scripts into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Mutex::new(HashMap::new()),
        }
    }

    /// Directory that receives the scripts.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Ensures the script for `workload_tag` exists and returns its path.
    ///
    /// The file is written the first time a tag is seen in this process;
    /// later calls return the cached path without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`StartupScriptError::TagCollision`] when another tag already
    /// owns the normalised name, or [`StartupScriptError::Io`] when the write
    /// fails.
    pub fn ensure(&self, workload_tag: &str) -> Result<Utf8PathBuf, StartupScriptError> {
        let name = normalize(workload_tag);
        let path = self.dir.join(file_name(&name));
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = written.get(&name) {
            if existing == workload_tag {
                return Ok(path);
            }
            return Err(StartupScriptError::TagCollision {
                name,
                existing: existing.clone(),
                requested: workload_tag.to_owned(),
            });
        }

        let io_error = |message: String| StartupScriptError::Io {
            path: path.clone(),
            message,
        };
        let dir = Dir::open_ambient_dir(&self.dir, ambient_authority())
            .map_err(|err| io_error(err.to_string()))?;
        dir.write(file_name(&name), render(workload_tag))
            .map_err(|err| io_error(err.to_string()))?;

        written.insert(name, workload_tag.to_owned());
        Ok(path)
    }
}
