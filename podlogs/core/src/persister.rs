use std::{
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::model::LogPayload;

#[cfg(unix)]
const LOG_FILE_MODE: u32 = 0o644;

/// How a pod name turns into a file name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileNaming {
    /// `<pod>.log`
    #[default]
    Plain,
    /// `<pod>-<RFC3339 timestamp>.log`
    Timestamped,
}

/// Derive the log file name for a pod.
#[must_use]
pub fn log_file_name(pod: &str, naming: FileNaming, now: DateTime<Utc>) -> String {
    match naming {
        FileNaming::Plain => format!("{pod}.log"),
        FileNaming::Timestamped => format!(
            "{pod}-{}.log",
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
    }
}

#[derive(Debug, thiserror::Error)]
/// Failures while writing a pod's logs to disk.
pub enum WriteError {
    #[error("failed to stage log file in {dir}: {source}")]
    Stage {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write logs destined for {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to move logs into place at {path}: {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("log write task did not complete: {message}")]
    TaskFailed { message: String },
}

/// Writes payloads into one output directory.
#[derive(Clone, Debug)]
pub struct Persister {
    output_dir: PathBuf,
    naming: FileNaming,
}

impl Persister {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, naming: FileNaming) -> Self {
        Self {
            output_dir: output_dir.into(),
            naming,
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub const fn naming(&self) -> FileNaming {
        self.naming
    }

    /// Write `payload` for `pod` and return the final path.
    ///
    /// The bytes are staged in a temporary file inside the output directory
    /// and renamed into place, so the returned path always holds the complete
    /// payload. On error nothing is left at the destination.
    pub fn persist(
        &self,
        pod: &str,
        payload: &LogPayload,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, WriteError> {
        let path = self
            .output_dir
            .join(log_file_name(pod, self.naming, now));

        let mut staged =
            NamedTempFile::new_in(&self.output_dir).map_err(|source| WriteError::Stage {
                dir: self.output_dir.clone(),
                source,
            })?;

        write_staged(&mut staged, payload).map_err(|source| WriteError::Write {
            path: path.clone(),
            source,
        })?;

        staged
            .persist(&path)
            .map_err(|err| WriteError::Commit {
                path: path.clone(),
                source: err.error,
            })?;

        debug!(pod, path = %path.display(), bytes = payload.len(), "log file committed");
        Ok(path)
    }
}

fn write_staged(staged: &mut NamedTempFile, payload: &LogPayload) -> io::Result<()> {
    staged.write_all(payload.as_bytes())?;
    staged.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(LOG_FILE_MODE))?;
    }

    Ok(())
}
