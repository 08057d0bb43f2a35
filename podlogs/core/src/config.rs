use std::path::{Path, PathBuf};

use crate::{persister::FileNaming, source::LogRequest};

/// Everything one harvest needs, built once by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarvestConfig {
    namespace: String,
    fragments: Vec<String>,
    naming: FileNaming,
    output_dir: PathBuf,
    request: LogRequest,
}

impl HarvestConfig {
    #[must_use]
    /// Plain file names in the current directory, default log options.
    pub fn new(namespace: impl Into<String>, fragments: Vec<String>) -> Self {
        Self {
            namespace: namespace.into(),
            fragments,
            naming: FileNaming::Plain,
            output_dir: PathBuf::from("."),
            request: LogRequest::default(),
        }
    }

    #[must_use]
    pub const fn with_naming(mut self, naming: FileNaming) -> Self {
        self.naming = naming;
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    #[must_use]
    pub fn with_log_request(mut self, request: LogRequest) -> Self {
        self.request = request;
        self
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    #[must_use]
    pub const fn naming(&self) -> FileNaming {
        self.naming
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn log_request(&self) -> &LogRequest {
        &self.request
    }
}

/// Split a comma-separated pod list, trimming entries and dropping blanks.
#[must_use]
pub fn parse_pod_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}
