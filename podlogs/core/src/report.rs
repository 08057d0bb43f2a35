use std::{fmt, path::PathBuf};

use serde::{Serialize, Serializer};

use crate::{fetcher::FetchError, persister::WriteError};

/// Final state of one requested fragment.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Persisted {
        path: PathBuf,
        bytes: usize,
    },
    FetchFailed {
        #[serde(serialize_with = "display")]
        error: FetchError,
    },
    WriteFailed {
        #[serde(serialize_with = "display")]
        error: WriteError,
    },
    NotFound,
}

impl Outcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Persisted { .. })
    }

    /// Short label used in logs and summaries.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Persisted { .. } => "persisted",
            Self::FetchFailed { .. } => "fetch failed",
            Self::WriteFailed { .. } => "write failed",
            Self::NotFound => "not found",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FragmentReport {
    pub fragment: String,
    /// Pod the fragment resolved to; `None` when nothing matched.
    pub pod: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Per-fragment outcomes of a harvest, in request order.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    namespace: String,
    entries: Vec<FragmentReport>,
}

impl Report {
    #[must_use]
    pub fn new(namespace: impl Into<String>, entries: Vec<FragmentReport>) -> Self {
        Self {
            namespace: namespace.into(),
            entries,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn entries(&self) -> &[FragmentReport] {
        &self.entries
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<FragmentReport> {
        self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry recorded for `fragment`.
    #[must_use]
    pub fn entry(&self, fragment: &str) -> Option<&FragmentReport> {
        self.entries.iter().find(|entry| entry.fragment == fragment)
    }

    #[must_use]
    pub fn persisted_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.is_success())
            .count()
    }

    #[must_use]
    pub fn not_found_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, Outcome::NotFound))
            .count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.len() - self.persisted_count() - self.not_found_count()
    }

    #[must_use]
    pub fn all_persisted(&self) -> bool {
        self.entries.iter().all(|entry| entry.outcome.is_success())
    }
}

fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
