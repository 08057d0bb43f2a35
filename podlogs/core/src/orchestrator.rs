use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use chrono::Utc;
use futures::FutureExt as _;
use tokio::task::{JoinSet, spawn_blocking};
use tracing::{info, warn};

use crate::{
    DynError,
    config::HarvestConfig,
    fetcher::{FetchError, fetch},
    model::PodDescriptor,
    persister::{Persister, WriteError},
    report::{FragmentReport, Outcome, Report},
    resolver::{Resolution, matching_pods, resolve},
    source::{LogRequest, LogSource},
};

#[derive(Debug, thiserror::Error)]
/// Failures that stop a harvest before any pod is fetched.
pub enum HarvestError {
    #[error("failed to list pods in namespace {namespace}: {source}")]
    ListFailed {
        namespace: String,
        #[source]
        source: DynError,
    },
}

/// Lists a namespace once, then fetches and persists every matched pod on its
/// own task.
pub struct Harvester<S: ?Sized> {
    source: Arc<S>,
}

impl<S: ?Sized> Clone for Harvester<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S> Harvester<S>
where
    S: LogSource + ?Sized,
{
    #[must_use]
    pub const fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Run one harvest and wait for every dispatched pod to finish.
    ///
    /// Only the namespace listing can fail the call. Per-pod failures are
    /// recorded in the returned [`Report`], which holds one entry per
    /// non-blank fragment in request order. Sibling units are never cancelled
    /// and stream reads have no timeout, so a pod whose log stream never ends
    /// keeps the harvest waiting.
    pub async fn run(&self, config: &HarvestConfig) -> Result<Report, HarvestError> {
        let namespace = config.namespace();
        info!(
            namespace,
            fragments = config.fragments().len(),
            "listing pods"
        );

        let listing = self
            .source
            .list_pods(namespace)
            .await
            .map_err(|source| HarvestError::ListFailed {
                namespace: namespace.to_owned(),
                source,
            })?;
        info!(namespace, pods = listing.len(), "pod listing captured");

        let persister = Arc::new(Persister::new(config.output_dir(), config.naming()));
        let mut slots = Vec::new();
        let mut units = JoinSet::new();

        for (index, resolution) in resolve(config.fragments(), &listing)
            .into_iter()
            .enumerate()
        {
            match resolution {
                Resolution::NotFound { fragment } => {
                    warn!(namespace, %fragment, "no pod name contains fragment");
                    slots.push(Slot::finished(fragment, Outcome::NotFound));
                }
                Resolution::Matched { fragment, pod } => {
                    warn_if_ambiguous(&fragment, pod, &listing);
                    info!(
                        namespace,
                        %fragment,
                        pod = pod.name(),
                        phase = pod.phase().unwrap_or("unknown"),
                        "fragment matched pod"
                    );

                    let unit = HarvestUnit {
                        source: Arc::clone(&self.source),
                        namespace: namespace.to_owned(),
                        pod: pod.name().to_owned(),
                        request: config.log_request().clone(),
                        persister: Arc::clone(&persister),
                    };
                    units.spawn(async move { (index, unit.run_guarded().await) });
                    slots.push(Slot::pending(fragment, pod.name().to_owned()));
                }
            }
        }

        info!(namespace, dispatched = units.len(), "waiting for log harvest units");
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index].outcome = Some(outcome),
                Err(err) => warn!(error = %err, "harvest task failed to join"),
            }
        }

        let entries = slots.into_iter().map(Slot::into_report).collect();
        Ok(Report::new(namespace, entries))
    }
}

/// Per-fragment report under construction.
struct Slot {
    fragment: String,
    pod: Option<String>,
    outcome: Option<Outcome>,
}

impl Slot {
    fn finished(fragment: String, outcome: Outcome) -> Self {
        Self {
            fragment,
            pod: None,
            outcome: Some(outcome),
        }
    }

    fn pending(fragment: String, pod: String) -> Self {
        Self {
            fragment,
            pod: Some(pod),
            outcome: None,
        }
    }

    fn into_report(self) -> FragmentReport {
        let outcome = self.outcome.unwrap_or_else(|| Outcome::FetchFailed {
            error: FetchError::TaskFailed {
                pod: self.pod.clone().unwrap_or_default(),
                message: "task ended without reporting an outcome".to_owned(),
            },
        });

        FragmentReport {
            fragment: self.fragment,
            pod: self.pod,
            outcome,
        }
    }
}

/// One fetch-then-persist pass for a single pod.
struct HarvestUnit<S: ?Sized> {
    source: Arc<S>,
    namespace: String,
    pod: String,
    request: LogRequest,
    persister: Arc<Persister>,
}

impl<S> HarvestUnit<S>
where
    S: LogSource + ?Sized,
{
    async fn run_guarded(self) -> Outcome {
        let pod = self.pod.clone();
        AssertUnwindSafe(self.run())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = format!("harvest unit panicked: {}", panic_message(panic));
                warn!(%pod, %message, "log harvest aborted");
                Outcome::FetchFailed {
                    error: FetchError::TaskFailed { pod, message },
                }
            })
    }

    async fn run(self) -> Outcome {
        let payload = match fetch(
            self.source.as_ref(),
            &self.namespace,
            &self.pod,
            &self.request,
        )
        .await
        {
            Ok(payload) => payload,
            Err(error) => {
                warn!(
                    namespace = %self.namespace,
                    pod = %self.pod,
                    %error,
                    "failed to fetch pod logs"
                );
                return Outcome::FetchFailed { error };
            }
        };

        let now = Utc::now();
        let bytes = payload.len();
        let persister = Arc::clone(&self.persister);
        let pod = self.pod.clone();
        let written = spawn_blocking(move || persister.persist(&pod, &payload, now))
            .await
            .unwrap_or_else(|err| {
                Err(WriteError::TaskFailed {
                    message: err.to_string(),
                })
            });

        match written {
            Ok(path) => {
                info!(pod = %self.pod, path = %path.display(), bytes, "logs written");
                Outcome::Persisted { path, bytes }
            }
            Err(error) => {
                warn!(pod = %self.pod, %error, "failed to write pod logs");
                Outcome::WriteFailed { error }
            }
        }
    }
}

fn warn_if_ambiguous(fragment: &str, selected: &PodDescriptor, listing: &[PodDescriptor]) {
    let others: Vec<&str> = matching_pods(fragment, listing)
        .filter(|pod| pod.name() != selected.name())
        .map(PodDescriptor::name)
        .collect();

    if !others.is_empty() {
        warn!(
            fragment,
            selected = selected.name(),
            ?others,
            "fragment matches several pods; using the first in listing order"
        );
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic.downcast::<String>().map_or_else(
        |panic| {
            panic.downcast::<&'static str>().map_or_else(
                |_| "unknown panic".to_owned(),
                |message| (*message).to_owned(),
            )
        },
        |message| *message,
    )
}
