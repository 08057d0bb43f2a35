use std::pin::Pin;

use async_trait::async_trait;
use futures::io::AsyncRead;

use crate::{DynError, model::PodDescriptor};

/// Byte stream of a pod's logs. Dropping it releases the underlying
/// connection.
pub type LogStream = Pin<Box<dyn AsyncRead + Send>>;

/// Options forwarded to the log endpoint for every pod in a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogRequest {
    /// Container to read from; the pod's default container when unset.
    pub container: Option<String>,
    /// Read the logs of the previously terminated container instance.
    pub previous: bool,
    /// Prefix every line with the timestamp recorded by the kubelet.
    pub timestamps: bool,
}

#[async_trait]
/// Cluster access needed by a harvest: one namespace listing and one log
/// stream per matched pod.
pub trait LogSource: Send + Sync + 'static {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodDescriptor>, DynError>;

    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<LogStream, DynError>;
}
