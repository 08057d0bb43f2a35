use std::io;

use futures::io::AsyncReadExt as _;
use tracing::debug;

use crate::{
    DynError,
    model::LogPayload,
    source::{LogRequest, LogSource},
};

#[derive(Debug, thiserror::Error)]
/// Failures while pulling one pod's logs.
pub enum FetchError {
    #[error("failed to open log stream for pod {pod}: {source}")]
    StreamOpenFailed {
        pod: String,
        #[source]
        source: DynError,
    },
    #[error("log stream for pod {pod} failed after {bytes_read} bytes: {source}")]
    StreamReadFailed {
        pod: String,
        bytes_read: usize,
        #[source]
        source: io::Error,
    },
    #[error("harvest task for pod {pod} did not complete: {message}")]
    TaskFailed { pod: String, message: String },
}

impl FetchError {
    #[must_use]
    pub fn pod(&self) -> &str {
        match self {
            Self::StreamOpenFailed { pod, .. }
            | Self::StreamReadFailed { pod, .. }
            | Self::TaskFailed { pod, .. } => pod,
        }
    }
}

/// Read a pod's log stream to the end.
///
/// The stream is owned here and dropped on every return path, so a failed
/// read never leaves the connection open. Partial data from a failed read is
/// discarded.
pub async fn fetch<S>(
    source: &S,
    namespace: &str,
    pod: &str,
    request: &LogRequest,
) -> Result<LogPayload, FetchError>
where
    S: LogSource + ?Sized,
{
    let mut stream = source
        .open_log_stream(namespace, pod, request)
        .await
        .map_err(|source| FetchError::StreamOpenFailed {
            pod: pod.to_owned(),
            source,
        })?;

    let mut buffer = Vec::new();
    if let Err(source) = stream.read_to_end(&mut buffer).await {
        return Err(FetchError::StreamReadFailed {
            pod: pod.to_owned(),
            bytes_read: buffer.len(),
            source,
        });
    }

    debug!(%namespace, pod, bytes = buffer.len(), "log stream drained");
    Ok(LogPayload::from(buffer))
}
