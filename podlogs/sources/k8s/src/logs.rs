use std::{io, pin::pin};

use async_trait::async_trait;
use futures::{
    SinkExt as _, TryStreamExt as _,
    channel::{mpsc, oneshot},
    io::{AsyncRead, AsyncReadExt as _},
};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    Api, Client,
    api::{ListParams, LogParams},
};
use podlogs_core::{DynError, LogRequest, LogSource, LogStream, PodDescriptor};
use tracing::debug;

use crate::client::{ClusterSelector, K8sSourceError, init_client};

const CHUNK_SIZE: usize = 16 * 1024;
const CHUNK_BUFFER: usize = 8;

/// [`LogSource`] backed by the Kubernetes core/v1 pod API.
#[derive(Clone)]
pub struct K8sLogSource {
    client: Client,
}

impl K8sLogSource {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Authenticate with `selector` and wrap the resulting client.
    pub async fn connect(selector: &ClusterSelector) -> Result<Self, K8sSourceError> {
        init_client(selector).await.map(Self::new)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl LogSource for K8sLogSource {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodDescriptor>, DynError> {
        let list = self.pods(namespace).list(&ListParams::default()).await?;
        let pods: Vec<_> = list.into_iter().filter_map(pod_descriptor).collect();
        debug!(%namespace, pods = pods.len(), "listed pods");
        Ok(pods)
    }

    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<LogStream, DynError> {
        let (opened_tx, opened_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_BUFFER);
        tokio::spawn(pump_logs(
            self.pods(namespace),
            pod.to_owned(),
            log_params(request),
            opened_tx,
            chunk_tx,
        ));

        opened_rx
            .await
            .map_err(|_| format!("log stream task for pod {pod} ended before opening"))??;
        debug!(%namespace, pod, "log stream opened");
        Ok(Box::pin(chunk_rx.into_async_read()))
    }
}

/// Owns the API handle and the kube log stream, forwarding chunks until the
/// stream ends, fails, or the reader side is dropped.
async fn pump_logs(
    pods: Api<Pod>,
    pod: String,
    params: LogParams,
    opened: oneshot::Sender<Result<(), kube::Error>>,
    chunks: mpsc::Sender<io::Result<Vec<u8>>>,
) {
    let stream = match pods.log_stream(&pod, &params).await {
        Ok(stream) => stream,
        Err(err) => {
            let _ = opened.send(Err(err));
            return;
        }
    };
    if opened.send(Ok(())).is_err() {
        return;
    }

    forward_chunks(pin!(stream), chunks).await;
    debug!(%pod, "log stream closed");
}

/// Copies `reader` into `chunks` until EOF, the first read error (which is
/// forwarded), or the receiver going away.
async fn forward_chunks<R: AsyncRead + Unpin>(
    mut reader: R,
    mut chunks: mpsc::Sender<io::Result<Vec<u8>>>,
) {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let item = match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => Ok(buffer[..n].to_vec()),
            Err(err) => Err(err),
        };
        let failed = item.is_err();
        if chunks.send(item).await.is_err() || failed {
            break;
        }
    }
}

fn pod_descriptor(pod: Pod) -> Option<PodDescriptor> {
    let name = pod.metadata.name?;
    let phase = pod.status.and_then(|status| status.phase);
    Some(PodDescriptor::new(name).with_phase(phase))
}

fn log_params(request: &LogRequest) -> LogParams {
    LogParams {
        container: request.container.clone(),
        follow: false,
        previous: request.previous,
        timestamps: request.timestamps,
        ..LogParams::default()
    }
}
