use std::path::{Path, PathBuf};

use kube::{
    Client, Config,
    config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
};
use tracing::info;

/// Which kubeconfig and context to authenticate with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterSelector {
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
}

impl ClusterSelector {
    #[must_use]
    /// Default kubeconfig resolution and the current context.
    pub const fn new() -> Self {
        Self {
            kubeconfig: None,
            context: None,
        }
    }

    #[must_use]
    pub fn with_kubeconfig(mut self, path: Option<PathBuf>) -> Self {
        self.kubeconfig = path;
        self
    }

    #[must_use]
    /// Blank names fall back to the current context.
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty());
        self
    }

    #[must_use]
    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig.as_deref()
    }

    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    fn options(&self) -> KubeConfigOptions {
        KubeConfigOptions {
            context: self.context.clone(),
            ..KubeConfigOptions::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
/// Failures while building the Kubernetes client.
pub enum K8sSourceError {
    #[error("failed to read kubeconfig {path}: {source}")]
    KubeconfigRead {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },
    #[error("failed to resolve kubeconfig context {context}: {source}")]
    KubeconfigResolve {
        context: String,
        #[source]
        source: KubeconfigError,
    },
    #[error("failed to initialise kubernetes client: {source}")]
    ClientInit {
        #[source]
        source: kube::Error,
    },
}

/// Build an authenticated client for `selector`.
///
/// Without an explicit kubeconfig or context this defers to
/// [`Client::try_default`], which also covers in-cluster service accounts.
pub async fn init_client(selector: &ClusterSelector) -> Result<Client, K8sSourceError> {
    if selector.kubeconfig.is_none() && selector.context.is_none() {
        info!("using default kubernetes context");
        return Client::try_default()
            .await
            .map_err(|source| K8sSourceError::ClientInit { source });
    }

    let options = selector.options();
    let context = selector.context().unwrap_or("<current>").to_owned();
    if let Some(name) = selector.context() {
        info!(context = name, "switching kubernetes context");
    }

    let config = match selector.kubeconfig() {
        Some(path) => {
            info!(kubeconfig = %path.display(), "loading kubeconfig");
            let kubeconfig =
                Kubeconfig::read_from(path).map_err(|source| K8sSourceError::KubeconfigRead {
                    path: path.to_path_buf(),
                    source,
                })?;
            Config::from_custom_kubeconfig(kubeconfig, &options).await
        }
        None => Config::from_kubeconfig(&options).await,
    }
    .map_err(|source| K8sSourceError::KubeconfigResolve { context, source })?;

    Client::try_from(config).map_err(|source| K8sSourceError::ClientInit { source })
}
