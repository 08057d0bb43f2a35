mod client;
mod logs;

pub use client::{ClusterSelector, K8sSourceError, init_client};
pub use logs::K8sLogSource;
