use std::path::PathBuf;

use anyhow::{Result, ensure};
use clap::{ArgGroup, Parser};
use podlogs_core::{FileNaming, HarvestConfig, LogRequest, parse_pod_list};
use podlogs_source_k8s::ClusterSelector;

#[derive(Parser, Debug)]
#[command(
    name = "pod-logs",
    version,
    about = "Download Kubernetes pod logs by partial pod name"
)]
#[command(group(ArgGroup::new("selection").required(true).args(["pod", "pods"])))]
pub struct Cli {
    /// Namespace to search for pods
    #[arg(long, value_parser = non_blank)]
    pub namespace: String,

    /// Fragment of a single pod name
    #[arg(long)]
    pub pod: Option<String>,

    /// Comma-separated pod name fragments, e.g. "api, worker"
    #[arg(long)]
    pub pods: Option<String>,

    /// Kubernetes context; the current context when omitted
    #[arg(long)]
    pub context: Option<String>,

    /// Kubeconfig file; KUBECONFIG or ~/.kube/config when omitted
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Append an RFC3339 timestamp to log file names
    #[arg(long)]
    pub timestamped: bool,

    /// Directory to write log files into
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Container to read logs from
    #[arg(long)]
    pub container: Option<String>,

    /// Fetch logs of the previous container instance
    #[arg(long)]
    pub previous: bool,

    /// Prefix each log line with its timestamp
    #[arg(long)]
    pub timestamps: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Defaults taken from the environment when a flag is absent.
#[derive(Debug, Default)]
pub struct EnvDefaults {
    pub output_dir: Option<PathBuf>,
    pub timestamped: bool,
    pub context: Option<String>,
}

impl EnvDefaults {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            output_dir: podlogs_env::podlogs_output_dir(),
            timestamped: podlogs_env::podlogs_timestamped(),
            context: podlogs_env::podlogs_context(),
        }
    }
}

impl Cli {
    /// Requested fragments in flag order, trimmed, blanks dropped.
    #[must_use]
    pub fn fragments(&self) -> Vec<String> {
        match (&self.pod, &self.pods) {
            (Some(pod), _) => Some(pod.trim())
                .filter(|pod| !pod.is_empty())
                .map(str::to_owned)
                .into_iter()
                .collect(),
            (None, Some(pods)) => parse_pod_list(pods),
            (None, None) => Vec::new(),
        }
    }

    pub fn harvest_config(&self, defaults: &EnvDefaults) -> Result<HarvestConfig> {
        let fragments = self.fragments();
        ensure!(
            !fragments.is_empty(),
            "no pod names given; pass a non-empty --pod or --pods"
        );

        let naming = if self.timestamped || defaults.timestamped {
            FileNaming::Timestamped
        } else {
            FileNaming::Plain
        };
        let output_dir = self
            .output_dir
            .clone()
            .or_else(|| defaults.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        ensure!(
            output_dir.is_dir(),
            "output directory {} does not exist",
            output_dir.display()
        );

        Ok(HarvestConfig::new(self.namespace.trim(), fragments)
            .with_naming(naming)
            .with_output_dir(output_dir)
            .with_log_request(LogRequest {
                container: self.container.clone(),
                previous: self.previous,
                timestamps: self.timestamps,
            }))
    }

    #[must_use]
    pub fn cluster_selector(&self, defaults: &EnvDefaults) -> ClusterSelector {
        ClusterSelector::new()
            .with_kubeconfig(self.kubeconfig.clone())
            .with_context(self.context.clone().or_else(|| defaults.context.clone()))
    }
}

fn non_blank(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("value must not be empty".to_owned());
    }
    Ok(value.to_owned())
}
