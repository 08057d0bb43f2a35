mod cli;
mod render;

use std::{io, process, sync::Arc};

use anyhow::{Context as _, Result};
use clap::Parser as _;
use podlogs_core::{Harvester, Report};
use podlogs_source_k8s::K8sLogSource;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, EnvDefaults};

const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let report = match run(&cli).await {
        Ok(report) => report,
        Err(err) => {
            error!("{err:#}");
            process::exit(1);
        }
    };

    if !report.all_persisted() {
        warn!(
            failed = report.failed_count(),
            not_found = report.not_found_count(),
            "some pods were not harvested"
        );
    }

    if let Err(err) = render::print(&report, cli.json) {
        error!("{err:#}");
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<Report> {
    let defaults = EnvDefaults::from_env();
    let config = cli.harvest_config(&defaults)?;
    let selector = cli.cluster_selector(&defaults);

    info!(
        namespace = config.namespace(),
        fragments = ?config.fragments(),
        context = selector.context().unwrap_or("<current>"),
        output_dir = %config.output_dir().display(),
        "starting pod log harvest"
    );

    let source = K8sLogSource::connect(&selector)
        .await
        .context("building kubernetes client failed")?;

    Harvester::new(Arc::new(source))
        .run(&config)
        .await
        .context("harvesting pod logs failed")
}

fn init_tracing() {
    let filter = podlogs_env::rust_log()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
