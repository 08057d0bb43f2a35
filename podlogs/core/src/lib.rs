pub mod config;
pub mod fetcher;
pub mod model;
pub mod orchestrator;
pub mod persister;
pub mod report;
pub mod resolver;
pub mod source;

pub use config::{HarvestConfig, parse_pod_list};
pub use fetcher::{FetchError, fetch};
pub use model::{LogPayload, PodDescriptor};
pub use orchestrator::{HarvestError, Harvester};
pub use persister::{FileNaming, Persister, WriteError, log_file_name};
pub use report::{FragmentReport, Outcome, Report};
pub use resolver::{Resolution, matching_pods, resolve};
pub use source::{LogRequest, LogSource, LogStream};

/// Boxed error used at the collaborator seam.
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;
