use std::{env, path::PathBuf};

#[must_use]
pub fn rust_log() -> Option<String> {
    env::var("RUST_LOG").ok()
}

#[must_use]
pub fn podlogs_output_dir() -> Option<PathBuf> {
    env::var("PODLOGS_OUTPUT_DIR")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

#[must_use]
pub fn podlogs_timestamped() -> bool {
    env::var("PODLOGS_TIMESTAMPED").is_ok_and(|val| val.eq_ignore_ascii_case("true"))
}

#[must_use]
pub fn podlogs_context() -> Option<String> {
    env::var("PODLOGS_CONTEXT")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
