use std::env;
use std::path::PathBuf;

pub const DEFAULT_LOG_FILTER: &str = "classroomd=info";

/// Process configuration read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace opened at startup, before any `workspace.select`.
    pub workspace: Option<PathBuf>,
    /// `tracing` filter directive.
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Self {
        let workspace = env::var("CLASSROOMD_WORKSPACE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let log_filter = env::var("RUST_LOG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        Config {
            workspace,
            log_filter,
        }
    }
}

/// Logs go to stderr; stdout carries responses.
pub fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
