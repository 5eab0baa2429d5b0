use anyhow::{Context, Result};
use std::path::PathBuf;

/// Explicit database file override.
pub(crate) const DB_ENV: &str = "BUDGET_ROLLOVER_DB";
/// Log filter override, checked before `RUST_LOG`.
pub(crate) const LOG_ENV: &str = "BUDGET_ROLLOVER_LOG";

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) db_path: PathBuf,
}

impl Config {
    /// Resolve the database location.
    ///
    /// 1. `BUDGET_ROLLOVER_DB` if set and non-empty
    /// 2. the platform data directory (e.g. `~/.local/share/budget-rollover/`)
    pub(crate) fn load() -> Result<Self> {
        let db_path = match std::env::var(DB_ENV) {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
            _ => default_db_path()?,
        };
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }
        Ok(Self { db_path })
    }
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "budget-rollover", "BudgetRollover")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(proj_dirs.data_dir().join("budget-rollover.db"))
}

/// Install the global subscriber. Logs go to stderr so command output stays clean.
pub(crate) fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|f| EnvFilter::try_new(f).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("budget_rollover=info"));

    // A second init (e.g. from tests) is harmless.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
