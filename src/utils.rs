use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::error::IngestError;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "kbar_sync=info,inspect_schema=info";

/// Read the symbol list: one symbol per line, surrounding whitespace trimmed,
/// blank lines skipped, file order kept.
pub fn read_symbols(path: &Path) -> Result<Vec<String>, IngestError> {
    let content = std::fs::read_to_string(path).map_err(|source| IngestError::SymbolFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_symbols(&content))
}

pub fn parse_symbols(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Install the global fmt subscriber, honouring `RUST_LOG`.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
