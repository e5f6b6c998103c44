use crate::config::Config;
use crate::error::{PhaseflowError, Result};

const CURRENT_VERSION: u32 = 1;

/// Bring a loaded [`Config`] up to the current schema version.
///
/// Schema v1 has no migrations yet; a config written by a newer release is
/// rejected rather than silently misread.
pub fn migrate_config(cfg: Config) -> Result<Config> {
    match cfg.version {
        0 | CURRENT_VERSION => Ok(Config {
            version: CURRENT_VERSION,
            ..cfg
        }),
        v => Err(PhaseflowError::InvalidConfig(format!(
            "config version {v} is newer than supported version {CURRENT_VERSION}"
        ))),
    }
}
