//! CLI-side configuration: file location, flag overrides, and translation
//! to `creskit_core::BridgeConfig`.
//!
//! Loading and validation live in `creskit-config`; this module only
//! layers `GlobalOpts` on top.

use std::path::PathBuf;

use creskit_config::Config;
use creskit_core::BridgeConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file in effect: `--config` / `CRESKIT_CONFIG`, else the
/// platform default.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(creskit_config::config_path)
}

/// File + environment + `--host` / `--port`.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = resolve_path(global);
    let mut cfg =
        creskit_config::load_config(&path).map_err(|e| CliError::from_config(e, &path))?;

    if let Some(ref host) = global.host {
        cfg.host = Some(host.clone());
    }
    if let Some(port) = global.port {
        cfg.port = Some(port);
    }
    Ok(cfg)
}

/// Build the runtime bridge config from everything above.
pub fn bridge_config(global: &GlobalOpts) -> Result<BridgeConfig, CliError> {
    let path = resolve_path(global);
    load(global)?
        .to_bridge_config()
        .map_err(|e| CliError::from_config(e, &path))
}
