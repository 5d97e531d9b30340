use std::path::PathBuf;

pub const CONFIG_PATH_ENV: &str = "RENDERFLEET_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/srv/renderfleet/config/node_config.yaml";

pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
