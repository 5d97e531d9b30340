use crate::config::{default_config_path, load_or_init, LoadedSettings, SettingsSource};
use crate::runtime::{log_info, log_warn, FleetPaths};
use std::path::PathBuf;

pub const CONFIG_FLAG: &str = "--config";

/// Removes `--config <path>` (or `--config=<path>`) from `args`.
pub fn split_config_flag(args: Vec<String>) -> Result<(Option<PathBuf>, Vec<String>), String> {
    let mut config = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == CONFIG_FLAG {
            let value = iter
                .next()
                .ok_or_else(|| format!("{CONFIG_FLAG} requires a path"))?;
            config = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--config=") {
            config = Some(PathBuf::from(value));
        } else {
            rest.push(arg);
        }
    }
    Ok((config, rest))
}

pub struct CommandContext {
    pub loaded: LoadedSettings,
    pub paths: FleetPaths,
}

/// Loads settings the way the daemon does at startup and logs where they came from.
pub fn load_context(config: Option<PathBuf>) -> CommandContext {
    let path = config.unwrap_or_else(default_config_path);
    let loaded = load_or_init(&path);
    let paths = FleetPaths::from_settings(&loaded.settings);
    match &loaded.source {
        SettingsSource::File => log_info(
            &paths,
            "config.loaded",
            &format!("{}", loaded.path.display()),
        ),
        SettingsSource::CreatedDefault => log_info(
            &paths,
            "config.created",
            &format!("wrote default config to {}", loaded.path.display()),
        ),
        SettingsSource::FallbackDefault { reason } => log_warn(
            &paths,
            "config.fallback",
            &format!("using built-in defaults: {reason}"),
        ),
    }
    CommandContext { loaded, paths }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn config_flag_is_extracted_from_any_position() {
        let (config, rest) =
            split_config_flag(strings(&["status", "--config", "/tmp/node.yaml"])).expect("split");
        assert_eq!(config, Some(PathBuf::from("/tmp/node.yaml")));
        assert_eq!(rest, strings(&["status"]));

        let (config, rest) = split_config_flag(strings(&["--config=/a.yaml", "run"])).expect("split");
        assert_eq!(config, Some(PathBuf::from("/a.yaml")));
        assert_eq!(rest, strings(&["run"]));

        assert!(split_config_flag(strings(&["run", "--config"])).is_err());
    }
}
