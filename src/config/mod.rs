pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_or_init, save_settings, LoadedSettings, SettingsSource};
pub use paths::{default_config_path, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
pub use settings::{ActionConfig, PipelineConfig, PipelinesConfig, PolicyConfig, Settings, WorkerRole};
