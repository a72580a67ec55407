// Configuration management module
// Builds the single immutable `Config` value from TOML, environment and defaults

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, GoogleConfig, OpenWeatherConfig, PathsConfig, RetrievalConfig,
    TavilyConfig,
};
