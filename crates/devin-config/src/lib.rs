//! Configuration system for the devin agent engine.
//!
//! Provides TOML-based configuration with:
//! - Engine, compression and tool settings (`[engine]`, `[compression]`, `[tools]`)
//! - Declarative custom HTTP agents (`[agents.<name>]`)
//! - Config file layering (user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    load_config, load_config_file, load_config_with_options, save_config, user_config_dir,
    user_config_path, ConfigSource, LoadedConfig,
};
pub use error::{ConfigError, Result};
pub use types::*;
