//! Configuration schema and loading for the warden portal.
//!
//! Config files: `warden.toml`, `warden.yaml`, `warden.yml` or `warden.json`,
//! searched in `./` then `~/.config/warden/`.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, discover_and_load, load_config},
    schema::{
        CheckerConfig, FileCheckerConfig, MemoryUser, PasswordScheme, PromptStyle, RealmConfig,
        ScriptStepConfig, WardenConfig,
    },
};
