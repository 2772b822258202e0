//! Configuration loading and validation.
//!
//! Config files: `ringle.toml`, `ringle.yaml`, `ringle.yml` or `ringle.json`,
//! searched in `./` then the user config directory (`~/.config/ringle/`).
//! `${ENV_VAR}` references are expanded before parsing, and a few well-known
//! environment variables override file values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::ConfigError,
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, find_config_file,
        load_config, memory_db_path,
    },
    schema::{
        ChannelsConfig, ConversationConfig, DeliveryConfig, IMessageConfig, MemoryConfig,
        OverflowPolicy, PacingConfig, PersonaConfig, ProviderConfig, RingleConfig,
        SegmenterConfig, TelegramConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
