//! Configuration for the chroma client.
//!
//! Config files are discovered at `./chroma.{toml,yaml,yml,json}` and then
//! `~/.config/chroma/chroma.{toml,yaml,yml,json}`. String values may carry
//! `${ENV_VAR}` placeholders which are substituted before parsing.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, discover_and_load, find_or_default_config_path,
        load_config, set_config_dir,
    },
    schema::{ChromaConfig, ContractConfig, NetworkConfig, WalletConfig},
};
