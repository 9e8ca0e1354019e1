//! LwM2M Console Common Library
//!
//! Bootstrap configuration model and the adapter between the server's flat
//! REST shape and the grouped operator view, plus the client-side helpers
//! shared by the console front ends.

pub mod adapter;
pub mod error;
pub mod hex;
pub mod objects;
pub mod path;
pub mod store;
pub mod types;
pub mod validate;

// Re-export commonly used types
pub use adapter::{to_rest, to_ui, to_ui_list, to_ui_map};
pub use error::{Error, Result};
pub use objects::{ObjectModel, ObjectSpecCache, ObjectSpecSource};
pub use path::Lwm2mPath;
pub use store::ValueStore;
pub use types::*;

/// Console version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory for console state and configuration
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".lwm2m-console")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_store_path().join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
