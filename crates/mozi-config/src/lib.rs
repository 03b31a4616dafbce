//! Layered configuration loading for the mozi runtime kernel.
//!
//! ```rust,no_run
//! use mozi_config::KernelConfig;
//!
//! let config = KernelConfig::load(Some(std::path::Path::new("."))).unwrap();
//! println!("queue mode: {}", config.queue.mode);
//! ```
//!
//! # Precedence (highest to lowest)
//!
//! 1. Workspace (`{workspace}/.mozi/config.toml`)
//! 2. User (`${MOZI_HOME:-~/.mozi}/config.toml`)
//! 3. System (`/etc/mozi/config.toml`)
//! 4. Environment variables (`MOZI_*`) — fallback only
//! 5. Built-in defaults

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod env;
pub mod error;
pub mod loader;
pub mod merge;
pub mod types;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::{AgentConfig, KernelConfig, QueueConfig, ReminderConfig, RetryConfig, StorageConfig};

impl KernelConfig {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the
    /// final configuration fails validation.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(workspace_root, None)
    }

    /// Load configuration with an explicit home directory override, for
    /// tests that don't want to touch the real `~/.mozi`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the
    /// final configuration fails validation.
    pub fn load_with_home(workspace_root: Option<&std::path::Path>, home_dir: &std::path::Path) -> ConfigResult<Self> {
        loader::load(workspace_root, Some(home_dir))
    }

    /// Load configuration from a single file, no layering.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or
    /// fails validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
