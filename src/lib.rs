pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{InMemoryStore, LeanCloudStore, MemorySessionStore};
pub use app::services::{AuthService, Roster};
pub use config::{cli::LocalSessionStore, toml_config::RosterConfig};
pub use core::{GuardedStore, QueuedStore, RequestQueue};
pub use domain::status::{calculate_member_status, StatusRules};
pub use utils::error::{Result, RosterError};
