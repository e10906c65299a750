pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{provider::LocalProvider, state::LocalStateStore};
pub use config::document::DeploymentDocument;
pub use core::{engine::ProvisionEngine, provisioner::DocumentProvisioner};
pub use utils::error::{IacError, Result};
