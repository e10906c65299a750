pub mod document;

#[cfg(feature = "cli")]
use crate::core::engine::RunMode;
#[cfg(feature = "cli")]
use crate::domain::ports::EngineConfig;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_non_empty_string, validate_path, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "small-iac")]
#[command(about = "A small declarative provisioning tool")]
pub struct CliConfig {
    #[arg(long, default_value = "./deployment.toml")]
    pub document: String,

    #[arg(long, default_value = "./state/state.json")]
    pub state_path: String,

    #[arg(long, default_value = "./workspace")]
    pub workspace: String,

    #[arg(long, help = "Override the region reported by data lookups")]
    pub region: Option<String>,

    #[arg(long, help = "Evaluate the document and stop")]
    pub validate_only: bool,

    #[arg(long, help = "Show the execution plan without applying it")]
    pub dry_run: bool,

    #[arg(long, help = "Destroy every resource recorded in state")]
    pub destroy: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Enable system monitoring")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 旗標優先序：validate-only > dry-run > destroy > apply
    pub fn run_mode(&self) -> RunMode {
        if self.validate_only {
            RunMode::Validate
        } else if self.dry_run {
            RunMode::Plan
        } else if self.destroy {
            RunMode::Destroy
        } else {
            RunMode::Apply
        }
    }
}

#[cfg(feature = "cli")]
impl EngineConfig for CliConfig {
    fn document_path(&self) -> &str {
        &self.document
    }

    fn state_path(&self) -> &str {
        &self.state_path
    }

    fn workspace_path(&self) -> &str {
        &self.workspace
    }

    fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("document", &self.document)?;
        validate_path("state_path", &self.state_path)?;
        validate_path("workspace", &self.workspace)?;
        if let Some(region) = &self.region {
            validate_non_empty_string("region", region)?;
        }
        Ok(())
    }
}
