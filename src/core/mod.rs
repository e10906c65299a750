pub mod engine;
pub mod graph;
pub mod planner;
pub mod provisioner;
pub mod resolver;
pub mod schema;

pub use crate::domain::model::{
    ActionKind, AttrValue, DesiredState, ExecutionPlan, PlanMode, ResourceAddr, RunSummary,
    StateFile,
};
pub use crate::domain::ports::{EngineConfig, Provider, Provisioner, StateStore};
pub use crate::utils::error::Result;
