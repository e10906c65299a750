use crate::domain::model::{ExecutionPlan, PlanMode, RunSummary};
use crate::domain::ports::Provisioner;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Validate,
    Plan,
    Apply,
    Destroy,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub mode: RunMode,
    pub plan: Option<ExecutionPlan>,
    pub summary: Option<RunSummary>,
}

/// 驅動 evaluate -> plan -> apply 三個階段，依模式提早停止
pub struct ProvisionEngine<P: Provisioner> {
    provisioner: P,
    monitor: Option<SystemMonitor>,
    monitor_enabled: bool,
}

impl<P: Provisioner> ProvisionEngine<P> {
    pub fn new(provisioner: P) -> Self {
        Self {
            provisioner,
            monitor: None,
            monitor_enabled: false,
        }
    }

    pub fn new_with_monitoring(provisioner: P, enabled: bool) -> Self {
        Self {
            provisioner,
            monitor: if enabled {
                Some(SystemMonitor::new(enabled))
            } else {
                None
            },
            monitor_enabled: enabled,
        }
    }

    fn log_phase(&self, phase: &str) {
        if self.monitor_enabled {
            if let Some(monitor) = &self.monitor {
                monitor.log_phase(phase);
            }
        }
    }

    pub async fn run(&self, mode: RunMode) -> Result<RunOutcome> {
        println!("Starting provisioning run ({:?})...", mode);

        // Evaluate
        println!("Evaluating document...");
        let desired = self.provisioner.evaluate().await?;
        println!(
            "Evaluated {} resources, {} data lookups",
            desired.resource_count(),
            desired.data_count()
        );
        self.log_phase("Evaluate");

        if mode == RunMode::Validate {
            println!("Document is valid.");
            return Ok(RunOutcome {
                mode,
                plan: None,
                summary: None,
            });
        }

        // Plan
        println!("Planning changes...");
        let plan_mode = if mode == RunMode::Destroy {
            PlanMode::Destroy
        } else {
            PlanMode::Normal
        };
        let plan = self.provisioner.plan(&desired, plan_mode).await?;
        println!("{}", plan.render());
        self.log_phase("Plan");

        if mode == RunMode::Plan {
            return Ok(RunOutcome {
                mode,
                plan: Some(plan),
                summary: None,
            });
        }

        if !plan.has_changes() {
            println!("No changes. Deployment is up to date.");
        }

        // Apply
        println!("Applying changes...");
        let summary = self.provisioner.apply(&desired, plan.clone()).await?;
        println!(
            "Applied: {} created, {} updated, {} deleted, {} unchanged",
            summary.created, summary.updated, summary.deleted, summary.unchanged
        );

        if let Some(monitor) = &self.monitor {
            monitor.log_final();
        }

        Ok(RunOutcome {
            mode,
            plan: Some(plan),
            summary: Some(summary),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        ActionKind, DeploymentMeta, DesiredState, PlannedAction, ResourceAddr,
    };
    use crate::utils::error::IacError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct MockProvisioner {
        phases: Arc<Mutex<Vec<String>>>,
        plan_actions: Vec<PlannedAction>,
        fail_evaluate: bool,
    }

    impl MockProvisioner {
        fn new() -> Self {
            Self {
                phases: Arc::new(Mutex::new(Vec::new())),
                plan_actions: Vec::new(),
                fail_evaluate: false,
            }
        }

        fn with_plan_actions(mut self, actions: Vec<PlannedAction>) -> Self {
            self.plan_actions = actions;
            self
        }

        fn with_failing_evaluate(mut self) -> Self {
            self.fail_evaluate = true;
            self
        }

        fn desired() -> DesiredState {
            DesiredState {
                deployment: DeploymentMeta {
                    name: "test".to_string(),
                    description: "test".to_string(),
                    version: "0.1.0".to_string(),
                },
                resources: BTreeMap::new(),
                data_lookups: BTreeMap::new(),
                outputs: vec![],
                execution_order: vec![],
            }
        }
    }

    #[async_trait]
    impl Provisioner for MockProvisioner {
        async fn evaluate(&self) -> Result<DesiredState> {
            if self.fail_evaluate {
                return Err(IacError::DependencyCycle {
                    path: "role.a, policy.b".to_string(),
                });
            }
            self.phases.lock().await.push("evaluate".to_string());
            Ok(Self::desired())
        }

        async fn plan(&self, _desired: &DesiredState, mode: PlanMode) -> Result<ExecutionPlan> {
            self.phases.lock().await.push(format!("plan {:?}", mode));
            Ok(ExecutionPlan {
                actions: self.plan_actions.clone(),
            })
        }

        async fn apply(&self, _desired: &DesiredState, plan: ExecutionPlan) -> Result<RunSummary> {
            self.phases.lock().await.push("apply".to_string());
            Ok(RunSummary {
                created: plan.count(ActionKind::Create),
                updated: 0,
                deleted: plan.count(ActionKind::Delete),
                unchanged: plan.count(ActionKind::NoOp),
                outputs: BTreeMap::new(),
                state_serial: 1,
            })
        }
    }

    fn create_action() -> PlannedAction {
        PlannedAction {
            addr: ResourceAddr::new("role", "fn_role"),
            kind: ActionKind::Create,
            changes: vec![],
        }
    }

    #[tokio::test]
    async fn test_validate_stops_after_evaluate() {
        let provisioner = MockProvisioner::new();
        let phases = provisioner.phases.clone();
        let engine = ProvisionEngine::new(provisioner);

        let outcome = engine.run(RunMode::Validate).await.unwrap();
        assert!(outcome.plan.is_none());
        assert!(outcome.summary.is_none());
        assert_eq!(*phases.lock().await, vec!["evaluate"]);
    }

    #[tokio::test]
    async fn test_plan_mode_stops_before_apply() {
        let provisioner = MockProvisioner::new().with_plan_actions(vec![create_action()]);
        let phases = provisioner.phases.clone();
        let engine = ProvisionEngine::new(provisioner);

        let outcome = engine.run(RunMode::Plan).await.unwrap();
        assert!(outcome.plan.is_some());
        assert!(outcome.summary.is_none());
        assert_eq!(*phases.lock().await, vec!["evaluate", "plan Normal"]);
    }

    #[tokio::test]
    async fn test_apply_runs_all_phases() {
        let provisioner = MockProvisioner::new().with_plan_actions(vec![create_action()]);
        let phases = provisioner.phases.clone();
        let engine = ProvisionEngine::new(provisioner);

        let outcome = engine.run(RunMode::Apply).await.unwrap();
        let summary = outcome.summary.unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(
            *phases.lock().await,
            vec!["evaluate", "plan Normal", "apply"]
        );
    }

    #[tokio::test]
    async fn test_destroy_uses_destroy_plan_mode() {
        let provisioner = MockProvisioner::new();
        let phases = provisioner.phases.clone();
        let engine = ProvisionEngine::new(provisioner);

        engine.run(RunMode::Destroy).await.unwrap();
        assert_eq!(
            *phases.lock().await,
            vec!["evaluate", "plan Destroy", "apply"]
        );
    }

    #[tokio::test]
    async fn test_evaluate_failure_propagates() {
        let engine = ProvisionEngine::new(MockProvisioner::new().with_failing_evaluate());
        let err = engine.run(RunMode::Apply).await.unwrap_err();
        assert!(matches!(err, IacError::DependencyCycle { .. }));
    }
}
