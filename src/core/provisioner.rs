use crate::config::document::DeploymentDocument;
use crate::core::graph::DependencyGraph;
use crate::core::planner;
use crate::core::resolver::{self, ResolutionContext};
use crate::core::schema;
use crate::domain::model::{
    ActionKind, DataAddr, DataDecl, DeploymentMeta, DesiredState, ExecutionPlan, OutputDecl,
    PlanMode, ResolvedResource, ResourceAddr, ResourceDecl, ResourceRecord, RunSummary, StateFile,
};
use crate::domain::ports::{Provider, Provisioner, StateStore};
use crate::utils::error::{IacError, Result};
use crate::utils::validation::validate_json_document;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;

/// 將部署文件評估為期望狀態圖。
/// 純函式：不碰 Provider 也不碰狀態檔，doc_check 也走這裡。
pub fn evaluate_document(document: &DeploymentDocument) -> Result<DesiredState> {
    document.validate_config()?;

    let mut resources: BTreeMap<ResourceAddr, ResourceDecl> = BTreeMap::new();
    for rc in &document.resources {
        let addr = ResourceAddr::new(rc.r#type.clone(), rc.name.clone());
        let depends_on = rc
            .depends_on
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|d| ResourceAddr::parse(d))
            .collect::<Result<Vec<_>>>()?;

        let decl = ResourceDecl {
            addr: addr.clone(),
            attributes: rc.attributes.clone(),
            depends_on,
        };
        schema::check_resource(&decl)?;

        if resources.insert(addr.clone(), decl).is_some() {
            return Err(IacError::DuplicateDeclaration {
                address: addr.to_string(),
            });
        }
    }

    let mut data_lookups: BTreeMap<DataAddr, DataDecl> = BTreeMap::new();
    for dc in &document.data_lookups {
        let addr = DataAddr::new(dc.r#type.clone(), dc.name.clone());
        let decl = DataDecl { addr: addr.clone() };
        schema::check_data(&decl)?;

        if data_lookups.insert(addr.clone(), decl).is_some() {
            return Err(IacError::DuplicateDeclaration {
                address: addr.to_string(),
            });
        }
    }

    let outputs: Vec<OutputDecl> = document
        .outputs
        .iter()
        .map(|o| OutputDecl {
            name: o.name.clone(),
            value: o.value.clone(),
            description: o.description.clone(),
        })
        .collect();

    let graph = DependencyGraph::build(&resources, &data_lookups, &outputs)?;

    Ok(DesiredState {
        deployment: DeploymentMeta {
            name: document.deployment.name.clone(),
            description: document.deployment.description.clone(),
            version: document.deployment.version.clone(),
        },
        resources,
        data_lookups,
        outputs,
        execution_order: graph.execution_order().to_vec(),
    })
}

/// 文件驅動的供應流程：evaluate -> plan -> apply，
/// 透過 Provider 與 StateStore 這兩個 port 與外部世界互動
pub struct DocumentProvisioner<P: Provider, S: StateStore> {
    document: DeploymentDocument,
    provider: P,
    state_store: S,
}

impl<P: Provider, S: StateStore> DocumentProvisioner<P, S> {
    pub fn new(document: DeploymentDocument, provider: P, state_store: S) -> Self {
        Self {
            document,
            provider,
            state_store,
        }
    }

    async fn load_state(&self, deployment: &str) -> Result<StateFile> {
        match self.state_store.load().await? {
            Some(state) => {
                if state.deployment != deployment {
                    return Err(IacError::StateError {
                        message: format!(
                            "state file belongs to deployment '{}', document declares '{}'",
                            state.deployment, deployment
                        ),
                    });
                }
                Ok(state)
            }
            None => Ok(StateFile::empty(deployment)),
        }
    }

    /// 逐屬性解析；含引用的 policy 文件在這裡才能做 JSON 檢查
    fn resolve_attributes(
        &self,
        decl: &ResourceDecl,
        ctx: &ResolutionContext,
    ) -> Result<BTreeMap<String, serde_json::Value>> {
        let owner = decl.addr.to_string();
        let mut resolved = BTreeMap::new();
        for (name, value) in &decl.attributes {
            resolved.insert(name.clone(), resolver::resolve_value(&owner, value, ctx)?);
        }

        if let Some(schema) = schema::lookup(&decl.addr.rtype) {
            for json_attr in schema.json_attrs {
                if let Some(serde_json::Value::String(text)) = resolved.get(*json_attr) {
                    validate_json_document(&owner, json_attr, text)?;
                }
            }
        }

        Ok(resolved)
    }

    async fn apply_actions(
        &self,
        desired: &DesiredState,
        plan: &ExecutionPlan,
        state: &mut StateFile,
        ctx: &mut ResolutionContext,
    ) -> Result<(usize, usize, usize, usize)> {
        let (mut created, mut updated, mut deleted, mut unchanged) = (0, 0, 0, 0);

        for action in &plan.actions {
            let key = action.addr.to_string();
            match action.kind {
                ActionKind::Delete => {
                    let Some(record) = state.resources.get(&key).cloned() else {
                        continue;
                    };
                    self.provider.destroy(&record).await?;
                    state.resources.remove(&key);
                    deleted += 1;
                    tracing::info!("🗑️ Destroyed {}", key);
                }
                ActionKind::Create => {
                    let decl = &desired.resources[&action.addr];
                    let resolved = self.resolve_attributes(decl, ctx)?;
                    let computed = self
                        .provider
                        .create(&ResolvedResource {
                            addr: action.addr.clone(),
                            attributes: resolved.clone(),
                        })
                        .await?;

                    let record = ResourceRecord {
                        rtype: action.addr.rtype.clone(),
                        name: action.addr.name.clone(),
                        declared: decl.attributes.clone(),
                        resolved,
                        computed,
                        depends_on: decl.depends_on.iter().map(|d| d.to_string()).collect(),
                        created_at: Utc::now(),
                    };
                    ctx.insert_resource(action.addr.clone(), record.attribute_view());
                    state.resources.insert(key.clone(), record);
                    created += 1;
                    tracing::info!("✅ Created {}", key);
                }
                ActionKind::Update => {
                    let prior =
                        state
                            .resources
                            .get(&key)
                            .cloned()
                            .ok_or_else(|| IacError::StateError {
                                message: format!("no state record for planned update of '{}'", key),
                            })?;

                    let decl = &desired.resources[&action.addr];
                    let resolved = self.resolve_attributes(decl, ctx)?;
                    let computed = self
                        .provider
                        .update(
                            &ResolvedResource {
                                addr: action.addr.clone(),
                                attributes: resolved.clone(),
                            },
                            &prior,
                        )
                        .await?;

                    let record = ResourceRecord {
                        rtype: action.addr.rtype.clone(),
                        name: action.addr.name.clone(),
                        declared: decl.attributes.clone(),
                        resolved,
                        computed,
                        depends_on: decl.depends_on.iter().map(|d| d.to_string()).collect(),
                        created_at: prior.created_at,
                    };
                    ctx.insert_resource(action.addr.clone(), record.attribute_view());
                    state.resources.insert(key.clone(), record);
                    updated += 1;
                    tracing::info!("🔄 Updated {}", key);
                }
                ActionKind::NoOp => {
                    // 沒有變更也要把記錄餵進解析視圖，下游引用才解得開
                    if let Some(record) = state.resources.get(&key) {
                        ctx.insert_resource(action.addr.clone(), record.attribute_view());
                    }
                    unchanged += 1;
                }
            }
        }

        Ok((created, updated, deleted, unchanged))
    }

    fn resolve_outputs(
        &self,
        desired: &DesiredState,
        ctx: &ResolutionContext,
        state: &mut StateFile,
    ) -> Result<()> {
        state.outputs.clear();
        for output in &desired.outputs {
            let owner = format!("output.{}", output.name);
            let value = resolver::resolve_string(&owner, &output.value, ctx)?;
            tracing::info!("📤 Output {} = {}", output.name, value);
            state.outputs.insert(output.name.clone(), value);
        }
        Ok(())
    }
}

#[async_trait]
impl<P: Provider, S: StateStore> Provisioner for DocumentProvisioner<P, S> {
    async fn evaluate(&self) -> Result<DesiredState> {
        evaluate_document(&self.document)
    }

    async fn plan(&self, desired: &DesiredState, mode: PlanMode) -> Result<ExecutionPlan> {
        let state = self.load_state(&desired.deployment.name).await?;
        let plan = match mode {
            PlanMode::Normal => planner::plan(desired, &state),
            PlanMode::Destroy => planner::plan_destroy(&state),
        };
        Ok(plan)
    }

    async fn apply(&self, desired: &DesiredState, plan: ExecutionPlan) -> Result<RunSummary> {
        let mut state = self.load_state(&desired.deployment.name).await?;

        // 沒有任何變更：狀態檔原樣保留，輸出值沿用
        if !plan.has_changes() {
            tracing::info!("⏭️ No changes to apply");
            return Ok(RunSummary {
                created: 0,
                updated: 0,
                deleted: 0,
                unchanged: plan.count(ActionKind::NoOp),
                outputs: state.outputs.clone(),
                state_serial: state.serial,
            });
        }

        let mut ctx = ResolutionContext::new();
        for (addr, decl) in &desired.data_lookups {
            let values = self.provider.lookup(decl).await?;
            tracing::debug!("🔎 Data lookup {} resolved", addr);
            ctx.insert_data(addr.clone(), values);
        }

        let apply_result = self.apply_actions(desired, &plan, &mut state, &mut ctx).await;

        // 覆蓋到所有期望資源才解析輸出；destroy 之後輸出清空
        let outputs_result = match &apply_result {
            Ok((created, updated, _, unchanged))
                if created + updated + unchanged == desired.resource_count() =>
            {
                self.resolve_outputs(desired, &ctx, &mut state)
            }
            _ => {
                state.outputs.clear();
                Ok(())
            }
        };

        // 中途失敗也要持久化已完成的部分
        state.serial += 1;
        state.updated_at = Utc::now();
        self.state_store.save(&state).await?;

        let (created, updated, deleted, unchanged) = apply_result?;
        outputs_result?;

        Ok(RunSummary {
            created,
            updated,
            deleted,
            unchanged,
            outputs: state.outputs.clone(),
            state_serial: state.serial,
        })
    }
}
