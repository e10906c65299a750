use crate::domain::model::{
    DataDecl, DesiredState, ExecutionPlan, PlanMode, ResolvedResource, ResourceRecord, RunSummary,
    StateFile,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub trait StateStore: Send + Sync {
    fn load(&self) -> impl std::future::Future<Output = Result<Option<StateFile>>> + Send;
    fn save(&self, state: &StateFile) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait EngineConfig: Send + Sync {
    fn document_path(&self) -> &str;
    fn state_path(&self) -> &str;
    fn workspace_path(&self) -> &str;
    fn region(&self) -> Option<&str>;
}

/// 外部供應者邊界：實際建立/更新/銷毀資源的一方
#[async_trait]
pub trait Provider: Send + Sync {
    /// 回傳 computed 屬性（arn、id 等）
    async fn create(
        &self,
        resource: &ResolvedResource,
    ) -> Result<BTreeMap<String, serde_json::Value>>;

    async fn update(
        &self,
        resource: &ResolvedResource,
        prior: &ResourceRecord,
    ) -> Result<BTreeMap<String, serde_json::Value>>;

    async fn destroy(&self, record: &ResourceRecord) -> Result<()>;

    /// 解析資料查詢（例如目前 region）
    async fn lookup(&self, data: &DataDecl) -> Result<BTreeMap<String, serde_json::Value>>;
}

#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn evaluate(&self) -> Result<DesiredState>;
    async fn plan(&self, desired: &DesiredState, mode: PlanMode) -> Result<ExecutionPlan>;
    async fn apply(&self, desired: &DesiredState, plan: ExecutionPlan) -> Result<RunSummary>;
}
