use crate::core::schema;
use crate::domain::model::{DataDecl, ResolvedResource, ResourceRecord};
use crate::domain::ports::Provider;
use crate::utils::error::{IacError, Result};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

pub const DEFAULT_REGION: &str = "local-1";

/// 模擬的資源供應者：每個資源在 workspace 目錄下留下一個 JSON 紀錄，
/// computed 屬性用位址決定性合成。雲端 SDK 呼叫不在本工具範圍內。
#[derive(Debug, Clone)]
pub struct LocalProvider {
    workspace: PathBuf,
    region: String,
}

impl LocalProvider {
    pub fn new(workspace: impl Into<PathBuf>, region: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            region: region.into(),
        }
    }

    /// region 優先序：CLI 旗標 > 文件 settings > SMALL_IAC_REGION > 預設值
    pub fn resolve_region(cli_region: Option<&str>, document_region: Option<&str>) -> String {
        if let Some(region) = cli_region {
            return region.to_string();
        }
        if let Some(region) = document_region {
            return region.to_string();
        }
        std::env::var("SMALL_IAC_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string())
    }

    pub fn record_path(&self, rtype: &str, name: &str) -> PathBuf {
        self.workspace.join(format!("{}.{}.json", rtype, name))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn short_id(seed: &str) -> String {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        format!("{:010x}", hasher.finish() & 0xffff_ffff_ff)
    }

    fn attr_str(attributes: &BTreeMap<String, serde_json::Value>, key: &str) -> String {
        attributes
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    fn synthesize_computed(
        &self,
        resource: &ResolvedResource,
    ) -> BTreeMap<String, serde_json::Value> {
        let addr = &resource.addr;
        let seed = addr.to_string();
        let mut computed = BTreeMap::new();

        let Some(schema) = schema::lookup(&addr.rtype) else {
            return computed;
        };

        for attr in schema.computed {
            let value = match *attr {
                "arn" => format!("arn:local:{}:{}:{}", addr.rtype, self.region, addr.name),
                "id" => Self::short_id(&seed),
                "invoke_arn" => format!(
                    "arn:local:apigateway:{}:functions/{}/invocations",
                    self.region, addr.name
                ),
                "root_resource_id" => Self::short_id(&format!("{}/root", seed)),
                "execution_arn" => format!(
                    "arn:local:execute-api:{}:{}",
                    self.region,
                    Self::short_id(&seed)
                ),
                "invoke_url" => format!(
                    "https://{}.execute-api.{}.local/{}",
                    Self::attr_str(&resource.attributes, "api_id"),
                    self.region,
                    Self::attr_str(&resource.attributes, "stage_name")
                ),
                other => Self::short_id(&format!("{}/{}", seed, other)),
            };
            computed.insert((*attr).to_string(), serde_json::json!(value));
        }

        computed
    }

    fn write_record(
        &self,
        resource: &ResolvedResource,
        computed: &BTreeMap<String, serde_json::Value>,
    ) -> Result<()> {
        fs::create_dir_all(&self.workspace).map_err(|e| IacError::ProviderError {
            address: resource.addr.to_string(),
            message: format!("cannot create workspace: {}", e),
        })?;

        let body = serde_json::json!({
            "type": resource.addr.rtype,
            "name": resource.addr.name,
            "region": self.region,
            "attributes": resource.attributes,
            "computed": computed,
        });
        let path = self.record_path(&resource.addr.rtype, &resource.addr.name);
        fs::write(&path, serde_json::to_string_pretty(&body)?).map_err(|e| {
            IacError::ProviderError {
                address: resource.addr.to_string(),
                message: format!("cannot write {}: {}", path.display(), e),
            }
        })?;
        Ok(())
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn create(
        &self,
        resource: &ResolvedResource,
    ) -> Result<BTreeMap<String, serde_json::Value>> {
        let computed = self.synthesize_computed(resource);
        self.write_record(resource, &computed)?;
        tracing::debug!("💾 Materialized {}", resource.addr);
        Ok(computed)
    }

    async fn update(
        &self,
        resource: &ResolvedResource,
        _prior: &ResourceRecord,
    ) -> Result<BTreeMap<String, serde_json::Value>> {
        // 更新就是重寫紀錄；computed 屬性由位址決定，維持穩定
        let computed = self.synthesize_computed(resource);
        self.write_record(resource, &computed)?;
        tracing::debug!("💾 Rewrote {}", resource.addr);
        Ok(computed)
    }

    async fn destroy(&self, record: &ResourceRecord) -> Result<()> {
        let path = self.record_path(&record.rtype, &record.name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            // 已經不在就算刪除成功
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IacError::ProviderError {
                address: record.addr().to_string(),
                message: format!("cannot remove {}: {}", path.display(), e),
            }),
        }
    }

    async fn lookup(&self, data: &DataDecl) -> Result<BTreeMap<String, serde_json::Value>> {
        match data.addr.dtype.as_str() {
            "region" => {
                let mut values = BTreeMap::new();
                values.insert("name".to_string(), serde_json::json!(self.region));
                Ok(values)
            }
            other => Err(IacError::UnknownDataSource {
                address: data.addr.to_string(),
                type_name: other.to_string(),
            }),
        }
    }
}
