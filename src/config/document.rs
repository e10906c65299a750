use crate::utils::error::{IacError, Result};
use crate::utils::validation::{
    validate_address_list, validate_identifier, validate_non_empty_string, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::model::AttrValue;

/// 部署文件：單一 TOML 檔描述期望的最終狀態
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentDocument {
    pub deployment: DeploymentInfo,
    pub settings: Option<SettingsConfig>,
    #[serde(default, rename = "data")]
    pub data_lookups: Vec<DataConfig>,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceConfig>,
    #[serde(default, rename = "output")]
    pub outputs: Vec<OutputConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentInfo {
    pub name: String,
    pub description: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsConfig {
    pub region: Option<String>,
}

/// 資料查詢宣告（例如目前 region），由 Provider 在 apply 時解析
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    pub r#type: String,
    pub name: String,
}

/// 資源宣告：型別、邏輯名稱、屬性表與顯式排序提示
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    pub r#type: String,
    pub name: String,
    pub depends_on: Option<Vec<String>>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub name: String,
    pub value: String,
    pub description: Option<String>,
}

impl DeploymentDocument {
    /// 從 TOML 檔案載入部署文件
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(IacError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析部署文件
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| IacError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_STAGE})。
    /// 只認大寫佔位符，小寫的 ${type.name.attr} 是引用表達式，原樣保留。
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([A-Z][A-Z0-9_]*)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證文件的結構合理性（圖分析之前的檢查）
    pub fn validate_config(&self) -> Result<()> {
        validate_identifier("deployment.name", &self.deployment.name)?;
        validate_non_empty_string("deployment.version", &self.deployment.version)?;

        if let Some(settings) = &self.settings {
            if let Some(region) = &settings.region {
                validate_non_empty_string("settings.region", region)?;
            }
        }

        for data in &self.data_lookups {
            validate_identifier("data.type", &data.r#type)?;
            validate_identifier("data.name", &data.name)?;
        }

        for resource in &self.resources {
            validate_identifier("resource.type", &resource.r#type)?;
            validate_identifier("resource.name", &resource.name)?;
            if let Some(deps) = &resource.depends_on {
                validate_address_list(
                    &format!("{}.{}.depends_on", resource.r#type, resource.name),
                    deps,
                )?;
            }
        }

        let mut seen_outputs = std::collections::BTreeSet::new();
        for output in &self.outputs {
            validate_identifier("output.name", &output.name)?;
            validate_non_empty_string(&format!("output.{}.value", output.name), &output.value)?;
            if !seen_outputs.insert(output.name.clone()) {
                return Err(IacError::DuplicateDeclaration {
                    address: format!("output.{}", output.name),
                });
            }
        }

        Ok(())
    }

    pub fn deployment_name(&self) -> &str {
        &self.deployment.name
    }

    /// settings.region，未設定時回傳 None
    pub fn region(&self) -> Option<&str> {
        self.settings.as_ref().and_then(|s| s.region.as_deref())
    }
}

impl Validate for DeploymentDocument {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
