use crate::domain::model::{AttrValue, DataDecl, ResourceDecl};
use crate::utils::error::{IacError, Result};
use crate::utils::validation::{validate_json_document, validate_positive_number, validate_uri};

/// 數值屬性的下限是 1（0 天的 log 保留期或 0 MB 的記憶體沒有意義）
const POSITIVE_ATTRS: &[&str] = &["retention_days", "timeout_seconds", "memory_mb"];

/// 資源型別的屬性規格
#[derive(Debug, Clone, Copy)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    /// 內嵌 JSON 文件的屬性（policy 文件）
    pub json_attrs: &'static [&'static str],
    /// 必須是 http(s) URL 或 arn: 識別字的屬性
    pub uri_attrs: &'static [&'static str],
    /// Provider 建立後回填的屬性
    pub computed: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct DataSchema {
    pub type_name: &'static str,
    pub computed: &'static [&'static str],
}

pub const RESOURCE_SCHEMAS: &[ResourceSchema] = &[
    ResourceSchema {
        type_name: "role",
        required: &["name", "assume_role_policy"],
        optional: &["description"],
        json_attrs: &["assume_role_policy"],
        uri_attrs: &[],
        computed: &["arn", "id"],
    },
    ResourceSchema {
        type_name: "policy",
        required: &["name", "document"],
        optional: &["description"],
        json_attrs: &["document"],
        uri_attrs: &[],
        computed: &["arn"],
    },
    ResourceSchema {
        type_name: "policy_attachment",
        required: &["role", "policy_arn"],
        optional: &[],
        json_attrs: &[],
        uri_attrs: &[],
        computed: &["id"],
    },
    ResourceSchema {
        type_name: "function",
        required: &["name", "runtime", "handler", "role_arn"],
        optional: &["description", "timeout_seconds", "memory_mb", "source_path"],
        json_attrs: &[],
        uri_attrs: &[],
        computed: &["arn", "invoke_arn"],
    },
    ResourceSchema {
        type_name: "log_group",
        required: &["name"],
        optional: &["retention_days"],
        json_attrs: &[],
        uri_attrs: &[],
        computed: &["arn"],
    },
    ResourceSchema {
        type_name: "rest_api",
        required: &["name"],
        optional: &["description"],
        json_attrs: &[],
        uri_attrs: &[],
        computed: &["id", "root_resource_id", "execution_arn"],
    },
    ResourceSchema {
        type_name: "api_resource",
        required: &["api_id", "parent_id", "path_part"],
        optional: &[],
        json_attrs: &[],
        uri_attrs: &[],
        computed: &["id"],
    },
    ResourceSchema {
        type_name: "api_method",
        required: &["api_id", "resource_id", "http_method"],
        optional: &["authorization"],
        json_attrs: &[],
        uri_attrs: &[],
        computed: &["id"],
    },
    ResourceSchema {
        type_name: "api_integration",
        required: &[
            "api_id",
            "resource_id",
            "http_method",
            "integration_type",
            "uri",
        ],
        optional: &[],
        json_attrs: &[],
        uri_attrs: &["uri"],
        computed: &["id"],
    },
    ResourceSchema {
        type_name: "api_deployment",
        required: &["api_id", "stage_name"],
        optional: &["description"],
        json_attrs: &[],
        uri_attrs: &[],
        computed: &["id", "invoke_url"],
    },
    ResourceSchema {
        type_name: "permission",
        required: &["function_name", "action", "principal"],
        optional: &["source_arn"],
        json_attrs: &[],
        uri_attrs: &[],
        computed: &["id"],
    },
];

pub const DATA_SCHEMAS: &[DataSchema] = &[DataSchema {
    type_name: "region",
    computed: &["name"],
}];

pub fn lookup(type_name: &str) -> Option<&'static ResourceSchema> {
    RESOURCE_SCHEMAS.iter().find(|s| s.type_name == type_name)
}

pub fn lookup_data(type_name: &str) -> Option<&'static DataSchema> {
    DATA_SCHEMAS.iter().find(|s| s.type_name == type_name)
}

/// 宣告層級檢查：型別已知、必要屬性齊全、屬性名稱合法。
/// 內嵌引用的字串值在 apply 前無法定值，JSON/URI 檢查只對純文字值生效。
pub fn check_resource(decl: &ResourceDecl) -> Result<()> {
    let address = decl.addr.to_string();
    let schema = lookup(&decl.addr.rtype).ok_or_else(|| IacError::UnknownResourceType {
        address: address.clone(),
        type_name: decl.addr.rtype.clone(),
    })?;

    for required in schema.required {
        if !decl.attributes.contains_key(*required) {
            return Err(IacError::MissingAttribute {
                address: address.clone(),
                attribute: (*required).to_string(),
            });
        }
    }

    for attr_name in decl.attributes.keys() {
        let known = schema.required.contains(&attr_name.as_str())
            || schema.optional.contains(&attr_name.as_str());
        if !known {
            return Err(IacError::UnknownAttribute {
                address: address.clone(),
                attribute: attr_name.clone(),
            });
        }
    }

    for positive_attr in POSITIVE_ATTRS {
        if let Some(AttrValue::Int(value)) = decl.attributes.get(*positive_attr) {
            validate_positive_number(
                &format!("{}.{}", address, positive_attr),
                usize::try_from(*value).unwrap_or(0),
                1,
            )?;
        }
    }

    for json_attr in schema.json_attrs {
        if let Some(AttrValue::Str(text)) = decl.attributes.get(*json_attr) {
            if !text.contains("${") {
                validate_json_document(&address, json_attr, text)?;
            }
        }
    }

    for uri_attr in schema.uri_attrs {
        if let Some(AttrValue::Str(text)) = decl.attributes.get(*uri_attr) {
            if !text.contains("${") {
                validate_uri(&format!("{}.{}", address, uri_attr), text)?;
            }
        }
    }

    Ok(())
}

pub fn check_data(decl: &DataDecl) -> Result<()> {
    if lookup_data(&decl.addr.dtype).is_none() {
        return Err(IacError::UnknownDataSource {
            address: decl.addr.to_string(),
            type_name: decl.addr.dtype.clone(),
        });
    }
    Ok(())
}
