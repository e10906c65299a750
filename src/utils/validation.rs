use crate::utils::error::{IacError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Logical names for deployments, resources, data sources and outputs.
pub fn validate_identifier(field_name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(IacError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Name cannot be empty".to_string(),
        });
    }

    let mut chars = value.chars();
    let first = chars.next().unwrap();
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(IacError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Name must start with a letter or underscore".to_string(),
        });
    }

    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(IacError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Name contains invalid character '{}'", bad),
        });
    }

    Ok(())
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(IacError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(IacError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(IacError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(IacError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Policy documents are JSON carried inside a TOML string; they must at
/// least parse. Content-level checks belong to the cloud provider.
pub fn validate_json_document(address: &str, attribute: &str, text: &str) -> Result<()> {
    serde_json::from_str::<serde_json::Value>(text).map_err(|e| {
        IacError::MalformedPolicyDocument {
            address: address.to_string(),
            attribute: attribute.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(())
}

/// Integration targets are either http(s) URLs or provider-style
/// `arn:`-prefixed identifiers.
pub fn validate_uri(field_name: &str, value: &str) -> Result<()> {
    if value.starts_with("arn:") {
        return validate_non_empty_string(field_name, value);
    }

    match Url::parse(value) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(IacError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: value.to_string(),
                reason: format!("Unsupported URI scheme: {}", scheme),
            }),
        },
        Err(e) => Err(IacError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Invalid URI format: {}", e),
        }),
    }
}

/// `depends_on` entries must look like `type.name` addresses.
pub fn validate_address_list(field_name: &str, entries: &[String]) -> Result<()> {
    for entry in entries {
        let mut parts = entry.splitn(2, '.');
        let rtype = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        if rtype.is_empty() || name.is_empty() {
            return Err(IacError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: entry.clone(),
                reason: "Expected a 'type.name' address".to_string(),
            });
        }
    }
    Ok(())
}
