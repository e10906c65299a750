use thiserror::Error;

#[derive(Error, Debug)]
pub enum IacError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Unknown resource type '{type_name}' declared by '{address}'")]
    UnknownResourceType { address: String, type_name: String },

    #[error("Unknown data source type '{type_name}' declared by '{address}'")]
    UnknownDataSource { address: String, type_name: String },

    #[error("Duplicate declaration: '{address}'")]
    DuplicateDeclaration { address: String },

    #[error("'{owner}' references unknown declaration '{reference}'")]
    UnknownReference { owner: String, reference: String },

    #[error("Invalid reference expression '{expression}' in '{owner}'")]
    InvalidReference { owner: String, expression: String },

    #[error("Dependency cycle detected among: {path}")]
    DependencyCycle { path: String },

    #[error("Missing required attribute '{attribute}' on '{address}'")]
    MissingAttribute { address: String, attribute: String },

    #[error("Unknown attribute '{attribute}' on '{address}'")]
    UnknownAttribute { address: String, attribute: String },

    #[error("Malformed policy document in '{attribute}' on '{address}': {reason}")]
    MalformedPolicyDocument {
        address: String,
        attribute: String,
        reason: String,
    },

    #[error("Reference '{expression}' cannot be resolved: {reason}")]
    UnresolvedReference { expression: String, reason: String },

    #[error("Provider operation failed on '{address}': {message}")]
    ProviderError { address: String, message: String },

    #[error("State error: {message}")]
    StateError { message: String },
}

pub type Result<T> = std::result::Result<T, IacError>;

/// 錯誤分類，用於日誌與報告
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Config,
    Validation,
    Graph,
    Provider,
    State,
}

/// 錯誤嚴重程度，決定 CLI 退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IacError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IacError::IoError(_) | IacError::SerializationError(_) => ErrorCategory::Io,
            IacError::ConfigValidationError { .. }
            | IacError::InvalidConfigValueError { .. }
            | IacError::MissingConfigError { .. } => ErrorCategory::Config,
            IacError::UnknownResourceType { .. }
            | IacError::UnknownDataSource { .. }
            | IacError::MissingAttribute { .. }
            | IacError::UnknownAttribute { .. }
            | IacError::MalformedPolicyDocument { .. } => ErrorCategory::Validation,
            IacError::DuplicateDeclaration { .. }
            | IacError::UnknownReference { .. }
            | IacError::InvalidReference { .. }
            | IacError::DependencyCycle { .. }
            | IacError::UnresolvedReference { .. } => ErrorCategory::Graph,
            IacError::ProviderError { .. } => ErrorCategory::Provider,
            IacError::StateError { .. } => ErrorCategory::State,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Io | ErrorCategory::State => ErrorSeverity::Critical,
            ErrorCategory::Provider => ErrorSeverity::Medium,
            ErrorCategory::Config | ErrorCategory::Validation | ErrorCategory::Graph => {
                ErrorSeverity::High
            }
        }
    }

    /// 根據錯誤類型給出修復建議
    pub fn recovery_suggestion(&self) -> String {
        match self {
            IacError::IoError(_) => {
                "Check file permissions and that the document/state paths exist".to_string()
            }
            IacError::SerializationError(_) => {
                "The state file may be corrupted; restore it from a backup or remove it to start fresh"
                    .to_string()
            }
            IacError::ConfigValidationError { field, .. }
            | IacError::InvalidConfigValueError { field, .. }
            | IacError::MissingConfigError { field } => {
                format!("Fix the '{}' setting and run again", field)
            }
            IacError::UnknownResourceType { type_name, .. } => format!(
                "'{}' is not a supported resource type; check the type keyword for typos",
                type_name
            ),
            IacError::UnknownDataSource { type_name, .. } => format!(
                "'{}' is not a supported data source type; check the type keyword for typos",
                type_name
            ),
            IacError::DuplicateDeclaration { address } => format!(
                "Rename one of the declarations so that '{}' appears only once",
                address
            ),
            IacError::UnknownReference { reference, .. } => format!(
                "Declare '{}' in the document or fix the reference",
                reference
            ),
            IacError::InvalidReference { .. } => {
                "References use the form ${type.name.attribute} or ${data.type.name.attribute}"
                    .to_string()
            }
            IacError::DependencyCycle { .. } => {
                "Remove one of the references or depends_on entries that closes the cycle"
                    .to_string()
            }
            IacError::MissingAttribute { attribute, .. } => {
                format!("Add the required attribute '{}'", attribute)
            }
            IacError::UnknownAttribute { attribute, .. } => {
                format!("Remove the attribute '{}' or check it for typos", attribute)
            }
            IacError::MalformedPolicyDocument { attribute, .. } => format!(
                "The '{}' attribute must contain a well-formed JSON document",
                attribute
            ),
            IacError::UnresolvedReference { .. } => {
                "Make sure the referenced attribute is declared or exported by its resource"
                    .to_string()
            }
            IacError::ProviderError { .. } => {
                "Inspect the provider message, fix the cause and re-run apply; completed resources are recorded in state"
                    .to_string()
            }
            IacError::StateError { .. } => {
                "Verify that the state file belongs to this deployment".to_string()
            }
        }
    }

    /// 給終端使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("File operation failed: {}", self),
            ErrorCategory::Config => format!("Configuration problem: {}", self),
            ErrorCategory::Validation => format!("Document validation failed: {}", self),
            ErrorCategory::Graph => format!("Dependency analysis failed: {}", self),
            ErrorCategory::Provider => format!("Provisioning failed: {}", self),
            ErrorCategory::State => format!("State problem: {}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        let err = IacError::UnknownReference {
            owner: "function.api".to_string(),
            reference: "role.missing".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Graph);
        assert_eq!(err.severity(), ErrorSeverity::High);

        let err = IacError::ProviderError {
            address: "function.api".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Provider);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_io_errors_are_critical() {
        let err = IacError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_recovery_suggestion_names_the_field() {
        let err = IacError::MissingConfigError {
            field: "deployment.name".to_string(),
        };
        assert!(err.recovery_suggestion().contains("deployment.name"));
    }

    #[test]
    fn test_display_includes_addresses() {
        let err = IacError::MissingAttribute {
            address: "role.fn_role".to_string(),
            attribute: "assume_role_policy".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("role.fn_role"));
        assert!(msg.contains("assume_role_policy"));
    }
}
