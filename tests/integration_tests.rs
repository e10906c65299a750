use small_iac::core::engine::RunMode;
use small_iac::{
    DeploymentDocument, DocumentProvisioner, LocalProvider, LocalStateStore, ProvisionEngine,
};
use tempfile::TempDir;

/// The full serverless deployment: function, execution role, logging policy,
/// API gateway chain, log group, permission, region lookup and one output.
const FULL_DOCUMENT: &str = r#"
[deployment]
name = "notes-api"
description = "Serverless HTTP endpoint for notes"
version = "0.1.0"

[settings]
region = "eu-west-1"

[[data]]
type = "region"
name = "current"

[[resource]]
type = "log_group"
name = "fn_logs"

[resource.attributes]
name = "/serverless/notes-api"
retention_days = 14

[[resource]]
type = "role"
name = "fn_role"

[resource.attributes]
name = "notes-api-exec"
assume_role_policy = '''
{
  "Version": "2012-10-17",
  "Statement": [
    {"Effect": "Allow", "Action": "sts:AssumeRole", "Principal": {"Service": "functions.local"}}
  ]
}
'''

[[resource]]
type = "policy"
name = "fn_logging"

[resource.attributes]
name = "notes-api-logging"
document = '''
{
  "Version": "2012-10-17",
  "Statement": [
    {"Effect": "Allow", "Action": ["logs:PutLogEvents"], "Resource": "${log_group.fn_logs.arn}"}
  ]
}
'''

[[resource]]
type = "policy_attachment"
name = "fn_logging"

[resource.attributes]
role = "${role.fn_role.name}"
policy_arn = "${policy.fn_logging.arn}"

[[resource]]
type = "function"
name = "api_handler"
depends_on = ["log_group.fn_logs"]

[resource.attributes]
name = "notes-api"
description = "notes handler in ${data.region.current.name}"
runtime = "provided.al2"
handler = "bootstrap"
role_arn = "${role.fn_role.arn}"
timeout_seconds = 10
memory_mb = 128

[[resource]]
type = "rest_api"
name = "api"

[resource.attributes]
name = "notes-api"
description = "HTTP front door for ${function.api_handler.name}"

[[resource]]
type = "api_resource"
name = "notes"

[resource.attributes]
api_id = "${rest_api.api.id}"
parent_id = "${rest_api.api.root_resource_id}"
path_part = "notes"

[[resource]]
type = "api_method"
name = "post_notes"

[resource.attributes]
api_id = "${rest_api.api.id}"
resource_id = "${api_resource.notes.id}"
http_method = "POST"
authorization = "NONE"

[[resource]]
type = "api_integration"
name = "post_notes"

[resource.attributes]
api_id = "${rest_api.api.id}"
resource_id = "${api_resource.notes.id}"
http_method = "POST"
integration_type = "proxy"
uri = "${function.api_handler.invoke_arn}"

[[resource]]
type = "permission"
name = "api_gateway"

[resource.attributes]
function_name = "${function.api_handler.name}"
action = "function:Invoke"
principal = "apigateway.local"
source_arn = "${rest_api.api.execution_arn}/*"

[[resource]]
type = "api_deployment"
name = "prod"
depends_on = ["api_integration.post_notes", "api_method.post_notes"]

[resource.attributes]
api_id = "${rest_api.api.id}"
stage_name = "prod"

[[output]]
name = "invoke_url"
value = "${api_deployment.prod.invoke_url}"
"#;

struct Harness {
    _temp: TempDir,
    workspace: std::path::PathBuf,
    state_path: std::path::PathBuf,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("workspace");
        let state_path = temp.path().join("state/state.json");
        Self {
            _temp: temp,
            workspace,
            state_path,
        }
    }

    fn engine(
        &self,
        document: &str,
    ) -> ProvisionEngine<DocumentProvisioner<LocalProvider, LocalStateStore>> {
        let document = DeploymentDocument::from_toml_str(document).unwrap();
        let region = LocalProvider::resolve_region(None, document.region());
        let provider = LocalProvider::new(&self.workspace, region);
        let state_store = LocalStateStore::new(&self.state_path);
        ProvisionEngine::new(DocumentProvisioner::new(document, provider, state_store))
    }

    fn workspace_records(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.workspace)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    fn state(&self) -> small_iac::core::StateFile {
        serde_json::from_str(&std::fs::read_to_string(&self.state_path).unwrap()).unwrap()
    }
}

#[tokio::test]
async fn test_end_to_end_apply_of_full_deployment() {
    let harness = Harness::new();
    let engine = harness.engine(FULL_DOCUMENT);

    let outcome = engine.run(RunMode::Apply).await.unwrap();
    let summary = outcome.summary.unwrap();

    assert_eq!(summary.created, 11);
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.state_serial, 1);

    // Every resource materialized one workspace record
    let records = harness.workspace_records();
    assert_eq!(records.len(), 11);
    assert!(records.contains(&"function.api_handler.json".to_string()));
    assert!(records.contains(&"api_deployment.prod.json".to_string()));

    // The single surfaced output: the deployment invoke URL
    let invoke_url = summary.outputs.get("invoke_url").unwrap().as_str().unwrap();
    assert!(invoke_url.contains("execute-api.eu-west-1.local"));
    assert!(invoke_url.ends_with("/prod"));

    // References were resolved before reaching the provider
    let state = harness.state();
    let function = state
        .record(&small_iac::core::ResourceAddr::new("function", "api_handler"))
        .unwrap();
    assert_eq!(
        function.resolved.get("role_arn"),
        Some(&serde_json::json!("arn:local:role:eu-west-1:fn_role"))
    );
    // The region data lookup fed the description through interpolation
    assert_eq!(
        function.resolved.get("description"),
        Some(&serde_json::json!("notes handler in eu-west-1"))
    );

    // The policy document carried an embedded reference; after resolution it
    // must be well-formed JSON mentioning the log group ARN
    let policy = state
        .record(&small_iac::core::ResourceAddr::new("policy", "fn_logging"))
        .unwrap();
    let document_text = policy.resolved.get("document").unwrap().as_str().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(document_text).unwrap();
    assert_eq!(
        parsed["Statement"][0]["Resource"],
        serde_json::json!("arn:local:log_group:eu-west-1:fn_logs")
    );
}

#[tokio::test]
async fn test_reapply_is_noop_and_keeps_serial() {
    let harness = Harness::new();
    let engine = harness.engine(FULL_DOCUMENT);

    engine.run(RunMode::Apply).await.unwrap();
    let outcome = engine.run(RunMode::Apply).await.unwrap();
    let summary = outcome.summary.unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.unchanged, 11);
    assert_eq!(summary.state_serial, 1);
    // Outputs survive a no-change run
    assert!(summary.outputs.contains_key("invoke_url"));
}

#[tokio::test]
async fn test_attribute_edit_updates_only_that_resource() {
    let harness = Harness::new();
    harness
        .engine(FULL_DOCUMENT)
        .run(RunMode::Apply)
        .await
        .unwrap();

    let edited = FULL_DOCUMENT.replace("retention_days = 14", "retention_days = 30");
    let outcome = harness.engine(&edited).run(RunMode::Apply).await.unwrap();
    let summary = outcome.summary.unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.unchanged, 10);
    assert_eq!(summary.state_serial, 2);

    let state = harness.state();
    let logs = state
        .record(&small_iac::core::ResourceAddr::new("log_group", "fn_logs"))
        .unwrap();
    assert_eq!(
        logs.resolved.get("retention_days"),
        Some(&serde_json::json!(30))
    );
}

#[tokio::test]
async fn test_removed_declaration_is_destroyed() {
    let harness = Harness::new();
    harness
        .engine(FULL_DOCUMENT)
        .run(RunMode::Apply)
        .await
        .unwrap();

    // Drop the permission declaration from the document
    let start = FULL_DOCUMENT.find("[[resource]]\ntype = \"permission\"").unwrap();
    let end = FULL_DOCUMENT.find("[[resource]]\ntype = \"api_deployment\"").unwrap();
    let edited = format!("{}{}", &FULL_DOCUMENT[..start], &FULL_DOCUMENT[end..]);

    let outcome = harness.engine(&edited).run(RunMode::Apply).await.unwrap();
    let summary = outcome.summary.unwrap();

    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.unchanged, 10);

    let records = harness.workspace_records();
    assert!(!records.contains(&"permission.api_gateway.json".to_string()));
    assert!(harness
        .state()
        .record(&small_iac::core::ResourceAddr::new("permission", "api_gateway"))
        .is_none());
}

#[tokio::test]
async fn test_destroy_empties_workspace_and_state() {
    let harness = Harness::new();
    harness
        .engine(FULL_DOCUMENT)
        .run(RunMode::Apply)
        .await
        .unwrap();

    let outcome = harness
        .engine(FULL_DOCUMENT)
        .run(RunMode::Destroy)
        .await
        .unwrap();
    let summary = outcome.summary.unwrap();

    assert_eq!(summary.deleted, 11);
    assert!(summary.outputs.is_empty());
    assert!(harness.workspace_records().is_empty());

    let state = harness.state();
    assert!(state.is_empty());
    assert!(state.outputs.is_empty());
    assert_eq!(state.serial, 2);
}

#[tokio::test]
async fn test_plan_mode_does_not_touch_workspace_or_state() {
    let harness = Harness::new();
    let outcome = harness
        .engine(FULL_DOCUMENT)
        .run(RunMode::Plan)
        .await
        .unwrap();

    let plan = outcome.plan.unwrap();
    assert_eq!(plan.count(small_iac::core::ActionKind::Create), 11);
    assert!(outcome.summary.is_none());

    assert!(harness.workspace_records().is_empty());
    assert!(!harness.state_path.exists());
}

#[tokio::test]
async fn test_validate_mode_stops_after_evaluation() {
    let harness = Harness::new();
    let outcome = harness
        .engine(FULL_DOCUMENT)
        .run(RunMode::Validate)
        .await
        .unwrap();

    assert!(outcome.plan.is_none());
    assert!(outcome.summary.is_none());
    assert!(!harness.state_path.exists());
}
