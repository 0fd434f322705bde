use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Paginated envelope returned by every collection endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Collection<T> {
    #[serde(default)]
    pub items: Vec<T>,
    #[serde(default)]
    pub total_results: u64,
}

/// Property value that is either plain text or a sensitive placeholder
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Sensitive(SensitiveValue),
    Other(Value),
}

impl PropertyValue {
    /// The value as a string. Sensitive values have no readable content.
    pub fn to_plain_text(&self) -> Option<String> {
        match self {
            PropertyValue::Text(text) => Some(text.clone()),
            PropertyValue::Sensitive(_) => None,
            PropertyValue::Other(Value::Null) => None,
            PropertyValue::Other(other) => Some(other.to_string()),
        }
    }
}

/// `HasValue` is required so arbitrary objects fall through to `Other`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SensitiveValue {
    pub has_value: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub task_queue_stopped: bool,
    pub space_managers_team_members: Vec<String>,
    pub space_managers_teams: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProjectGroup {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Environment {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub use_guided_failure: bool,
    pub allow_dynamic_infrastructure: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RetentionPolicy {
    pub unit: String,
    pub quantity_to_keep: i64,
    pub should_keep_forever: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Phase {
    pub id: String,
    pub name: String,
    pub automatic_deployment_targets: Vec<String>,
    pub optional_deployment_targets: Vec<String>,
    pub minimum_environments_before_promotion: i64,
    pub is_optional_phase: bool,
    pub release_retention_policy: Option<RetentionPolicy>,
    pub tentacle_retention_policy: Option<RetentionPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Lifecycle {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub release_retention_policy: Option<RetentionPolicy>,
    pub tentacle_retention_policy: Option<RetentionPolicy>,
    pub phases: Vec<Phase>,
}

/// Every account kind shares this shape; kind-specific fields are optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub account_type: String,
    pub environment_ids: Vec<String>,
    pub tenant_ids: Vec<String>,
    pub tenant_tags: Vec<String>,
    pub tenanted_deployment_participation: Option<String>,
    // Azure
    pub subscription_number: Option<String>,
    pub client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub azure_environment: Option<String>,
    pub resource_management_endpoint_base_uri: Option<String>,
    pub active_directory_endpoint_base_uri: Option<String>,
    // AWS
    pub access_key: Option<String>,
    // SSH and username/password
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Feed {
    pub id: String,
    pub name: String,
    pub feed_type: String,
    pub feed_uri: Option<String>,
    pub username: Option<String>,
    pub download_attempts: Option<i64>,
    pub download_retry_backoff_seconds: Option<i64>,
    pub is_enhanced_mode: Option<bool>,
    pub api_version: Option<String>,
    pub registry_path: Option<String>,
    pub access_key: Option<String>,
    pub region: Option<String>,
    pub package_acquisition_location_options: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WorkerPool {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub sort_order: i64,
    pub worker_pool_type: String,
    pub worker_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MachineCleanupPolicy {
    pub delete_machines_behavior: String,
    #[serde(rename = "DeleteMachinesElapsedTimeSpan")]
    pub delete_machines_elapsed_timespan: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MachineConnectivityPolicy {
    pub machine_connectivity_behavior: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HealthCheckScript {
    pub run_type: String,
    pub script_body: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MachineHealthCheckPolicy {
    pub health_check_interval: Option<String>,
    pub health_check_type: String,
    pub bash_health_check_policy: HealthCheckScript,
    pub power_shell_health_check_policy: HealthCheckScript,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MachineUpdatePolicy {
    pub calamari_update_behavior: String,
    pub tentacle_update_behavior: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MachinePolicy {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub connection_connect_timeout: Option<String>,
    pub connection_retry_count_limit: i64,
    pub connection_retry_sleep_interval: Option<String>,
    pub connection_retry_time_limit: Option<String>,
    pub polling_request_maximum_message_processing_timeout: Option<String>,
    pub polling_request_queue_timeout: Option<String>,
    pub machine_cleanup_policy: MachineCleanupPolicy,
    pub machine_connectivity_policy: MachineConnectivityPolicy,
    pub machine_health_check_policy: MachineHealthCheckPolicy,
    pub machine_update_policy: MachineUpdatePolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Certificate {
    pub id: String,
    pub name: String,
    pub notes: Option<String>,
    pub archived: Option<String>,
    pub environment_ids: Vec<String>,
    pub tenant_ids: Vec<String>,
    pub tenant_tags: Vec<String>,
    pub tenanted_deployment_participation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GitCredentialDetails {
    #[serde(rename = "Type")]
    pub credential_type: String,
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GitCredential {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub details: GitCredentialDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub canonical_tag_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TagSet {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tenant_tags: Vec<String>,
    /// Project id to environment ids
    pub project_environments: BTreeMap<String, Vec<String>>,
}

/// A prompted template on a project or library variable set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub label: Option<String>,
    pub help_text: Option<String>,
    pub default_value: Option<PropertyValue>,
    pub display_settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TenantProjectVariable {
    pub project_id: String,
    pub project_name: String,
    pub templates: Vec<Template>,
    /// Environment id to template id to value
    pub variables: BTreeMap<String, BTreeMap<String, PropertyValue>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TenantLibraryVariable {
    pub library_variable_set_id: String,
    pub library_variable_set_name: String,
    pub templates: Vec<Template>,
    /// Template id to value
    pub variables: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TenantVariables {
    pub tenant_id: String,
    pub tenant_name: String,
    pub project_variables: BTreeMap<String, TenantProjectVariable>,
    pub library_variables: BTreeMap<String, TenantLibraryVariable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LibraryVariableSet {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub variable_set_id: String,
    pub content_type: String,
    pub templates: Vec<Template>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VariableScope {
    pub environment: Vec<String>,
    pub role: Vec<String>,
    pub machine: Vec<String>,
    pub channel: Vec<String>,
    pub tenant_tag: Vec<String>,
    pub action: Vec<String>,
}

impl VariableScope {
    pub fn is_empty(&self) -> bool {
        self.environment.is_empty()
            && self.role.is_empty()
            && self.machine.is_empty()
            && self.channel.is_empty()
            && self.tenant_tag.is_empty()
            && self.action.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VariablePrompt {
    pub label: Option<String>,
    pub description: Option<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Variable {
    pub id: String,
    pub name: String,
    pub value: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "Type")]
    pub variable_type: String,
    pub is_sensitive: bool,
    pub scope: VariableScope,
    pub prompt: Option<VariablePrompt>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VariableSet {
    pub id: String,
    pub owner_id: String,
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ConnectivityPolicy {
    pub allow_deployments_to_no_targets: bool,
    pub exclude_unhealthy_targets: bool,
    pub skip_machine_behavior: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PersistenceCredentials {
    #[serde(rename = "Type")]
    pub credential_type: String,
    pub id: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PersistenceSettings {
    #[serde(rename = "Type")]
    pub persistence_type: String,
    pub url: Option<String>,
    pub base_path: Option<String>,
    pub default_branch: Option<String>,
    pub protected_branch_name_patterns: Vec<String>,
    pub credentials: PersistenceCredentials,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub project_group_id: String,
    pub lifecycle_id: String,
    pub variable_set_id: String,
    pub deployment_process_id: Option<String>,
    pub auto_create_release: bool,
    pub default_guided_failure_mode: Option<String>,
    pub default_to_skip_if_already_installed: bool,
    pub discrete_channel_release: bool,
    pub is_disabled: bool,
    pub is_version_controlled: bool,
    pub tenanted_deployment_participation: Option<String>,
    pub included_library_variable_set_ids: Vec<String>,
    pub templates: Vec<Template>,
    pub project_connectivity_policy: ConnectivityPolicy,
    pub persistence_settings: Option<PersistenceSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ActionPackageReference {
    pub deployment_action: String,
    pub package_reference: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ChannelRule {
    pub id: String,
    pub version_range: Option<String>,
    pub tag: Option<String>,
    pub action_packages: Vec<ActionPackageReference>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub project_id: String,
    pub lifecycle_id: Option<String>,
    pub is_default: bool,
    pub tenant_tags: Vec<String>,
    pub rules: Vec<ChannelRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Container {
    pub feed_id: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PackageReference {
    pub id: String,
    pub name: String,
    pub package_id: String,
    pub feed_id: String,
    pub acquisition_location: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeploymentAction {
    pub id: String,
    pub name: String,
    pub action_type: String,
    pub notes: Option<String>,
    pub is_disabled: bool,
    pub can_be_used_for_project_versioning: bool,
    pub is_required: bool,
    pub worker_pool_id: Option<String>,
    pub worker_pool_variable: Option<String>,
    pub environments: Vec<String>,
    pub excluded_environments: Vec<String>,
    pub channels: Vec<String>,
    pub tenant_tags: Vec<String>,
    pub condition: Option<String>,
    pub container: Option<Container>,
    pub packages: Vec<PackageReference>,
    pub properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeploymentStep {
    pub id: String,
    pub name: String,
    pub package_requirement: Option<String>,
    pub condition: Option<String>,
    pub start_trigger: Option<String>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub actions: Vec<DeploymentAction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeploymentProcess {
    pub id: String,
    pub project_id: String,
    pub steps: Vec<DeploymentStep>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SshEndpoint {
    pub host: String,
    pub port: i64,
    pub fingerprint: String,
    pub account_id: String,
    pub dot_net_core_platform: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct KubernetesAuthentication {
    pub authentication_type: String,
    pub account_id: Option<String>,
    pub client_certificate: Option<String>,
    pub cluster_name: Option<String>,
    pub cluster_resource_group: Option<String>,
    pub project: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
    pub impersonate_service_account: bool,
    pub service_account_emails: Option<String>,
    pub use_vm_service_account: bool,
    pub assume_role: bool,
    pub assumed_role_arn: Option<String>,
    pub assumed_role_session: Option<String>,
    pub assume_role_session_duration_seconds: Option<i64>,
    pub assume_role_external_id: Option<String>,
    pub use_instance_role: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct KubernetesEndpoint {
    pub cluster_url: Option<String>,
    pub cluster_certificate: Option<String>,
    pub namespace: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub skip_tls_verification: bool,
    pub default_worker_pool_id: Option<String>,
    pub container: Option<Container>,
    pub authentication: Option<KubernetesAuthentication>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OfflineDropEndpoint {
    pub applications_directory: String,
    pub octopus_working_directory: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TentacleEndpoint {
    pub uri: String,
    pub thumbprint: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CloudRegionEndpoint {
    pub default_worker_pool_id: Option<String>,
}

/// How the server talks to a deployment target
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "CommunicationStyle")]
pub enum Endpoint {
    Ssh(SshEndpoint),
    Kubernetes(KubernetesEndpoint),
    OfflineDrop(OfflineDropEndpoint),
    /// Listening tentacle
    TentaclePassive(TentacleEndpoint),
    /// Polling tentacle
    TentacleActive(TentacleEndpoint),
    #[serde(rename = "None")]
    CloudRegion(CloudRegionEndpoint),
    #[default]
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Machine {
    pub id: String,
    pub name: String,
    pub environment_ids: Vec<String>,
    pub roles: Vec<String>,
    pub tenant_ids: Vec<String>,
    pub tenant_tags: Vec<String>,
    pub tenanted_deployment_participation: Option<String>,
    pub is_disabled: bool,
    pub machine_policy_id: String,
    pub endpoint: Endpoint,
}

/// Accepts `true`, `"True"` and `null` alike
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}
