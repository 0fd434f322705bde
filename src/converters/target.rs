use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use super::{
    AccountConverter, CertificateConverter, ConvertAll, ConvertById, EnvironmentConverter,
    FeedConverter, MachinePolicyConverter, WorkerPoolConverter, population_file, should_export,
};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{Block, Fields, import_comment, resource_reference};
use crate::model::octopus::{Endpoint, KubernetesAuthentication, KubernetesEndpoint, Machine};
use crate::registry::{ExportedResource, RenderContext, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Machines";

/// Provider resource type for each supported endpoint
fn terraform_type(endpoint: &Endpoint) -> Option<&'static str> {
    match endpoint {
        Endpoint::Ssh(_) => Some("octopusdeploy_ssh_connection_deployment_target"),
        Endpoint::Kubernetes(_) => Some("octopusdeploy_kubernetes_cluster_deployment_target"),
        Endpoint::OfflineDrop(_) => Some("octopusdeploy_offline_package_drop_deployment_target"),
        Endpoint::TentaclePassive(_) => Some("octopusdeploy_listening_tentacle_deployment_target"),
        Endpoint::TentacleActive(_) => Some("octopusdeploy_polling_tentacle_deployment_target"),
        Endpoint::CloudRegion(_) => Some("octopusdeploy_cloud_region_deployment_target"),
        Endpoint::Unsupported => None,
    }
}

/// Exports deployment targets
pub struct TargetConverter {
    client: Arc<dyn SourceClient>,
}

impl TargetConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn export(
        &self,
        target: Machine,
        recursive: bool,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        let Some(terraform_type) = terraform_type(&target.endpoint) else {
            warn!(target = %target.name, "deployment target type is not supported and was skipped");
            return Ok(());
        };

        if recursive {
            self.export_dependencies(&target, registry, visited)?;
        }

        self.register(target, terraform_type, registry)
    }

    fn export_dependencies(
        &self,
        target: &Machine,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        MachinePolicyConverter::new(Arc::clone(&self.client)).export_by_id(
            &target.machine_policy_id,
            registry,
            visited,
        )?;

        let environments = EnvironmentConverter::new(Arc::clone(&self.client));
        for environment_id in &target.environment_ids {
            environments.export_by_id(environment_id, registry, visited)?;
        }

        let mut accounts = Vec::new();
        let mut certificates = Vec::new();
        let mut worker_pools = Vec::new();
        let mut feeds = Vec::new();

        match &target.endpoint {
            Endpoint::Ssh(ssh) => accounts.push(ssh.account_id.as_str()),
            Endpoint::Kubernetes(k8s) => {
                certificates.extend(k8s.cluster_certificate.as_deref());
                worker_pools.extend(k8s.default_worker_pool_id.as_deref());
                feeds.extend(k8s.container.as_ref().and_then(|c| c.feed_id.as_deref()));
                if let Some(auth) = &k8s.authentication {
                    accounts.extend(auth.account_id.as_deref());
                    certificates.extend(auth.client_certificate.as_deref());
                }
            }
            Endpoint::CloudRegion(region) => {
                worker_pools.extend(region.default_worker_pool_id.as_deref())
            }
            _ => {}
        }

        let converter = AccountConverter::new(Arc::clone(&self.client));
        for id in accounts {
            converter.export_by_id(id, registry, visited)?;
        }
        let converter = CertificateConverter::new(Arc::clone(&self.client));
        for id in certificates {
            converter.export_by_id(id, registry, visited)?;
        }
        let converter = WorkerPoolConverter::new(Arc::clone(&self.client));
        for id in worker_pools {
            converter.export_by_id(id, registry, visited)?;
        }
        let converter = FeedConverter::new(Arc::clone(&self.client));
        for id in feeds {
            converter.export_by_id(id, registry, visited)?;
        }

        Ok(())
    }

    fn register(
        &self,
        target: Machine,
        terraform_type: &'static str,
        registry: &mut ResourceRegistry,
    ) -> Result<()> {
        let name = resource_name("target", &target.name);
        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            target.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(terraform_type, &name),
            move |ctx| {
                let (fields, blocks) = endpoint_attributes(ctx, &target.endpoint);

                ctx.hcl.render(
                    "target",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &target.name, terraform_type, &name),
                        "terraform_type": terraform_type,
                        "name": name,
                        "resource_name": target.name,
                        "environments": ctx.registry.get_resources("Environments", &target.environment_ids),
                        "roles": target.roles,
                        "tenant_tags": target.tenant_tags,
                        "tenants": ctx.registry.get_resources("Tenants", &target.tenant_ids),
                        "tenanted_deployment_participation": target.tenanted_deployment_participation,
                        "is_disabled": target.is_disabled,
                        "machine_policy_id": ctx
                            .registry
                            .get_resource_pointer("MachinePolicies", &target.machine_policy_id),
                        "fields": fields,
                        "blocks": blocks,
                    }),
                )
            },
        ))
    }
}

fn pointer(ctx: &RenderContext<'_>, resource_type: &str, id: &Option<String>) -> Option<String> {
    id.as_deref()
        .and_then(|id| ctx.registry.get_resource_pointer(resource_type, id))
}

/// Attributes and nested blocks specific to the kind of endpoint
fn endpoint_attributes(ctx: &RenderContext<'_>, endpoint: &Endpoint) -> (Fields, Vec<Block>) {
    match endpoint {
        Endpoint::Ssh(ssh) => (
            Fields::new()
                .with("host", &ssh.host)
                .with("port", ssh.port)
                .with("fingerprint", &ssh.fingerprint)
                .with("account_id", ctx.registry.get_resource("Accounts", &ssh.account_id))
                .with("dot_net_core_platform", &ssh.dot_net_core_platform),
            Vec::new(),
        ),
        Endpoint::Kubernetes(k8s) => kubernetes_attributes(ctx, k8s),
        Endpoint::OfflineDrop(offline) => (
            Fields::new()
                .with("applications_directory", &offline.applications_directory)
                .with("working_directory", &offline.octopus_working_directory),
            Vec::new(),
        ),
        Endpoint::TentaclePassive(tentacle) | Endpoint::TentacleActive(tentacle) => (
            Fields::new()
                .with("tentacle_url", &tentacle.uri)
                .with("thumbprint", &tentacle.thumbprint),
            Vec::new(),
        ),
        Endpoint::CloudRegion(region) => (
            Fields::new().with(
                "default_worker_pool_id",
                pointer(ctx, "WorkerPools", &region.default_worker_pool_id),
            ),
            Vec::new(),
        ),
        Endpoint::Unsupported => (Fields::new(), Vec::new()),
    }
}

fn kubernetes_attributes(ctx: &RenderContext<'_>, k8s: &KubernetesEndpoint) -> (Fields, Vec<Block>) {
    let fields = Fields::new()
        .with("cluster_url", &k8s.cluster_url)
        .with("cluster_certificate", pointer(ctx, "Certificates", &k8s.cluster_certificate))
        .with("namespace", k8s.namespace.as_deref().filter(|ns| !ns.is_empty()))
        .with("skip_tls_verification", k8s.skip_tls_verification)
        .with(
            "default_worker_pool_id",
            pointer(ctx, "WorkerPools", &k8s.default_worker_pool_id),
        );

    let mut blocks: Vec<Block> = k8s
        .authentication
        .as_ref()
        .and_then(|auth| authentication_block(ctx, auth))
        .into_iter()
        .collect();

    if let Some(container) = &k8s.container {
        if container.image.is_some() || container.feed_id.is_some() {
            blocks.push(Block::new(
                "container",
                Fields::new()
                    .with("feed_id", pointer(ctx, "Feeds", &container.feed_id))
                    .with("image", &container.image),
            ));
        }
    }

    (fields, blocks)
}

/// One block per authentication type. Unknown types produce none.
fn authentication_block(ctx: &RenderContext<'_>, auth: &KubernetesAuthentication) -> Option<Block> {
    let account_id = || {
        auth.account_id
            .as_deref()
            .map(|id| ctx.registry.get_resource("Accounts", id))
    };

    let block = match auth.authentication_type.as_str() {
        "KubernetesStandard" => Block::new("authentication", Fields::new().with("account_id", account_id())),
        "KubernetesAws" => Block::new(
            "aws_account_authentication",
            Fields::new()
                .with("account_id", account_id())
                .with("cluster_name", &auth.cluster_name)
                .with("assume_role", auth.assume_role)
                .with("assume_role_external_id", &auth.assume_role_external_id)
                .with("assume_role_session_duration", auth.assume_role_session_duration_seconds)
                .with("assumed_role_arn", &auth.assumed_role_arn)
                .with("assumed_role_session", &auth.assumed_role_session)
                .with("use_instance_role", auth.use_instance_role),
        ),
        "KubernetesAzure" => Block::new(
            "azure_service_principal_authentication",
            Fields::new()
                .with("account_id", account_id())
                .with("cluster_name", &auth.cluster_name)
                .with("cluster_resource_group", &auth.cluster_resource_group),
        ),
        "KubernetesGoogleCloud" => Block::new(
            "gcp_account_authentication",
            Fields::new()
                .with("account_id", account_id())
                .with("cluster_name", &auth.cluster_name)
                .with("project", &auth.project)
                .with("impersonate_service_account", auth.impersonate_service_account)
                .with("region", &auth.region)
                .with("service_account_emails", &auth.service_account_emails)
                .with("zone", &auth.zone)
                .with("use_vm_service_account", auth.use_vm_service_account),
        ),
        "KubernetesCertificate" => Block::new(
            "certificate_authentication",
            Fields::new().with(
                "client_certificate",
                pointer(ctx, "Certificates", &auth.client_certificate),
            ),
        ),
        other => {
            warn!(authentication_type = %other, "kubernetes authentication type is not supported");
            return None;
        }
    };

    Some(block)
}

impl ConvertAll for TargetConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for target in self.client.fetch_all::<Machine>(RESOURCE_TYPE)? {
            if should_export(&target.id, RESOURCE_TYPE, registry, visited) {
                self.export(target, false, registry, visited)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for TargetConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<Machine>(RESOURCE_TYPE, id)? {
            Some(target) => self.export(target, true, registry, visited),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockSourceClient;
    use crate::hcl::HclWriter;

    fn client() -> Arc<MockSourceClient> {
        Arc::new(
            MockSourceClient::new()
                .with_collection(
                    "Machines",
                    vec![
                        json!({
                            "Id": "Machines-1",
                            "Name": "web",
                            "EnvironmentIds": ["Environments-1"],
                            "Roles": ["web"],
                            "MachinePolicyId": "MachinePolicies-1",
                            "Endpoint": {
                                "CommunicationStyle": "Ssh",
                                "Host": "10.0.0.1",
                                "Port": 22,
                                "Fingerprint": "ab:cd",
                                "AccountId": "Accounts-1",
                            },
                        }),
                        json!({
                            "Id": "Machines-2",
                            "Name": "cluster",
                            "EnvironmentIds": ["Environments-1"],
                            "Roles": ["k8s"],
                            "MachinePolicyId": "MachinePolicies-1",
                            "Endpoint": {
                                "CommunicationStyle": "Kubernetes",
                                "ClusterUrl": "https://k8s.example",
                                "Namespace": "",
                                "SkipTlsVerification": "True",
                                "Authentication": {
                                    "AuthenticationType": "KubernetesAws",
                                    "AccountId": "Accounts-1",
                                    "ClusterName": "prod",
                                    "UseInstanceRole": false,
                                },
                                "Container": { "Image": "octopusdeploy/worker-tools", "FeedId": "Feeds-1" },
                            },
                        }),
                        json!({
                            "Id": "Machines-3",
                            "Name": "listener",
                            "Endpoint": {
                                "CommunicationStyle": "TentaclePassive",
                                "Uri": "https://listener:10933/",
                                "Thumbprint": "ABCDEF",
                            },
                        }),
                        json!({
                            "Id": "Machines-4",
                            "Name": "function",
                            "Endpoint": { "CommunicationStyle": "AzureWebApp" },
                        }),
                    ],
                )
                .with_collection(
                    "MachinePolicies",
                    vec![json!({ "Id": "MachinePolicies-1", "Name": "Custom" })],
                )
                .with_collection("Environments", vec![json!({ "Id": "Environments-1", "Name": "Dev" })])
                .with_collection(
                    "Accounts",
                    vec![json!({ "Id": "Accounts-1", "Name": "AWS", "AccountType": "AmazonWebServicesAccount" })],
                )
                .with_collection(
                    "Feeds",
                    vec![json!({ "Id": "Feeds-1", "Name": "Docker", "FeedType": "Docker" })],
                ),
        )
    }

    fn render(registry: &ResourceRegistry, id: &str) -> String {
        let hcl = HclWriter::new().unwrap();
        let ctx = RenderContext { registry, hcl: &hcl };
        registry
            .get_all_resource(RESOURCE_TYPE)
            .find(|r| r.source_id == id)
            .unwrap()
            .render(&ctx)
            .unwrap()
    }

    #[test]
    fn test_ssh_target_exports_dependencies() {
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        TargetConverter::new(client())
            .export_by_id("Machines-1", &mut registry, &mut visited)
            .unwrap();

        assert!(registry.has_resource("MachinePolicies-1", "MachinePolicies"));
        assert!(registry.has_resource("Environments-1", "Environments"));
        assert!(registry.has_resource("Accounts-1", "Accounts"));

        let output = render(&registry, "Machines-1");
        assert!(registry.unresolved_references().is_empty());
        assert!(output.contains(
            "resource \"octopusdeploy_ssh_connection_deployment_target\" \"target_web\" {"
        ));
        assert!(output.contains("host = \"10.0.0.1\""));
        assert!(output.contains("port = 22"));
        assert!(output.contains("account_id = \"${octopusdeploy_aws_account.account_AWS.id}\""));
        assert!(output.contains(
            "machine_policy_id = \"${octopusdeploy_machine_policy.machinepolicy_Custom.id}\""
        ));
    }

    #[test]
    fn test_kubernetes_target_blocks() {
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        TargetConverter::new(client())
            .export_by_id("Machines-2", &mut registry, &mut visited)
            .unwrap();

        assert!(registry.has_resource("Feeds-1", "Feeds"));

        let output = render(&registry, "Machines-2");
        assert!(output.contains("cluster_url = \"https://k8s.example\""));
        assert!(output.contains("skip_tls_verification = true"));
        assert!(!output.contains("namespace"));
        assert!(output.contains("aws_account_authentication {"));
        assert!(output.contains("cluster_name = \"prod\""));
        assert!(output.contains("container {"));
        assert!(output.contains("image = \"octopusdeploy/worker-tools\""));
        assert!(output.contains(
            "feed_id = \"${octopusdeploy_docker_container_registry.feed_Docker.id}\""
        ));
    }

    #[test]
    fn test_export_all_skips_unsupported_targets() {
        let client = client();
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        TargetConverter::new(client.clone())
            .export_all(&mut registry, &mut visited)
            .unwrap();

        assert_eq!(registry.len(), 3);
        assert!(!registry.has_resource("Machines-4", "Machines"));
        assert!(!client.requested("MachinePolicies"));

        let output = render(&registry, "Machines-3");
        assert!(output.contains(
            "resource \"octopusdeploy_listening_tentacle_deployment_target\" \"target_listener\" {"
        ));
        assert!(output.contains("tentacle_url = \"https://listener:10933/\""));
        assert!(!output.contains("machine_policy_id"));
    }
}
