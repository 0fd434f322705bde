use anyhow::Result;
use serde_json::{Value, json};
use std::sync::Arc;

use super::variable_set::VariableOwner;
use super::{
    ChannelConverter, ConvertAll, ConvertById, ConvertByParentId, DeploymentProcessConverter,
    GitCredentialConverter, LibraryVariableSetConverter, LifecycleConverter, ProjectGroupConverter,
    TenantConverter, VariableSetConverter, population_file, register_template_references,
    should_export, template_blocks,
};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{TerraformVariable, import_comment, resource_reference, variable_reference};
use crate::model::octopus::{PersistenceSettings, Project};
use crate::registry::{ExportedResource, RenderContext, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Projects";
const TEMPLATE_RESOURCE_TYPE: &str = "ProjectTemplates";
const TERRAFORM_TYPE: &str = "octopusdeploy_project";

pub(crate) fn terraform_name(project_name: &str) -> String {
    resource_name("project", project_name)
}

/// Owner details for the variables of a project
pub(crate) fn variable_owner(project: &Project) -> VariableOwner {
    let name = terraform_name(&project.name);
    VariableOwner {
        id: project.id.clone(),
        resource_type: RESOURCE_TYPE,
        reference: resource_reference(TERRAFORM_TYPE, &name),
        name,
    }
}

/// Git persistence blocks for version controlled projects, plus any secret
/// variable declarations they need
fn persistence_blocks(
    ctx: &RenderContext<'_>,
    name: &str,
    settings: &PersistenceSettings,
) -> Result<(String, Value)> {
    let common = json!({
        "url": settings.url,
        "base_path": settings.base_path,
        "default_branch": settings.default_branch,
        "protected_branches": settings.protected_branch_name_patterns,
    });
    let with = |extra: Value| -> Value {
        let mut block = common.clone();
        if let (Some(block), Some(extra)) = (block.as_object_mut(), extra.as_object()) {
            block.extend(extra.clone());
        }
        block
    };

    let credentials = &settings.credentials;
    match credentials.credential_type.as_str() {
        "Reference" => Ok((
            String::new(),
            json!({
                "git_library_persistence_settings": with(json!({
                    "git_credential_id": ctx
                        .registry
                        .get_resource("Git-Credentials", credentials.id.as_deref().unwrap_or_default()),
                })),
            }),
        )),
        "UsernamePassword" => {
            let password = format!("{}_git_password", name);
            let declaration = ctx.hcl.render_variable(&TerraformVariable::secret(
                &password,
                format!("The git password for the project {}", name),
            ))?;

            Ok((
                declaration,
                json!({
                    "git_username_password_persistence_settings": with(json!({
                        "username": credentials.username,
                        "password": variable_reference(&password),
                    })),
                }),
            ))
        }
        _ => Ok((
            String::new(),
            json!({ "git_anonymous_persistence_settings": common }),
        )),
    }
}

/// Exports projects along with everything they own: the deployment
/// process, channels and variables
pub struct ProjectConverter {
    client: Arc<dyn SourceClient>,
}

impl ProjectConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn export_dependencies(
        &self,
        project: &Project,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        let client = &self.client;

        ProjectGroupConverter::new(Arc::clone(client)).export_by_id(
            &project.project_group_id,
            registry,
            visited,
        )?;
        LifecycleConverter::new(Arc::clone(client)).export_by_id(
            &project.lifecycle_id,
            registry,
            visited,
        )?;

        let library_variable_sets = LibraryVariableSetConverter::new(Arc::clone(client));
        for id in &project.included_library_variable_set_ids {
            library_variable_sets.export_by_id(id, registry, visited)?;
        }

        if let Some(git_credential_id) = project
            .persistence_settings
            .as_ref()
            .filter(|settings| settings.credentials.credential_type == "Reference")
            .and_then(|settings| settings.credentials.id.as_deref())
        {
            GitCredentialConverter::new(Arc::clone(client)).export_by_id(
                git_credential_id,
                registry,
                visited,
            )?;
        }

        Ok(())
    }

    fn export(
        &self,
        project: Project,
        recursive: bool,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if recursive {
            self.export_dependencies(&project, registry, visited)?;
        }

        self.register(project.clone(), registry)?;

        DeploymentProcessConverter::new(Arc::clone(&self.client)).export_for_project(
            &project,
            recursive,
            registry,
            visited,
        )?;

        ChannelConverter::new(Arc::clone(&self.client)).export_for_project(
            &project,
            recursive,
            registry,
            visited,
        )?;

        VariableSetConverter::new(Arc::clone(&self.client)).export_for_owner(
            &project.variable_set_id,
            variable_owner(&project),
            recursive,
            registry,
            visited,
        )?;

        if recursive {
            TenantConverter::new(Arc::clone(&self.client)).export_by_parent_id(
                &project.id,
                registry,
                visited,
            )?;
        }

        Ok(())
    }

    fn register(&self, project: Project, registry: &mut ResourceRegistry) -> Result<()> {
        let name = terraform_name(&project.name);
        let reference = resource_reference(TERRAFORM_TYPE, &name);
        let base_url = self.client.space_base_url();

        register_template_references(
            registry,
            TEMPLATE_RESOURCE_TYPE,
            &reference,
            &project.templates,
        )?;

        registry.add_resource(ExportedResource::new(
            project.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            reference,
            move |ctx| {
                let (mut output, persistence) = match &project.persistence_settings {
                    Some(settings) if project.is_version_controlled => {
                        persistence_blocks(ctx, &name, settings)?
                    }
                    _ => (String::new(), json!({})),
                };

                let policy = &project.project_connectivity_policy;
                let mut data = json!({
                    "import_comment": import_comment(&base_url, RESOURCE_TYPE, &project.name, TERRAFORM_TYPE, &name),
                    "name": name,
                    "resource_name": project.name,
                    "auto_create_release": project.auto_create_release,
                    "default_guided_failure_mode": project.default_guided_failure_mode,
                    "default_to_skip_if_already_installed": project.default_to_skip_if_already_installed,
                    "description": project.description,
                    "discrete_channel_release": project.discrete_channel_release,
                    "is_disabled": project.is_disabled,
                    "is_version_controlled": project.is_version_controlled,
                    "lifecycle_id": ctx.registry.get_resource("Lifecycles", &project.lifecycle_id),
                    "project_group_id": ctx.registry.get_resource("ProjectGroups", &project.project_group_id),
                    "included_library_variable_sets": ctx.registry.get_resources(
                        "LibraryVariableSets",
                        &project.included_library_variable_set_ids,
                    ),
                    "tenanted_deployment_participation": project.tenanted_deployment_participation,
                    "templates": template_blocks(&project.templates),
                    "connectivity_policy": {
                        "allow_deployments_to_no_targets": policy.allow_deployments_to_no_targets,
                        "exclude_unhealthy_targets": policy.exclude_unhealthy_targets,
                        "skip_machine_behavior": policy.skip_machine_behavior,
                    },
                });

                if let (Some(data), Some(persistence)) = (data.as_object_mut(), persistence.as_object()) {
                    data.extend(persistence.clone());
                }

                output.push_str(&ctx.hcl.render("project", &data)?);
                Ok(output)
            },
        ))
    }
}

impl ConvertAll for ProjectConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for project in self.client.fetch_all::<Project>(RESOURCE_TYPE)? {
            if should_export(&project.id, RESOURCE_TYPE, registry, visited) {
                self.export(project, false, registry, visited)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for ProjectConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<Project>(RESOURCE_TYPE, id)? {
            Some(project) => self.export(project, true, registry, visited),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockSourceClient;
    use crate::hcl::HclWriter;

    fn project(extra: Value) -> Value {
        let mut project = json!({
            "Id": "Projects-1",
            "Name": "Test",
            "Description": "Test project",
            "ProjectGroupId": "ProjectGroups-1",
            "LifecycleId": "Lifecycles-1",
            "VariableSetId": "variableset-Projects-1",
            "DeploymentProcessId": "deploymentprocess-Projects-1",
            "DefaultGuidedFailureMode": "EnvironmentDefault",
            "TenantedDeploymentParticipation": "Untenanted",
            "Templates": [{ "Id": "Templates-1", "Name": "Tenant.Region" }],
            "ProjectConnectivityPolicy": { "SkipMachineBehavior": "SkipUnavailableMachines" },
        });
        if let (Some(project), Some(extra)) = (project.as_object_mut(), extra.as_object()) {
            project.extend(extra.clone());
        }
        project
    }

    fn client(project: Value) -> Arc<MockSourceClient> {
        Arc::new(
            MockSourceClient::new()
                .with_collection("Projects", vec![project])
                .with_collection("ProjectGroups", vec![json!({ "Id": "ProjectGroups-1", "Name": "Apps" })])
                .with_collection(
                    "Lifecycles",
                    vec![json!({
                        "Id": "Lifecycles-1",
                        "Name": "Simple",
                        "Phases": [{ "Name": "Dev", "AutomaticDeploymentTargets": ["Environments-1"] }],
                    })],
                )
                .with_collection("Environments", vec![json!({ "Id": "Environments-1", "Name": "Dev" })])
                .with_collection(
                    "DeploymentProcesses",
                    vec![json!({ "Id": "deploymentprocess-Projects-1", "ProjectId": "Projects-1" })],
                )
                .with_collection(
                    "Projects/Projects-1/channels",
                    vec![json!({ "Id": "Channels-1", "Name": "Default", "ProjectId": "Projects-1", "IsDefault": true })],
                )
                .with_collection(
                    "Variables",
                    vec![json!({
                        "Id": "variableset-Projects-1",
                        "OwnerId": "Projects-1",
                        "Variables": [{
                            "Id": "v1",
                            "Name": "Region",
                            "Value": "east",
                            "Type": "String",
                            "Scope": { "Environment": ["Environments-1"], "Channel": ["Channels-1"] },
                        }],
                    })],
                )
                .with_collection(
                    "Git-Credentials",
                    vec![json!({ "Id": "GitCredentials-1", "Name": "GitHub" })],
                ),
        )
    }

    #[test]
    fn test_project_export_resolves_every_reference() {
        let client = client(project(json!({})));
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        ProjectConverter::new(client.clone())
            .export_by_id("Projects-1", &mut registry, &mut visited)
            .unwrap();

        for (resource_type, id) in [
            ("Projects", "Projects-1"),
            ("ProjectGroups", "ProjectGroups-1"),
            ("Lifecycles", "Lifecycles-1"),
            ("Environments", "Environments-1"),
            ("DeploymentProcesses", "deploymentprocess-Projects-1"),
            ("Channels", "Channels-1"),
            ("Variables", "variableset-Projects-1"),
            ("ProjectTemplates", "Templates-1"),
        ] {
            assert!(registry.has_resource(id, resource_type), "{} {}", resource_type, id);
        }
        assert!(client.requested("Tenants?projectId=Projects-1"));

        let hcl = HclWriter::new().unwrap();
        let ctx = RenderContext { registry: &registry, hcl: &hcl };
        for resource in registry.resources() {
            resource.render(&ctx).unwrap();
        }
        assert!(registry.unresolved_references().is_empty());

        let output = registry
            .get_all_resource("Projects")
            .next()
            .unwrap()
            .render(&ctx)
            .unwrap();
        assert!(output.contains("resource \"octopusdeploy_project\" \"project_Test\" {"));
        assert!(output.contains("default_guided_failure_mode = \"EnvironmentDefault\""));
        assert!(output.contains("lifecycle_id = \"${octopusdeploy_lifecycle.lifecycle_Simple.id}\""));
        assert!(output.contains("skip_machine_behavior = \"SkipUnavailableMachines\""));
        assert!(!output.contains("persistence_settings"));
    }

    #[test]
    fn test_export_all_does_not_export_linked_entities() {
        let client = client(project(json!({})));
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        ProjectConverter::new(client.clone())
            .export_all(&mut registry, &mut visited)
            .unwrap();

        assert!(registry.has_resource("Projects-1", "Projects"));
        assert!(registry.has_resource("deploymentprocess-Projects-1", "DeploymentProcesses"));
        assert!(registry.has_resource("variableset-Projects-1", "Variables"));
        assert!(!registry.has_resource("Lifecycles-1", "Lifecycles"));
        assert!(!client.requested("Tenants"));
    }

    #[test]
    fn test_version_controlled_project() {
        let client = client(project(json!({
            "IsVersionControlled": true,
            "DeploymentProcessId": null,
            "PersistenceSettings": {
                "Type": "VersionControlled",
                "Url": "https://github.com/acme/app.git",
                "DefaultBranch": "main",
                "BasePath": ".octopus",
                "Credentials": { "Type": "Reference", "Id": "GitCredentials-1" },
            },
        })));
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        ProjectConverter::new(client.clone())
            .export_by_id("Projects-1", &mut registry, &mut visited)
            .unwrap();

        assert!(registry.has_resource("GitCredentials-1", "Git-Credentials"));
        assert_eq!(registry.get_all_resource("DeploymentProcesses").count(), 0);

        let hcl = HclWriter::new().unwrap();
        let ctx = RenderContext { registry: &registry, hcl: &hcl };
        let output = registry
            .get_all_resource("Projects")
            .next()
            .unwrap()
            .render(&ctx)
            .unwrap();

        assert!(output.contains("git_library_persistence_settings {"));
        assert!(output.contains("git_credential_id = \"${octopusdeploy_git_credential.gitcredential_GitHub.id}\""));
        assert!(output.contains("default_branch = \"main\""));
    }
}
