use anyhow::Result;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{
    AccountConverter, ConvertById, ConvertByParentId, EnvironmentConverter, FeedConverter,
    WorkerPoolConverter, population_file, should_export, split_list,
};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{TerraformVariable, resource_reference, variable_reference};
use crate::model::octopus::{DeploymentAction, DeploymentProcess, Project, PropertyValue};
use crate::registry::{ExportedResource, RenderContext, ResourceRegistry, VisitedSet};
use crate::sanitizer::{resource_name, sanitize_name};
use crate::scanner::{ReferenceScanner, rewrite_property};

const RESOURCE_TYPE: &str = "DeploymentProcesses";
const ACTION_RESOURCE_TYPE: &str = "Actions";
const TERRAFORM_TYPE: &str = "octopusdeploy_deployment_process";

// Properties that have dedicated attributes on the provider resource
const RUN_ON_SERVER: &str = "Octopus.Action.RunOnServer";
const ENABLED_FEATURES: &str = "Octopus.Action.EnabledFeatures";
const TARGET_ROLES: &str = "Octopus.Action.TargetRoles";

/// Exports the deployment process of a project
pub struct DeploymentProcessConverter {
    client: Arc<dyn SourceClient>,
}

impl DeploymentProcessConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    /// Export the process of a project that was already fetched.
    /// Version controlled projects keep their process in git and have none.
    pub fn export_for_project(
        &self,
        project: &Project,
        recursive: bool,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        let Some(process_id) = project.deployment_process_id.as_deref() else {
            return Ok(());
        };

        if !should_export(process_id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        let Some(process) = self
            .client
            .fetch_by_id::<DeploymentProcess>(RESOURCE_TYPE, process_id)?
        else {
            return Ok(());
        };

        if recursive {
            self.export_dependencies(&process, registry, visited)?;
        }

        self.register(process, &project.name, registry)
    }

    fn export_dependencies(
        &self,
        process: &DeploymentProcess,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        let accounts = AccountConverter::new(Arc::clone(&self.client));
        let feeds = FeedConverter::new(Arc::clone(&self.client));
        let worker_pools = WorkerPoolConverter::new(Arc::clone(&self.client));
        let environments = EnvironmentConverter::new(Arc::clone(&self.client));

        for action in process.steps.iter().flat_map(|step| &step.actions) {
            for value in action.properties.values() {
                let Some(text) = value.to_plain_text() else {
                    continue;
                };

                for id in ReferenceScanner::accounts().find_ids(&text) {
                    accounts.export_by_id(&id, registry, visited)?;
                }
                for id in ReferenceScanner::feeds().find_ids(&text) {
                    feeds.export_by_id(&id, registry, visited)?;
                }
            }

            for package in &action.packages {
                feeds.export_by_id(&package.feed_id, registry, visited)?;
            }

            if let Some(feed_id) = action.container.as_ref().and_then(|c| c.feed_id.as_deref()) {
                feeds.export_by_id(feed_id, registry, visited)?;
            }

            if let Some(pool_id) = action.worker_pool_id.as_deref() {
                worker_pools.export_by_id(pool_id, registry, visited)?;
            }

            for environment_id in action.environments.iter().chain(&action.excluded_environments) {
                environments.export_by_id(environment_id, registry, visited)?;
            }
        }

        Ok(())
    }

    fn register(
        &self,
        process: DeploymentProcess,
        project_name: &str,
        registry: &mut ResourceRegistry,
    ) -> Result<()> {
        let name = resource_name("deployment_process", project_name);

        // Channel rules and variable scopes point at individual actions
        let actions: Vec<ExportedResource> = process
            .steps
            .iter()
            .enumerate()
            .flat_map(|(i, step)| {
                step.actions.iter().enumerate().map(move |(j, action)| (i, j, action))
            })
            .filter(|(_, _, action)| !action.id.is_empty())
            .map(|(i, j, action)| {
                ExportedResource::reference_only(
                    action.id.clone(),
                    ACTION_RESOURCE_TYPE,
                    format!("${{{}.{}.step[{}].action[{}].id}}", TERRAFORM_TYPE, name, i, j),
                )
            })
            .collect();
        registry.add_resources(actions)?;

        registry.add_resource(ExportedResource::new(
            process.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(TERRAFORM_TYPE, &name),
            move |ctx| {
                let mut output = String::new();
                let mut steps = Vec::with_capacity(process.steps.len());

                for step in &process.steps {
                    let mut actions = Vec::with_capacity(step.actions.len());
                    for action in &step.actions {
                        actions.push(render_action(ctx, &name, action, &mut output)?);
                    }

                    let mut properties = step.properties.clone();
                    let target_roles = properties
                        .remove(TARGET_ROLES)
                        .and_then(|value| value.to_plain_text())
                        .map(|roles| split_list(&roles))
                        .unwrap_or_default();

                    steps.push(json!({
                        "name": step.name,
                        "package_requirement": step.package_requirement,
                        "condition": step.condition,
                        "start_trigger": step.start_trigger,
                        "target_roles": target_roles,
                        "properties": plain_properties(ctx, &properties),
                        "actions": actions,
                    }));
                }

                output.push_str(&ctx.hcl.render(
                    "deployment_process",
                    &json!({
                        "name": name,
                        "project_id": ctx.registry.get_resource("Projects", &process.project_id),
                        "steps": steps,
                    }),
                )?);

                Ok(output)
            },
        ))
    }
}

/// Template data for one action. Sensitive properties become terraform
/// variables whose declarations are appended to `declarations`.
fn render_action(
    ctx: &RenderContext<'_>,
    process_name: &str,
    action: &DeploymentAction,
    declarations: &mut String,
) -> Result<Value> {
    let mut properties = action.properties.clone();

    let run_on_server = properties
        .remove(RUN_ON_SERVER)
        .and_then(|value| value.to_plain_text())
        .map(|value| value.eq_ignore_ascii_case("true"))
        .unwrap_or(true);
    let features = properties
        .remove(ENABLED_FEATURES)
        .and_then(|value| value.to_plain_text())
        .map(|value| split_list(&value))
        .unwrap_or_default();
    properties.remove(TARGET_ROLES);

    let mut rendered = Map::new();
    for (key, value) in &properties {
        match value {
            PropertyValue::Sensitive(sensitive) if sensitive.has_value => {
                let variable = format!(
                    "{}_{}_{}",
                    process_name,
                    sanitize_name(&action.name),
                    sanitize_name(key)
                );
                declarations.push_str(&ctx.hcl.render_variable(&TerraformVariable::secret(
                    &variable,
                    format!("The secret {} of the action {}", key, action.name),
                ))?);
                rendered.insert(key.clone(), Value::String(variable_reference(&variable)));
            }
            _ => {
                if let Some(text) = value.to_plain_text() {
                    let text = rewrite_property(&text, &ReferenceScanner::all(), ctx.registry);
                    rendered.insert(key.clone(), Value::String(text));
                }
            }
        }
    }

    let packages: Vec<Value> = action
        .packages
        .iter()
        .map(|package| {
            json!({
                "name": package.name,
                "package_id": package.package_id,
                "acquisition_location": package.acquisition_location,
                "extract_during_deployment": package
                    .properties
                    .get("Extract")
                    .is_some_and(|extract| extract.eq_ignore_ascii_case("true")),
                "feed_id": ctx.registry.get_resource_pointer("Feeds", &package.feed_id),
                "properties": package.properties,
            })
        })
        .collect();

    let container = action
        .container
        .as_ref()
        .filter(|container| container.feed_id.is_some() || container.image.is_some())
        .map(|container| {
            json!({
                "feed_id": container
                    .feed_id
                    .as_deref()
                    .and_then(|id| ctx.registry.get_resource_pointer("Feeds", id)),
                "image": container.image,
            })
        });

    Ok(json!({
        "name": action.name,
        "action_type": action.action_type,
        "notes": action.notes,
        "is_disabled": action.is_disabled,
        "can_be_used_for_project_versioning": action.can_be_used_for_project_versioning,
        "is_required": action.is_required,
        "worker_pool_id": action
            .worker_pool_id
            .as_deref()
            .and_then(|id| ctx.registry.get_resource_pointer("WorkerPools", id)),
        "worker_pool_variable": action.worker_pool_variable,
        "run_on_server": run_on_server,
        "environments": ctx.registry.get_resources("Environments", &action.environments),
        "excluded_environments": ctx.registry.get_resources("Environments", &action.excluded_environments),
        "channels": ctx.registry.get_resources("Channels", &action.channels),
        "tenant_tags": action.tenant_tags,
        "condition": action.condition,
        "features": features,
        "properties": rendered,
        "container": container,
        "packages": packages,
    }))
}

/// Step properties carry no secrets, so sensitive entries are dropped
fn plain_properties(ctx: &RenderContext<'_>, properties: &BTreeMap<String, PropertyValue>) -> Value {
    let rendered: Map<String, Value> = properties
        .iter()
        .filter_map(|(key, value)| {
            value.to_plain_text().map(|text| {
                let text = rewrite_property(&text, &ReferenceScanner::all(), ctx.registry);
                (key.clone(), Value::String(text))
            })
        })
        .collect();

    Value::Object(rendered)
}

/// The process of a project
impl ConvertByParentId for DeploymentProcessConverter {
    fn export_by_parent_id(
        &self,
        parent_id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if parent_id.is_empty() {
            return Ok(());
        }

        match self.client.fetch_by_id::<Project>("Projects", parent_id)? {
            Some(project) => self.export_for_project(&project, true, registry, visited),
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
                    "Projects",
                    vec![json!({
                        "Id": "Projects-1",
                        "Name": "Web App",
                        "DeploymentProcessId": "deploymentprocess-Projects-1",
                    })],
                )
                .with_collection(
                    "DeploymentProcesses",
                    vec![json!({
                        "Id": "deploymentprocess-Projects-1",
                        "ProjectId": "Projects-1",
                        "Steps": [{
                            "Name": "Deploy",
                            "Condition": "Success",
                            "StartTrigger": "StartAfterPrevious",
                            "PackageRequirement": "LetOctopusDecide",
                            "Properties": { "Octopus.Action.TargetRoles": "web,api" },
                            "Actions": [{
                                "Id": "Actions-1",
                                "Name": "Run Script",
                                "ActionType": "Octopus.AwsRunScript",
                                "WorkerPoolId": "WorkerPools-1",
                                "Environments": ["Environments-1"],
                                "Properties": {
                                    "Octopus.Action.RunOnServer": "False",
                                    "Octopus.Action.EnabledFeatures": "Octopus.Features.JsonConfigurationVariables",
                                    "Octopus.Action.AwsAccount.Variable": "Accounts-1",
                                    "Octopus.Action.Script.ScriptBody": "echo ${HOME}",
                                    "Octopus.Action.Password": { "HasValue": true },
                                },
                                "Packages": [{
                                    "Id": "Packages-1",
                                    "Name": "app",
                                    "PackageId": "app",
                                    "FeedId": "Feeds-1",
                                    "AcquisitionLocation": "Server",
                                    "Properties": { "Extract": "True" },
                                }],
                            }],
                        }],
                    })],
                )
                .with_collection(
                    "Accounts",
                    vec![json!({ "Id": "Accounts-1", "Name": "AWS", "AccountType": "AmazonWebServicesAccount" })],
                )
                .with_collection(
                    "Feeds",
                    vec![json!({ "Id": "Feeds-1", "Name": "Docker", "FeedType": "Docker" })],
                )
                .with_collection(
                    "WorkerPools",
                    vec![json!({ "Id": "WorkerPools-1", "Name": "Linux", "WorkerPoolType": "StaticWorkerPool" })],
                )
                .with_collection("Environments", vec![json!({ "Id": "Environments-1", "Name": "Dev" })]),
        )
    }

    fn registry() -> ResourceRegistry {
        let mut registry = ResourceRegistry::new();
        registry
            .add_resource(ExportedResource::reference_only(
                "Projects-1",
                "Projects",
                "${octopusdeploy_project.project_Web_App.id}",
            ))
            .unwrap();
        registry
    }

    fn render_process(registry: &ResourceRegistry) -> String {
        let hcl = HclWriter::new().unwrap();
        let ctx = RenderContext { registry, hcl: &hcl };
        registry
            .get_all_resource(RESOURCE_TYPE)
            .next()
            .unwrap()
            .render(&ctx)
            .unwrap()
    }

    #[test]
    fn test_process_exports_what_its_actions_use() {
        let mut registry = registry();
        let mut visited = VisitedSet::new();

        DeploymentProcessConverter::new(client())
            .export_by_parent_id("Projects-1", &mut registry, &mut visited)
            .unwrap();

        for (resource_type, id) in [
            ("Accounts", "Accounts-1"),
            ("Feeds", "Feeds-1"),
            ("WorkerPools", "WorkerPools-1"),
            ("Environments", "Environments-1"),
        ] {
            assert!(registry.has_resource(id, resource_type), "{} {}", resource_type, id);
        }
        assert_eq!(
            registry.get_resource("Actions", "Actions-1"),
            "${octopusdeploy_deployment_process.deployment_process_Web_App.step[0].action[0].id}"
        );

        let output = render_process(&registry);
        assert!(registry.unresolved_references().is_empty());

        assert!(output.contains("project_id = \"${octopusdeploy_project.project_Web_App.id}\""));
        assert!(output.contains("target_roles = [\"web\", \"api\"]"));
        assert!(output.contains("run_on_server = false"));
        assert!(output.contains("features = [\"Octopus.Features.JsonConfigurationVariables\"]"));
        assert!(output.contains("worker_pool_id = \"${octopusdeploy_static_worker_pool.workerpool_Linux.id}\""));
        assert!(output.contains("environments = [\"${octopusdeploy_environment.environment_Dev.id}\"]"));
        assert!(output.contains(
            "\"Octopus.Action.AwsAccount.Variable\" = \"${octopusdeploy_aws_account.account_AWS.id}\""
        ));
        assert!(output.contains("\"Octopus.Action.Script.ScriptBody\" = \"echo $${HOME}\""));
        assert!(!output.contains("\"Octopus.Action.RunOnServer\""));
        assert!(output.contains("extract_during_deployment = true"));
        assert!(output.contains(
            "feed_id = \"${octopusdeploy_docker_container_registry.feed_Docker.id}\""
        ));
    }

    #[test]
    fn test_sensitive_properties_become_variables() {
        let mut registry = registry();
        let mut visited = VisitedSet::new();

        DeploymentProcessConverter::new(client())
            .export_by_parent_id("Projects-1", &mut registry, &mut visited)
            .unwrap();

        let output = render_process(&registry);
        let variable = "deployment_process_Web_App_Run_Script_Octopus_Action_Password";

        assert!(output.contains(&format!("variable \"{}\" {{", variable)));
        assert!(output.contains(&format!("\"Octopus.Action.Password\" = \"${{var.{}}}\"", variable)));
    }

    #[test]
    fn test_export_all_mode_leaves_ids_in_place() {
        let client = client();
        let mut registry = registry();
        let mut visited = VisitedSet::new();
        let project: Project = client.fetch_by_id("Projects", "Projects-1").unwrap().unwrap();

        DeploymentProcessConverter::new(client.clone())
            .export_for_project(&project, false, &mut registry, &mut visited)
            .unwrap();

        assert!(!client.requested("Accounts"));
        assert!(!registry.has_resource("Feeds-1", "Feeds"));

        let output = render_process(&registry);
        assert!(output.contains("\"Octopus.Action.AwsAccount.Variable\" = \"Accounts-1\""));
        assert!(!output.contains("worker_pool_id"));
    }

    #[test]
    fn test_project_without_process() {
        let client = Arc::new(MockSourceClient::new());
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();
        let project = Project {
            id: "Projects-2".to_string(),
            name: "Git".to_string(),
            is_version_controlled: true,
            ..Default::default()
        };

        DeploymentProcessConverter::new(client.clone())
            .export_for_project(&project, true, &mut registry, &mut visited)
            .unwrap();

        assert!(registry.is_empty());
        assert!(client.requests().is_empty());
    }
}
