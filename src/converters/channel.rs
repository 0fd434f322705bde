use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::{
    ConvertById, ConvertByParentId, LifecycleConverter, population_file, register_data_lookup,
    should_export,
};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{import_comment, resource_reference};
use crate::model::octopus::{Channel, Project};
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Channels";
const TERRAFORM_TYPE: &str = "octopusdeploy_channel";
const DEFAULT_CHANNEL: &str = "Default";

/// Exports the channels of a project
pub struct ChannelConverter {
    client: Arc<dyn SourceClient>,
}

impl ChannelConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    /// Export every channel of a project that was already fetched
    pub fn export_for_project(
        &self,
        project: &Project,
        recursive: bool,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        let path = format!("Projects/{}/channels", project.id);

        for channel in self.client.fetch_all::<Channel>(&path)? {
            if !should_export(&channel.id, RESOURCE_TYPE, registry, visited) {
                continue;
            }

            if recursive {
                if let Some(lifecycle_id) = channel.lifecycle_id.as_deref() {
                    LifecycleConverter::new(Arc::clone(&self.client)).export_by_id(
                        lifecycle_id,
                        registry,
                        visited,
                    )?;
                }
            }

            self.register(channel, project, registry)?;
        }

        Ok(())
    }

    fn register(
        &self,
        channel: Channel,
        project: &Project,
        registry: &mut ResourceRegistry,
    ) -> Result<()> {
        // Every project has a channel called "Default", so names include the project
        let name = resource_name("channel", &format!("{}_{}", project.name, channel.name));

        if channel.name == DEFAULT_CHANNEL {
            return register_data_lookup(
                registry,
                &channel.id,
                RESOURCE_TYPE,
                "octopusdeploy_channels",
                "channels",
                name,
                json!({ "partial_name": channel.name }),
            );
        }

        let base_url = self.client.space_base_url();
        let deployment_process_id = project.deployment_process_id.clone().unwrap_or_default();

        registry.add_resource(ExportedResource::new(
            channel.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(TERRAFORM_TYPE, &name),
            move |ctx| {
                let rules: Vec<_> = channel
                    .rules
                    .iter()
                    .map(|rule| {
                        json!({
                            "action_packages": rule.action_packages.iter().map(|package| json!({
                                "deployment_action": package.deployment_action,
                                "package_reference": package.package_reference,
                            })).collect::<Vec<_>>(),
                            "tag": rule.tag,
                            "version_range": rule.version_range,
                        })
                    })
                    .collect();

                // Rules name steps and packages as plain text, so the process
                // has to exist before the channel is created
                let depends_on: Vec<String> = ctx
                    .registry
                    .get_resource_pointer("DeploymentProcesses", &deployment_process_id)
                    .into_iter()
                    .collect();

                ctx.hcl.render(
                    "channel",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &channel.name, TERRAFORM_TYPE, &name),
                        "name": name,
                        "resource_name": channel.name,
                        "description": channel.description,
                        "lifecycle_id": channel
                            .lifecycle_id
                            .as_deref()
                            .map(|id| ctx.registry.get_resource("Lifecycles", id)),
                        "project_id": ctx.registry.get_resource("Projects", &channel.project_id),
                        "is_default": channel.is_default,
                        "tenant_tags": channel.tenant_tags,
                        "rules": rules,
                        "depends_on": depends_on,
                    }),
                )
            },
        ))
    }
}

/// Channels of a project
impl ConvertByParentId for ChannelConverter {
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
    use crate::registry::RenderContext;

    fn client() -> Arc<MockSourceClient> {
        Arc::new(
            MockSourceClient::new()
                .with_collection(
                    "Projects",
                    vec![json!({
                        "Id": "Projects-1",
                        "Name": "Test",
                        "DeploymentProcessId": "deploymentprocess-Projects-1",
                    })],
                )
                .with_collection(
                    "Projects/Projects-1/channels",
                    vec![
                        json!({ "Id": "Channels-1", "Name": "Default", "ProjectId": "Projects-1", "IsDefault": true }),
                        json!({
                            "Id": "Channels-2",
                            "Name": "Test",
                            "Description": "Test channel",
                            "ProjectId": "Projects-1",
                            "LifecycleId": "Lifecycles-1",
                            "Rules": [{
                                "Tag": "^$",
                                "ActionPackages": [{ "DeploymentAction": "Test", "PackageReference": "test" }],
                            }],
                        }),
                    ],
                )
                .with_collection("Lifecycles", vec![json!({ "Id": "Lifecycles-1", "Name": "Simple" })]),
        )
    }

    fn registry() -> ResourceRegistry {
        let mut registry = ResourceRegistry::new();
        registry
            .add_resource(ExportedResource::reference_only(
                "Projects-1",
                "Projects",
                "${octopusdeploy_project.project_Test.id}",
            ))
            .unwrap();
        registry
            .add_resource(ExportedResource::reference_only(
                "deploymentprocess-Projects-1",
                "DeploymentProcesses",
                "${octopusdeploy_deployment_process.deployment_process_Test.id}",
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_channels_of_a_project() {
        let mut registry = registry();
        let mut visited = VisitedSet::new();

        ChannelConverter::new(client())
            .export_by_parent_id("Projects-1", &mut registry, &mut visited)
            .unwrap();

        assert_eq!(
            registry.get_resource("Channels", "Channels-1"),
            "${data.octopusdeploy_channels.channel_Test_Default.channels[0].id}"
        );
        assert!(registry.has_resource("Lifecycles-1", "Lifecycles"));

        let hcl = HclWriter::new().unwrap();
        let ctx = RenderContext { registry: &registry, hcl: &hcl };
        let output = registry
            .get_all_resource("Channels")
            .find(|r| r.source_id == "Channels-2")
            .unwrap()
            .render(&ctx)
            .unwrap();

        assert!(output.contains("resource \"octopusdeploy_channel\" \"channel_Test_Test\" {"));
        assert!(output.contains("lifecycle_id = \"${octopusdeploy_lifecycle.lifecycle_Simple.id}\""));
        assert!(output.contains("deployment_action = \"Test\""));
        assert!(output.contains("tag = \"^$\""));
        assert!(output.contains("depends_on = [octopusdeploy_deployment_process.deployment_process_Test]"));
    }

    #[test]
    fn test_channels_are_exported_once() {
        let mut registry = registry();
        let mut visited = VisitedSet::new();
        let converter = ChannelConverter::new(client());

        converter
            .export_by_parent_id("Projects-1", &mut registry, &mut visited)
            .unwrap();
        converter
            .export_by_parent_id("Projects-1", &mut registry, &mut visited)
            .unwrap();

        assert_eq!(registry.get_all_resource("Channels").count(), 2);
    }
}
