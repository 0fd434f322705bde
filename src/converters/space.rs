use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;

use super::{ConvertAll, SPACE_POPULATION_DIR, creation_file, should_export};
use crate::client::SourceClient;
use crate::hcl::{TerraformVariable, resource_reference, variable_reference};
use crate::model::octopus::Space;
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Spaces";
const TERRAFORM_TYPE: &str = "octopusdeploy_space";

const PROVIDER_SOURCE: &str = "OctopusDeployLabs/octopusdeploy";
const PROVIDER_VERSION: &str = "0.12.0";

const SERVER_VARIABLE: &str = "octopus_server";
const API_KEY_VARIABLE: &str = "octopus_apikey";
const SPACE_ID_VARIABLE: &str = "octopus_space_id";

fn server_variable() -> TerraformVariable {
    TerraformVariable::plain(
        SERVER_VARIABLE,
        "The URL of the Octopus server e.g. https://myinstance.octopus.app.",
    )
}

fn api_key_variable() -> TerraformVariable {
    TerraformVariable::secret(
        API_KEY_VARIABLE,
        "The API key used to access the Octopus server. See https://octopus.com/docs/octopus-rest-api/how-to-create-an-api-key for details on creating an API key.",
    )
}

/// Register the provider block and the `terraform` block shared by a whole tree
fn register_provider(
    registry: &mut ResourceRegistry,
    provider_file: String,
    config_file: String,
    space_id: Option<String>,
) -> Result<()> {
    registry.add_resource(ExportedResource::new("", "", provider_file, "", move |ctx| {
        ctx.hcl.render(
            "provider",
            &json!({
                "address": variable_reference(SERVER_VARIABLE),
                "api_key": variable_reference(API_KEY_VARIABLE),
                "space_id": space_id,
            }),
        )
    }))?;

    registry.add_resource(ExportedResource::new("", "", config_file, "", |ctx| {
        ctx.hcl.render(
            "terraform_config",
            &json!({
                "source": PROVIDER_SOURCE,
                "version": PROVIDER_VERSION,
            }),
        )
    }))
}

/// Exports the space itself into the `space_creation` tree
pub struct SpaceConverter {
    client: Arc<dyn SourceClient>,
}

impl SpaceConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }
}

impl ConvertAll for SpaceConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        let space: Space =
            serde_json::from_value(self.client.get_space()?).context("Failed to parse space")?;

        if !should_export(&space.id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        let name = resource_name("octopus_space", &space.name);

        registry.add_resource(ExportedResource::new(
            space.id.clone(),
            RESOURCE_TYPE,
            creation_file("space.tf"),
            resource_reference(TERRAFORM_TYPE, &name),
            move |ctx| {
                ctx.hcl.render(
                    "space",
                    &json!({
                        "name": name,
                        "resource_name": space.name,
                        "description": space.description,
                        "is_default": space.is_default,
                        "is_task_queue_stopped": space.task_queue_stopped,
                        "space_managers_team_members": space.space_managers_team_members,
                        "space_managers_teams": space.space_managers_teams,
                    }),
                )
            },
        ))?;

        register_provider(
            registry,
            creation_file("provider.tf"),
            creation_file("config.tf"),
            None,
        )?;

        registry.add_resource(ExportedResource::new(
            "",
            "",
            creation_file("config.tf"),
            "",
            |ctx| {
                let mut output = ctx.hcl.render_variable(&server_variable())?;
                output.push_str(&ctx.hcl.render_variable(&api_key_variable())?);
                Ok(output)
            },
        ))
    }
}

/// Exports the provider, terraform block and shared variables of the
/// `space_population` tree
pub struct SpacePopulationConverter;

impl SpacePopulationConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpacePopulationConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvertAll for SpacePopulationConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        if !visited.enter("SpacePopulation", "common") {
            return Ok(());
        }

        let provider_file = format!("{}/provider.tf", SPACE_POPULATION_DIR);
        let config_file = format!("{}/config.tf", SPACE_POPULATION_DIR);

        register_provider(
            registry,
            provider_file,
            config_file.clone(),
            Some(variable_reference(SPACE_ID_VARIABLE)),
        )?;

        registry.add_resource(ExportedResource::new("", "", config_file, "", |ctx| {
            let mut output = ctx.hcl.render_variable(&server_variable())?;
            output.push_str(&ctx.hcl.render_variable(&api_key_variable())?);
            output.push_str(&ctx.hcl.render_variable(&TerraformVariable::plain(
                SPACE_ID_VARIABLE,
                "The ID of the Octopus space to populate.",
            ))?);
            Ok(output)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockSourceClient;
    use crate::hcl::HclWriter;
    use crate::registry::RenderContext;

    fn render_file(registry: &ResourceRegistry, file_name: &str) -> String {
        let hcl = HclWriter::new().unwrap();
        let ctx = RenderContext { registry, hcl: &hcl };

        registry
            .resources()
            .iter()
            .filter(|r| r.file_name.as_deref() == Some(file_name))
            .map(|r| r.render(&ctx).unwrap())
            .collect()
    }

    #[test]
    fn test_space_creation_tree() {
        let client = Arc::new(MockSourceClient::new().with_space(json!({
            "Id": "Spaces-2",
            "Name": "My Space",
            "SpaceManagersTeams": ["teams-administrators"],
        })));
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        SpaceConverter::new(client)
            .export_all(&mut registry, &mut visited)
            .unwrap();

        assert_eq!(
            registry.get_resource("Spaces", "Spaces-2"),
            "${octopusdeploy_space.octopus_space_My_Space.id}"
        );

        let space = render_file(&registry, "space_creation/space.tf");
        assert!(space.contains("resource \"octopusdeploy_space\" \"octopus_space_My_Space\" {"));
        assert!(space.contains("space_managers_teams = [\"teams-administrators\"]"));
        assert!(space.contains("value = octopusdeploy_space.octopus_space_My_Space.id"));

        let provider = render_file(&registry, "space_creation/provider.tf");
        assert!(provider.contains("address = \"${var.octopus_server}\""));
        assert!(!provider.contains("space_id"));
    }

    #[test]
    fn test_population_common_files_are_registered_once() {
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();
        let converter = SpacePopulationConverter::new();

        converter.export_all(&mut registry, &mut visited).unwrap();
        converter.export_all(&mut registry, &mut visited).unwrap();

        assert_eq!(registry.len(), 3);

        let provider = render_file(&registry, "space_population/provider.tf");
        assert!(provider.contains("space_id = \"${var.octopus_space_id}\""));

        let config = render_file(&registry, "space_population/config.tf");
        assert!(config.contains("source = \"OctopusDeployLabs/octopusdeploy\""));
        assert!(config.contains("variable \"octopus_apikey\" {"));
        assert!(config.contains("sensitive = true"));
        assert!(config.contains("variable \"octopus_space_id\" {"));
    }
}
