use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::variable_set::VariableOwner;
use super::{
    ConvertAll, ConvertById, VariableSetConverter, population_file, register_template_references,
    should_export, template_blocks,
};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{escape_template_sequences, import_comment, resource_reference};
use crate::model::octopus::{LibraryVariableSet, VariableSet};
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "LibraryVariableSets";
const TEMPLATE_RESOURCE_TYPE: &str = "CommonTemplateMap";
const TERRAFORM_TYPE: &str = "octopusdeploy_library_variable_set";
const SCRIPT_MODULE_TERRAFORM_TYPE: &str = "octopusdeploy_script_module";
const SCRIPT_MODULE: &str = "ScriptModule";

fn terraform_name(set: &LibraryVariableSet) -> String {
    resource_name("library_variable_set", &set.name)
}

/// Owner details for the variables of a library variable set
pub(crate) fn variable_owner(set: &LibraryVariableSet) -> VariableOwner {
    let name = terraform_name(set);
    VariableOwner {
        id: set.id.clone(),
        resource_type: RESOURCE_TYPE,
        reference: resource_reference(TERRAFORM_TYPE, &name),
        name,
    }
}

/// Exports library variable sets, and script modules, which the source
/// server stores as library variable sets too
pub struct LibraryVariableSetConverter {
    client: Arc<dyn SourceClient>,
}

impl LibraryVariableSetConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn export(
        &self,
        set: LibraryVariableSet,
        recursive: bool,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if set.content_type == SCRIPT_MODULE {
            return self.register_script_module(set, registry);
        }

        VariableSetConverter::new(Arc::clone(&self.client)).export_for_owner(
            &set.variable_set_id,
            variable_owner(&set),
            recursive,
            registry,
            visited,
        )?;

        self.register(set, registry)
    }

    fn register(&self, set: LibraryVariableSet, registry: &mut ResourceRegistry) -> Result<()> {
        let name = terraform_name(&set);
        let reference = resource_reference(TERRAFORM_TYPE, &name);
        let base_url = self.client.space_base_url();

        register_template_references(registry, TEMPLATE_RESOURCE_TYPE, &reference, &set.templates)?;

        registry.add_resource(ExportedResource::new(
            set.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            reference,
            move |ctx| {
                ctx.hcl.render(
                    "library_variable_set",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &set.name, TERRAFORM_TYPE, &name),
                        "name": name,
                        "resource_name": set.name,
                        "description": set.description,
                        "templates": template_blocks(&set.templates),
                    }),
                )
            },
        ))
    }

    /// The script body and language live in the module's variable set
    fn register_script_module(
        &self,
        set: LibraryVariableSet,
        registry: &mut ResourceRegistry,
    ) -> Result<()> {
        let body_name = format!("Octopus.Script.Module[{}]", set.name);
        let syntax_name = format!("Octopus.Script.Module.Language[{}]", set.name);

        let mut body = String::new();
        let mut syntax = String::new();
        if let Some(variables) = self
            .client
            .fetch_by_id::<VariableSet>("Variables", &set.variable_set_id)?
        {
            for variable in variables.variables {
                if variable.name == body_name {
                    body = variable.value.unwrap_or_default();
                } else if variable.name == syntax_name {
                    syntax = variable.value.unwrap_or_default();
                }
            }
        }

        let name = terraform_name(&set);
        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            set.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(SCRIPT_MODULE_TERRAFORM_TYPE, &name),
            move |ctx| {
                ctx.hcl.render(
                    "script_module",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &set.name, SCRIPT_MODULE_TERRAFORM_TYPE, &name),
                        "name": name,
                        "resource_name": set.name,
                        "description": set.description,
                        "body": escape_template_sequences(&body),
                        "syntax": syntax,
                    }),
                )
            },
        ))
    }
}

impl ConvertAll for LibraryVariableSetConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for set in self.client.fetch_all::<LibraryVariableSet>(RESOURCE_TYPE)? {
            if should_export(&set.id, RESOURCE_TYPE, registry, visited) {
                self.export(set, false, registry, visited)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for LibraryVariableSetConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<LibraryVariableSet>(RESOURCE_TYPE, id)? {
            Some(set) => self.export(set, true, registry, visited),
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
                    "LibraryVariableSets",
                    vec![
                        json!({
                            "Id": "LibraryVariableSets-1",
                            "Name": "Shared",
                            "Description": "Test variable set",
                            "VariableSetId": "variableset-LibraryVariableSets-1",
                            "ContentType": "Variables",
                            "Templates": [
                                { "Id": "Templates-1", "Name": "Region", "DefaultValue": "east" },
                                { "Id": "Templates-2", "Name": "Secret", "DefaultValue": { "HasValue": true } },
                            ],
                        }),
                        json!({
                            "Id": "LibraryVariableSets-2",
                            "Name": "Utils",
                            "VariableSetId": "variableset-LibraryVariableSets-2",
                            "ContentType": "ScriptModule",
                        }),
                    ],
                )
                .with_collection(
                    "Variables",
                    vec![
                        json!({
                            "Id": "variableset-LibraryVariableSets-1",
                            "OwnerId": "LibraryVariableSets-1",
                            "Variables": [{ "Id": "v1", "Name": "Test.Variable", "Value": "test", "Type": "String" }],
                        }),
                        json!({
                            "Id": "variableset-LibraryVariableSets-2",
                            "OwnerId": "LibraryVariableSets-2",
                            "Variables": [
                                { "Name": "Octopus.Script.Module[Utils]", "Value": "echo \"${HOME}\"" },
                                { "Name": "Octopus.Script.Module.Language[Utils]", "Value": "Bash" },
                            ],
                        }),
                    ],
                ),
        )
    }

    #[test]
    fn test_library_variable_set_with_templates() {
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        LibraryVariableSetConverter::new(client())
            .export_by_id("LibraryVariableSets-1", &mut registry, &mut visited)
            .unwrap();

        assert_eq!(
            registry.get_resource("CommonTemplateMap", "Templates-2"),
            "${octopusdeploy_library_variable_set.library_variable_set_Shared.template[1].id}"
        );
        assert_eq!(registry.get_all_resource("Variables").count(), 1);

        let hcl = HclWriter::new().unwrap();
        let ctx = RenderContext { registry: &registry, hcl: &hcl };
        let output = registry
            .get_all_resource("LibraryVariableSets")
            .next()
            .unwrap()
            .render(&ctx)
            .unwrap();

        assert!(output.contains("description = \"Test variable set\""));
        assert!(output.contains("default_value = \"east\""));
        assert_eq!(output.matches("default_value").count(), 1);

        let variables = registry
            .get_all_resource("Variables")
            .next()
            .unwrap()
            .render(&ctx)
            .unwrap();
        assert!(variables.contains(
            "owner_id = \"${octopusdeploy_library_variable_set.library_variable_set_Shared.id}\""
        ));
    }

    #[test]
    fn test_script_module() {
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        LibraryVariableSetConverter::new(client())
            .export_all(&mut registry, &mut visited)
            .unwrap();

        assert_eq!(
            registry.get_resource("LibraryVariableSets", "LibraryVariableSets-2"),
            "${octopusdeploy_script_module.library_variable_set_Utils.id}"
        );
        // Script modules have no variables of their own to export
        assert_eq!(registry.get_all_resource("Variables").count(), 1);

        let hcl = HclWriter::new().unwrap();
        let ctx = RenderContext { registry: &registry, hcl: &hcl };
        let output = registry
            .get_all_resource("LibraryVariableSets")
            .find(|r| r.source_id == "LibraryVariableSets-2")
            .unwrap()
            .render(&ctx)
            .unwrap();

        assert!(output.contains("body = \"echo \\\"$${HOME}\\\"\""));
        assert!(output.contains("syntax = \"Bash\""));
    }
}
