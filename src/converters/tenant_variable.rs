use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::{ConvertByParentId, population_file};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{TerraformVariable, resource_reference, variable_reference};
use crate::model::octopus::{PropertyValue, TenantVariables};
use crate::registry::{ExportedResource, RenderContext, ResourceRegistry, VisitedSet};
use crate::sanitizer::sanitize_name;

const RESOURCE_TYPE: &str = "TenantVariables";
const PROJECT_TERRAFORM_TYPE: &str = "octopusdeploy_tenant_project_variable";
const COMMON_TERRAFORM_TYPE: &str = "octopusdeploy_tenant_common_variable";

/// Value assigned to a template, or `None` when there is nothing to export
enum TenantValue {
    Plain(String),
    Secret,
}

impl TenantValue {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Sensitive(sensitive) if sensitive.has_value => Some(TenantValue::Secret),
            PropertyValue::Sensitive(_) => None,
            other => other.to_plain_text().map(TenantValue::Plain),
        }
    }

    /// The secret variable declaration, if any, followed by the value expression
    fn render(&self, ctx: &RenderContext<'_>, name: &str, tenant_name: &str) -> Result<(String, String)> {
        match self {
            TenantValue::Plain(text) => Ok((String::new(), text.clone())),
            TenantValue::Secret => {
                let variable = format!("{}_value", name);
                let declaration = ctx.hcl.render_variable(&TerraformVariable::secret(
                    &variable,
                    format!("The secret variable value associated with the tenant {}", tenant_name),
                ))?;
                Ok((declaration, variable_reference(&variable)))
            }
        }
    }
}

/// Exports the values a tenant assigns to project and library variable set templates.
///
/// Values are only rendered when the tenant, the project or library variable
/// set and (for project values) the environment were exported too. In single
/// project mode a tenant usually links to projects outside the export.
pub struct TenantVariableConverter {
    client: Arc<dyn SourceClient>,
}

impl TenantVariableConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn register(&self, variables: TenantVariables, registry: &mut ResourceRegistry) -> Result<()> {
        let mut index = 0;

        for project in variables.project_variables.values() {
            for (environment_id, values) in &project.variables {
                for (template_id, value) in values {
                    let Some(value) = TenantValue::from_property(value) else {
                        continue;
                    };

                    index += 1;
                    let name = format!(
                        "tenantprojectvariable_{}_{}",
                        index,
                        sanitize_name(&variables.tenant_name)
                    );
                    let source_id = format!(
                        "{}:{}:{}:{}",
                        variables.tenant_id, project.project_id, environment_id, template_id
                    );

                    let tenant_id = variables.tenant_id.clone();
                    let tenant_name = variables.tenant_name.clone();
                    let project_id = project.project_id.clone();
                    let environment_id = environment_id.clone();
                    let template_id = template_id.clone();

                    registry.add_resource(ExportedResource::new(
                        source_id,
                        RESOURCE_TYPE,
                        population_file(&name),
                        resource_reference(PROJECT_TERRAFORM_TYPE, &name),
                        move |ctx| {
                            let registry = ctx.registry;
                            let (Some(tenant), Some(project), Some(environment)) = (
                                registry.get_resource_pointer("Tenants", &tenant_id),
                                registry.get_resource_pointer("Projects", &project_id),
                                registry.get_resource_pointer("Environments", &environment_id),
                            ) else {
                                return Ok(String::new());
                            };

                            let (mut output, value) = value.render(ctx, &name, &tenant_name)?;
                            output.push_str(&ctx.hcl.render(
                                "tenant_project_variable",
                                &json!({
                                    "name": name,
                                    "environment_id": environment,
                                    "project_id": project,
                                    "template_id": registry.get_resource("ProjectTemplates", &template_id),
                                    "tenant_id": tenant,
                                    "value": value,
                                }),
                            )?);
                            Ok(output)
                        },
                    ))?;
                }
            }
        }

        for library in variables.library_variables.values() {
            for (template_id, value) in &library.variables {
                let Some(value) = TenantValue::from_property(value) else {
                    continue;
                };

                index += 1;
                let name = format!(
                    "tenantcommonvariable_{}_{}",
                    index,
                    sanitize_name(&variables.tenant_name)
                );
                let source_id = format!(
                    "{}:{}:{}",
                    variables.tenant_id, library.library_variable_set_id, template_id
                );

                let tenant_id = variables.tenant_id.clone();
                let tenant_name = variables.tenant_name.clone();
                let library_variable_set_id = library.library_variable_set_id.clone();
                let template_id = template_id.clone();

                registry.add_resource(ExportedResource::new(
                    source_id,
                    RESOURCE_TYPE,
                    population_file(&name),
                    resource_reference(COMMON_TERRAFORM_TYPE, &name),
                    move |ctx| {
                        let registry = ctx.registry;
                        let (Some(tenant), Some(library_variable_set)) = (
                            registry.get_resource_pointer("Tenants", &tenant_id),
                            registry.get_resource_pointer("LibraryVariableSets", &library_variable_set_id),
                        ) else {
                            return Ok(String::new());
                        };

                        let (mut output, value) = value.render(ctx, &name, &tenant_name)?;
                        output.push_str(&ctx.hcl.render(
                            "tenant_common_variable",
                            &json!({
                                "name": name,
                                "library_variable_set_id": library_variable_set,
                                "template_id": registry.get_resource("CommonTemplateMap", &template_id),
                                "tenant_id": tenant,
                                "value": value,
                            }),
                        )?);
                        Ok(output)
                    },
                ))?;
            }
        }

        Ok(())
    }
}

impl ConvertByParentId for TenantVariableConverter {
    fn export_by_parent_id(
        &self,
        parent_id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if parent_id.is_empty() || !visited.enter(RESOURCE_TYPE, parent_id) {
            return Ok(());
        }

        let path = format!("Tenants/{}/Variables", parent_id);
        match self.client.fetch::<TenantVariables>(&path)? {
            Some(variables) => self.register(variables, registry),
            None => Ok(()),
        }
    }
}
