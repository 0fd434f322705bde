use anyhow::Result;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::{
    AccountConverter, CertificateConverter, ConvertById, ConvertByParentId, EnvironmentConverter,
    TargetConverter, WorkerPoolConverter, library_variable_set, population_file, project,
    should_export,
};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{TerraformVariable, escape_template_sequences, variable_reference};
use crate::model::octopus::{LibraryVariableSet, Project, Variable, VariableSet};
use crate::registry::{ExportedResource, RenderContext, ResourceRegistry, VisitedSet};
use crate::sanitizer::sanitize_name;

const RESOURCE_TYPE: &str = "Variables";

/// The project or library variable set a variable set belongs to
#[derive(Debug, Clone)]
pub struct VariableOwner {
    pub id: String,
    pub resource_type: &'static str,
    /// Terraform name of the owner, used to prefix variable names
    pub name: String,
    /// Reference expression of the owner
    pub reference: String,
}

/// Namespace a variable's value points into, for variable types that hold an id
fn value_namespace(variable_type: &str) -> Option<&'static str> {
    match variable_type {
        "AmazonWebServicesAccount" | "AzureAccount" | "GoogleCloudAccount" => Some("Accounts"),
        "Certificate" => Some("Certificates"),
        "WorkerPool" => Some("WorkerPools"),
        _ => None,
    }
}

fn render_variable(
    ctx: &RenderContext<'_>,
    owner: &VariableOwner,
    name: &str,
    variable: &Variable,
) -> Result<String> {
    let registry = ctx.registry;

    // An emptied scope list would apply the variable everywhere
    let scope = if variable.scope.is_empty() {
        Value::Null
    } else {
        let scope = &variable.scope;
        let (Some(environments), Some(machines), Some(channels), Some(actions)) = (
            registry.get_restricting_resources("Environments", &scope.environment),
            registry.get_restricting_resources("Machines", &scope.machine),
            registry.get_restricting_resources("Channels", &scope.channel),
            registry.get_restricting_resources("Actions", &scope.action),
        ) else {
            warn!(
                variable = %variable.name,
                owner = %owner.name,
                "variable is scoped only to resources outside the export, skipping it"
            );
            return Ok(String::new());
        };

        json!({
            "environments": environments,
            "roles": scope.role,
            "machines": machines,
            "channels": channels,
            "tenant_tags": scope.tenant_tag,
            "actions": actions,
        })
    };

    let mut output = String::new();

    let (value, sensitive_value) = if variable.is_sensitive {
        let secret = format!("{}_sensitive_value", name);
        output.push_str(&ctx.hcl.render_variable(&TerraformVariable::secret(
            &secret,
            format!("The secret variable value associated with the variable {}", variable.name),
        ))?);
        (None, Some(variable_reference(&secret)))
    } else {
        let value = match (value_namespace(&variable.variable_type), &variable.value) {
            (Some(namespace), Some(id)) => Some(registry.get_resource(namespace, id)),
            (None, Some(text)) => Some(escape_template_sequences(text)),
            (_, None) => None,
        };
        (value, None)
    };

    let prompt = variable.prompt.as_ref().map(|prompt| {
        json!({
            "label": prompt.label,
            "description": prompt.description,
            "is_required": prompt.required,
        })
    });

    output.push_str(&ctx.hcl.render(
        "project_variable",
        &json!({
            "name": name,
            "owner_id": registry.get_resource(owner.resource_type, &owner.id),
            "resource_name": variable.name,
            "variable_type": variable.variable_type,
            "value": value,
            "sensitive_value": sensitive_value,
            "is_sensitive": variable.is_sensitive,
            "description": variable.description,
            "scope": scope,
            "prompt": prompt,
        }),
    )?);

    Ok(output)
}

/// Exports the variables of a project or library variable set.
///
/// All variables of one set are rendered by a single descriptor into the
/// owner's `_variables` file.
pub struct VariableSetConverter {
    client: Arc<dyn SourceClient>,
}

impl VariableSetConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    /// Export a variable set whose owner is already known
    pub fn export_for_owner(
        &self,
        variable_set_id: &str,
        owner: VariableOwner,
        recursive: bool,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(variable_set_id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self
            .client
            .fetch_by_id::<VariableSet>(RESOURCE_TYPE, variable_set_id)?
        {
            Some(variable_set) => self.export(variable_set, owner, recursive, registry, visited),
            None => Ok(()),
        }
    }

    fn export(
        &self,
        variable_set: VariableSet,
        owner: VariableOwner,
        recursive: bool,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if recursive {
            self.export_dependencies(&variable_set, registry, visited)?;
        }

        self.register(variable_set, owner, registry)
    }

    fn export_dependencies(
        &self,
        variable_set: &VariableSet,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        let environments = EnvironmentConverter::new(Arc::clone(&self.client));
        let accounts = AccountConverter::new(Arc::clone(&self.client));
        let certificates = CertificateConverter::new(Arc::clone(&self.client));
        let worker_pools = WorkerPoolConverter::new(Arc::clone(&self.client));
        let targets = TargetConverter::new(Arc::clone(&self.client));

        for variable in &variable_set.variables {
            for environment_id in &variable.scope.environment {
                environments.export_by_id(environment_id, registry, visited)?;
            }
            for machine_id in &variable.scope.machine {
                targets.export_by_id(machine_id, registry, visited)?;
            }

            let Some(id) = variable.value.as_deref() else {
                continue;
            };

            match value_namespace(&variable.variable_type) {
                Some("Accounts") => accounts.export_by_id(id, registry, visited)?,
                Some("Certificates") => certificates.export_by_id(id, registry, visited)?,
                Some("WorkerPools") => worker_pools.export_by_id(id, registry, visited)?,
                _ => {}
            }
        }

        Ok(())
    }

    fn register(
        &self,
        variable_set: VariableSet,
        owner: VariableOwner,
        registry: &mut ResourceRegistry,
    ) -> Result<()> {
        let mut used: HashMap<String, usize> = HashMap::new();
        let variables: Vec<(String, Variable)> = variable_set
            .variables
            .into_iter()
            .map(|variable| {
                let base = format!("{}_{}", owner.name, sanitize_name(&variable.name));
                let count = used.entry(base.clone()).or_insert(0);
                *count += 1;

                let name = if *count == 1 {
                    base
                } else {
                    format!("{}_{}", base, count)
                };
                (name, variable)
            })
            .collect();

        let file_name = population_file(&format!("{}_variables", owner.name));
        let reference = owner.reference.clone();

        registry.add_resource(ExportedResource::new(
            variable_set.id,
            RESOURCE_TYPE,
            file_name,
            reference,
            move |ctx| {
                let mut output = String::new();
                for (name, variable) in &variables {
                    output.push_str(&render_variable(ctx, &owner, name, variable)?);
                }
                Ok(output)
            },
        ))
    }

    /// Work out the owner of a variable set from the owner id
    fn find_owner(&self, owner_id: &str) -> Result<Option<(VariableOwner, String)>> {
        if owner_id.starts_with("Projects-") {
            return Ok(self
                .client
                .fetch_by_id::<Project>("Projects", owner_id)?
                .map(|project| (project::variable_owner(&project), project.variable_set_id)));
        }

        if owner_id.starts_with("LibraryVariableSets-") {
            return Ok(self
                .client
                .fetch_by_id::<LibraryVariableSet>("LibraryVariableSets", owner_id)?
                .map(|set| (library_variable_set::variable_owner(&set), set.variable_set_id)));
        }

        warn!(owner_id, "variable set owner is not a project or library variable set");
        Ok(None)
    }
}

impl ConvertById for VariableSetConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        let Some(variable_set) = self.client.fetch_by_id::<VariableSet>(RESOURCE_TYPE, id)? else {
            return Ok(());
        };

        match self.find_owner(&variable_set.owner_id)? {
            Some((owner, _)) => self.export(variable_set, owner, true, registry, visited),
            None => Ok(()),
        }
    }
}

/// The variable set of a project or library variable set
impl ConvertByParentId for VariableSetConverter {
    fn export_by_parent_id(
        &self,
        parent_id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if parent_id.is_empty() {
            return Ok(());
        }

        match self.find_owner(parent_id)? {
            Some((owner, variable_set_id)) => {
                self.export_for_owner(&variable_set_id, owner, true, registry, visited)
            }
            None => Ok(()),
        }
    }
}
