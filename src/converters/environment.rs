use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::{ConvertAll, ConvertById, population_file, should_export};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{import_comment, resource_reference};
use crate::model::octopus::Environment;
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Environments";
const TERRAFORM_TYPE: &str = "octopusdeploy_environment";

pub struct EnvironmentConverter {
    client: Arc<dyn SourceClient>,
}

impl EnvironmentConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn register(&self, environment: Environment, registry: &mut ResourceRegistry) -> Result<()> {
        let name = resource_name("environment", &environment.name);
        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            environment.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(TERRAFORM_TYPE, &name),
            move |ctx| {
                ctx.hcl.render(
                    "environment",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &environment.name, TERRAFORM_TYPE, &name),
                        "name": name,
                        "resource_name": environment.name,
                        "description": environment.description,
                        "allow_dynamic_infrastructure": environment.allow_dynamic_infrastructure,
                        "use_guided_failure": environment.use_guided_failure,
                        "sort_order": environment.sort_order,
                    }),
                )
            },
        ))
    }
}

impl ConvertAll for EnvironmentConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for environment in self.client.fetch_all::<Environment>(RESOURCE_TYPE)? {
            if should_export(&environment.id, RESOURCE_TYPE, registry, visited) {
                self.register(environment, registry)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for EnvironmentConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<Environment>(RESOURCE_TYPE, id)? {
            Some(environment) => self.register(environment, registry),
            None => Ok(()),
        }
    }
}
