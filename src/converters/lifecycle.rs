use anyhow::Result;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{
    ConvertAll, ConvertById, EnvironmentConverter, population_file, register_data_lookup,
    should_export,
};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{import_comment, resource_reference};
use crate::model::octopus::{Lifecycle, RetentionPolicy};
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Lifecycles";
const TERRAFORM_TYPE: &str = "octopusdeploy_lifecycle";
const DEFAULT_LIFECYCLE: &str = "Default Lifecycle";

pub struct LifecycleConverter {
    client: Arc<dyn SourceClient>,
}

impl LifecycleConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn export_dependencies(
        &self,
        lifecycle: &Lifecycle,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        let environments = EnvironmentConverter::new(Arc::clone(&self.client));

        for phase in &lifecycle.phases {
            for id in phase
                .automatic_deployment_targets
                .iter()
                .chain(&phase.optional_deployment_targets)
            {
                environments.export_by_id(id, registry, visited)?;
            }
        }

        Ok(())
    }

    fn register(&self, lifecycle: Lifecycle, registry: &mut ResourceRegistry) -> Result<()> {
        let name = resource_name("lifecycle", &lifecycle.name);

        if lifecycle.name == DEFAULT_LIFECYCLE {
            return register_data_lookup(
                registry,
                &lifecycle.id,
                RESOURCE_TYPE,
                "octopusdeploy_lifecycles",
                "lifecycles",
                name,
                json!({ "partial_name": lifecycle.name }),
            );
        }

        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            lifecycle.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(TERRAFORM_TYPE, &name),
            move |ctx| {
                let phases: Vec<Value> = lifecycle
                    .phases
                    .iter()
                    .map(|phase| {
                        json!({
                            "name": phase.name,
                            "automatic_deployment_targets": ctx.registry.get_resources("Environments", &phase.automatic_deployment_targets),
                            "optional_deployment_targets": ctx.registry.get_resources("Environments", &phase.optional_deployment_targets),
                            "minimum_environments_before_promotion": phase.minimum_environments_before_promotion,
                            "is_optional_phase": phase.is_optional_phase,
                            "release_retention_policy": retention_policy(&phase.release_retention_policy),
                            "tentacle_retention_policy": retention_policy(&phase.tentacle_retention_policy),
                        })
                    })
                    .collect();

                ctx.hcl.render(
                    "lifecycle",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &lifecycle.name, TERRAFORM_TYPE, &name),
                        "name": name,
                        "resource_name": lifecycle.name,
                        "description": lifecycle.description,
                        "release_retention_policy": retention_policy(&lifecycle.release_retention_policy),
                        "tentacle_retention_policy": retention_policy(&lifecycle.tentacle_retention_policy),
                        "phases": phases,
                    }),
                )
            },
        ))
    }
}

fn retention_policy(policy: &Option<RetentionPolicy>) -> Value {
    match policy {
        Some(policy) => json!({
            "unit": policy.unit,
            "quantity_to_keep": policy.quantity_to_keep,
            "should_keep_forever": policy.should_keep_forever,
        }),
        None => Value::Null,
    }
}

impl ConvertAll for LifecycleConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for lifecycle in self.client.fetch_all::<Lifecycle>(RESOURCE_TYPE)? {
            if should_export(&lifecycle.id, RESOURCE_TYPE, registry, visited) {
                self.register(lifecycle, registry)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for LifecycleConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        let Some(lifecycle) = self.client.fetch_by_id::<Lifecycle>(RESOURCE_TYPE, id)? else {
            return Ok(());
        };

        self.export_dependencies(&lifecycle, registry, visited)?;
        self.register(lifecycle, registry)
    }
}
