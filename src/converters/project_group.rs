use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::{ConvertAll, ConvertById, population_file, register_data_lookup, should_export};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{import_comment, resource_reference};
use crate::model::octopus::ProjectGroup;
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "ProjectGroups";
const TERRAFORM_TYPE: &str = "octopusdeploy_project_group";
const DEFAULT_GROUP: &str = "Default Project Group";

pub struct ProjectGroupConverter {
    client: Arc<dyn SourceClient>,
}

impl ProjectGroupConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn register(&self, group: ProjectGroup, registry: &mut ResourceRegistry) -> Result<()> {
        let name = resource_name("project_group", &group.name);

        // Every space ships with the default group
        if group.name == DEFAULT_GROUP {
            return register_data_lookup(
                registry,
                &group.id,
                RESOURCE_TYPE,
                "octopusdeploy_project_groups",
                "project_groups",
                name,
                json!({ "partial_name": group.name }),
            );
        }

        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            group.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(TERRAFORM_TYPE, &name),
            move |ctx| {
                ctx.hcl.render(
                    "project_group",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &group.name, TERRAFORM_TYPE, &name),
                        "name": name,
                        "resource_name": group.name,
                        "description": group.description,
                    }),
                )
            },
        ))
    }
}

impl ConvertAll for ProjectGroupConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for group in self.client.fetch_all::<ProjectGroup>(RESOURCE_TYPE)? {
            if should_export(&group.id, RESOURCE_TYPE, registry, visited) {
                self.register(group, registry)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for ProjectGroupConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<ProjectGroup>(RESOURCE_TYPE, id)? {
            Some(group) => self.register(group, registry),
            None => Ok(()),
        }
    }
}
