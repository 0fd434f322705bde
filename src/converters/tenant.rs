use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::{
    ConvertAll, ConvertById, ConvertByParentId, EnvironmentConverter, TagSetConverter,
    TenantVariableConverter, population_file, should_export,
};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{import_comment, resource_reference};
use crate::model::octopus::Tenant;
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Tenants";
const TERRAFORM_TYPE: &str = "octopusdeploy_tenant";

pub struct TenantConverter {
    client: Arc<dyn SourceClient>,
}

impl TenantConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn export(
        &self,
        tenant: Tenant,
        recursive: bool,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        // Terraform cannot infer the link between a tenant and the tags it
        // uses, so the tag sets and tags become explicit dependencies
        let tags = TagSetConverter::new(Arc::clone(&self.client)).find_tags(&tenant.tenant_tags)?;

        let mut tag_set_ids: Vec<String> = Vec::new();
        let mut tag_ids: Vec<String> = Vec::new();
        for tag in tags {
            if !tag_set_ids.contains(&tag.tag_set_id) {
                tag_set_ids.push(tag.tag_set_id);
            }
            if !tag_ids.contains(&tag.tag_id) {
                tag_ids.push(tag.tag_id);
            }
        }

        if recursive {
            let tag_sets = TagSetConverter::new(Arc::clone(&self.client));
            for tag_set_id in &tag_set_ids {
                tag_sets.export_by_id(tag_set_id, registry, visited)?;
            }

            let environments = EnvironmentConverter::new(Arc::clone(&self.client));
            for environment_id in tenant.project_environments.values().flatten() {
                environments.export_by_id(environment_id, registry, visited)?;
            }
        }

        let tenant_id = tenant.id.clone();
        self.register(tenant, tag_set_ids, tag_ids, registry)?;

        // Values are owned by the tenant, so they are exported in both modes
        TenantVariableConverter::new(Arc::clone(&self.client))
            .export_by_parent_id(&tenant_id, registry, visited)
    }

    fn register(
        &self,
        tenant: Tenant,
        tag_set_ids: Vec<String>,
        tag_ids: Vec<String>,
        registry: &mut ResourceRegistry,
    ) -> Result<()> {
        let name = resource_name("tenant", &tenant.name);
        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            tenant.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(TERRAFORM_TYPE, &name),
            move |ctx| {
                // Projects outside the export are dropped rather than left dangling
                let project_environments: Vec<_> = tenant
                    .project_environments
                    .iter()
                    .filter_map(|(project_id, environment_ids)| {
                        ctx.registry
                            .get_resource_pointer("Projects", project_id)
                            .map(|project| {
                                json!({
                                    "project_id": project,
                                    "environments": ctx
                                        .registry
                                        .get_restricting_resources("Environments", environment_ids)
                                        .unwrap_or_default(),
                                })
                            })
                    })
                    .collect();

                let depends_on: Vec<String> = ctx
                    .registry
                    .get_resources("TagSets", &tag_set_ids)
                    .into_iter()
                    .chain(ctx.registry.get_resources("Tags", &tag_ids))
                    .collect();

                ctx.hcl.render(
                    "tenant",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &tenant.name, TERRAFORM_TYPE, &name),
                        "name": name,
                        "resource_name": tenant.name,
                        "description": tenant.description,
                        "tenant_tags": tenant.tenant_tags,
                        "project_environments": project_environments,
                        "depends_on": depends_on,
                    }),
                )
            },
        ))
    }
}

impl ConvertAll for TenantConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for tenant in self.client.fetch_all::<Tenant>(RESOURCE_TYPE)? {
            if should_export(&tenant.id, RESOURCE_TYPE, registry, visited) {
                self.export(tenant, false, registry, visited)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for TenantConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<Tenant>(RESOURCE_TYPE, id)? {
            Some(tenant) => self.export(tenant, true, registry, visited),
            None => Ok(()),
        }
    }
}

/// Tenants linked to a project
impl ConvertByParentId for TenantConverter {
    fn export_by_parent_id(
        &self,
        parent_id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if parent_id.is_empty() {
            return Ok(());
        }

        let tenants = self
            .client
            .fetch_all_with::<Tenant>(RESOURCE_TYPE, &[("projectId", parent_id)])?;

        for tenant in tenants {
            if should_export(&tenant.id, RESOURCE_TYPE, registry, visited) {
                self.export(tenant, true, registry, visited)?;
            }
        }

        Ok(())
    }
}
