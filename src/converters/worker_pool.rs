use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::{ConvertAll, ConvertById, population_file, register_data_lookup, should_export};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{import_comment, resource_reference};
use crate::model::octopus::WorkerPool;
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "WorkerPools";

/// Pools that every cloud instance provides and that cannot be created
const BUILT_IN_POOLS: &[&str] = &["Hosted Windows", "Hosted Ubuntu", "Default Worker Pool"];

pub struct WorkerPoolConverter {
    client: Arc<dyn SourceClient>,
}

impl WorkerPoolConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn register(&self, pool: WorkerPool, registry: &mut ResourceRegistry) -> Result<()> {
        let name = resource_name("workerpool", &pool.name);

        if BUILT_IN_POOLS.contains(&pool.name.as_str()) {
            return register_data_lookup(
                registry,
                &pool.id,
                RESOURCE_TYPE,
                "octopusdeploy_worker_pools",
                "worker_pools",
                name,
                json!({ "partial_name": pool.name }),
            );
        }

        let terraform_type = if pool.worker_pool_type == "DynamicWorkerPool" {
            "octopusdeploy_dynamic_worker_pool"
        } else {
            "octopusdeploy_static_worker_pool"
        };
        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            pool.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(terraform_type, &name),
            move |ctx| {
                ctx.hcl.render(
                    "worker_pool",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &pool.name, terraform_type, &name),
                        "terraform_type": terraform_type,
                        "name": name,
                        "resource_name": pool.name,
                        "description": pool.description,
                        "is_default": pool.is_default,
                        "sort_order": pool.sort_order,
                        "worker_type": pool.worker_type,
                    }),
                )
            },
        ))
    }
}

impl ConvertAll for WorkerPoolConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for pool in self.client.fetch_all::<WorkerPool>(RESOURCE_TYPE)? {
            if should_export(&pool.id, RESOURCE_TYPE, registry, visited) {
                self.register(pool, registry)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for WorkerPoolConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<WorkerPool>(RESOURCE_TYPE, id)? {
            Some(pool) => self.register(pool, registry),
            None => Ok(()),
        }
    }
}
