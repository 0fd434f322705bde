use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::{ConvertAll, ConvertById, population_file, should_export};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{import_comment, resource_reference};
use crate::model::octopus::TagSet;
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::{resource_name, sanitize_name};

const RESOURCE_TYPE: &str = "TagSets";
const TAG_RESOURCE_TYPE: &str = "Tags";
const TERRAFORM_TYPE: &str = "octopusdeploy_tag_set";
const TAG_TERRAFORM_TYPE: &str = "octopusdeploy_tag";

/// A tag referenced by its canonical `TagSet/Tag` name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    pub tag_set_id: String,
    pub tag_id: String,
}

pub struct TagSetConverter {
    client: Arc<dyn SourceClient>,
}

impl TagSetConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    /// Resolve canonical tag names to the tag sets and tags that define them
    pub fn find_tags(&self, canonical_names: &[String]) -> Result<Vec<TagMatch>> {
        if canonical_names.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for tag_set in self.client.fetch_all::<TagSet>(RESOURCE_TYPE)? {
            for tag in &tag_set.tags {
                if canonical_names.contains(&tag.canonical_tag_name) {
                    matches.push(TagMatch {
                        tag_set_id: tag_set.id.clone(),
                        tag_id: tag.id.clone(),
                    });
                }
            }
        }

        Ok(matches)
    }

    fn register(&self, tag_set: TagSet, registry: &mut ResourceRegistry) -> Result<()> {
        let name = resource_name("tagset", &tag_set.name);
        let file_name = population_file(&name);
        let base_url = self.client.space_base_url();
        let tag_set_id = tag_set.id.clone();
        let tags = tag_set.tags.clone();

        registry.add_resource(ExportedResource::new(
            tag_set.id.clone(),
            RESOURCE_TYPE,
            file_name.clone(),
            resource_reference(TERRAFORM_TYPE, &name),
            {
                let name = name.clone();
                move |ctx| {
                    ctx.hcl.render(
                        "tag_set",
                        &json!({
                            "import_comment": import_comment(&base_url, RESOURCE_TYPE, &tag_set.name, TERRAFORM_TYPE, &name),
                            "name": name,
                            "resource_name": tag_set.name,
                            "description": tag_set.description,
                            "sort_order": tag_set.sort_order,
                        }),
                    )
                }
            },
        ))?;

        for tag in tags {
            let tag_name = format!("{}_tag_{}", name, sanitize_name(&tag.name));
            let tag_set_id = tag_set_id.clone();

            registry.add_resource(ExportedResource::new(
                tag.id.clone(),
                TAG_RESOURCE_TYPE,
                file_name.clone(),
                resource_reference(TAG_TERRAFORM_TYPE, &tag_name),
                move |ctx| {
                    ctx.hcl.render(
                        "tag",
                        &json!({
                            "name": tag_name,
                            "resource_name": tag.name,
                            "tag_set_id": ctx.registry.get_resource(RESOURCE_TYPE, &tag_set_id),
                            "color": tag.color,
                            "description": tag.description,
                            "sort_order": tag.sort_order,
                        }),
                    )
                },
            ))?;
        }

        Ok(())
    }
}

impl ConvertAll for TagSetConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for tag_set in self.client.fetch_all::<TagSet>(RESOURCE_TYPE)? {
            if should_export(&tag_set.id, RESOURCE_TYPE, registry, visited) {
                self.register(tag_set, registry)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for TagSetConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<TagSet>(RESOURCE_TYPE, id)? {
            Some(tag_set) => self.register(tag_set, registry),
            None => Ok(()),
        }
    }
}
