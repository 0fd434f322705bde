//! Converters turn source entities into registered resources
//!
//! Each family exposes some of three entry points:
//!
//! - [`ConvertAll`] exports every entity of its type. It does not descend
//!   into linked entities (their own converters export them) but does export
//!   owned sub-resources, like a project's deployment process.
//! - [`ConvertById`] exports one entity and, first, everything it references.
//! - [`ConvertByParentId`] exports the children of a parent entity.
//!
//! Every entry point is guarded by the registry and the [`VisitedSet`], so
//! repeated calls are no-ops and reference cycles terminate.

pub mod account;
pub mod certificate;
pub mod channel;
pub mod deployment_process;
pub mod environment;
pub mod feed;
pub mod git_credential;
pub mod library_variable_set;
pub mod lifecycle;
pub mod machine_policy;
pub mod project;
pub mod project_group;
pub mod space;
pub mod tag_set;
pub mod target;
pub mod tenant;
pub mod tenant_variable;
pub mod variable_set;
pub mod worker_pool;

use anyhow::Result;
use serde_json::{Value, json};

use crate::hcl::data_reference;
use crate::model::octopus::{PropertyValue, Template};
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};

pub use account::AccountConverter;
pub use certificate::CertificateConverter;
pub use channel::ChannelConverter;
pub use deployment_process::DeploymentProcessConverter;
pub use environment::EnvironmentConverter;
pub use feed::FeedConverter;
pub use git_credential::GitCredentialConverter;
pub use library_variable_set::LibraryVariableSetConverter;
pub use lifecycle::LifecycleConverter;
pub use machine_policy::MachinePolicyConverter;
pub use project::ProjectConverter;
pub use project_group::ProjectGroupConverter;
pub use space::{SpaceConverter, SpacePopulationConverter};
pub use tag_set::TagSetConverter;
pub use target::TargetConverter;
pub use tenant::TenantConverter;
pub use tenant_variable::TenantVariableConverter;
pub use variable_set::VariableSetConverter;
pub use worker_pool::WorkerPoolConverter;

/// Directory for the configuration that creates the space itself
pub const SPACE_CREATION_DIR: &str = "space_creation";

/// Directory for the configuration that populates an existing space
pub const SPACE_POPULATION_DIR: &str = "space_population";

/// Export every entity of one type
pub trait ConvertAll {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()>;
}

/// Export one entity and its dependencies
pub trait ConvertById {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()>;
}

/// Export the children of a parent entity
pub trait ConvertByParentId {
    fn export_by_parent_id(
        &self,
        parent_id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()>;
}

/// Whether an entity still needs exporting. Marks it as in progress when it does.
pub fn should_export(
    id: &str,
    resource_type: &str,
    registry: &ResourceRegistry,
    visited: &mut VisitedSet,
) -> bool {
    !id.is_empty() && !registry.has_resource(id, resource_type) && visited.enter(resource_type, id)
}

pub(crate) fn population_file(resource_name: &str) -> String {
    format!("{}/{}.tf", SPACE_POPULATION_DIR, resource_name)
}

pub(crate) fn creation_file(file_name: &str) -> String {
    format!("{}/{}", SPACE_CREATION_DIR, file_name)
}

/// Split a comma separated property into trimmed, non-empty items
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Register a `data` block that finds an existing entity instead of creating one.
/// Used for built-in entities every space already has.
pub(crate) fn register_data_lookup(
    registry: &mut ResourceRegistry,
    source_id: &str,
    resource_type: &str,
    data_type: &'static str,
    collection: &str,
    name: String,
    filters: Value,
) -> Result<()> {
    let reference = data_reference(data_type, &name, collection);

    registry.add_resource(ExportedResource::new(
        source_id,
        resource_type,
        population_file(&name),
        reference,
        move |ctx| {
            ctx.hcl.render(
                "data_lookup",
                &json!({
                    "data_type": data_type,
                    "name": name,
                    "filters": filters,
                }),
            )
        },
    ))
}

/// Template blocks for a project or library variable set
pub(crate) fn template_blocks(templates: &[Template]) -> Vec<Value> {
    templates
        .iter()
        .map(|template| {
            json!({
                "name": template.name,
                "label": template.label,
                "help_text": template.help_text,
                "default_value": template
                    .default_value
                    .as_ref()
                    .and_then(PropertyValue::to_plain_text),
                "display_settings": template.display_settings,
            })
        })
        .collect()
}

/// Register a reference-only descriptor per template, pointing at the
/// template block of the owning resource by position
pub(crate) fn register_template_references(
    registry: &mut ResourceRegistry,
    resource_type: &str,
    owner_reference: &str,
    templates: &[Template],
) -> Result<()> {
    let owner = owner_reference.strip_suffix(".id}").unwrap_or(owner_reference);

    registry.add_resources(templates.iter().enumerate().map(|(index, template)| {
        ExportedResource::reference_only(
            template.id.clone(),
            resource_type,
            format!("{}.template[{}].id}}", owner, index),
        )
    }))
}
