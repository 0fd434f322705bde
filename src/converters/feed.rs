use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use super::{ConvertAll, ConvertById, population_file, register_data_lookup, should_export};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{Fields, TerraformVariable, import_comment, resource_reference, variable_reference};
use crate::model::octopus::Feed;
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Feeds";

pub struct FeedConverter {
    client: Arc<dyn SourceClient>,
}

impl FeedConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn register(&self, feed: Feed, registry: &mut ResourceRegistry) -> Result<()> {
        let name = resource_name("feed", &feed.name);

        // Built-in feeds exist in every space
        if feed.feed_type == "BuiltIn" || feed.feed_type == "OctopusProject" {
            return register_data_lookup(
                registry,
                &feed.id,
                RESOURCE_TYPE,
                "octopusdeploy_feeds",
                "feeds",
                name,
                json!({ "feed_type": feed.feed_type }),
            );
        }

        let Some((terraform_type, secret)) = feed_kind(&feed.feed_type) else {
            warn!(
                feed = %feed.name,
                feed_type = %feed.feed_type,
                "feed type is not supported and was skipped"
            );
            return Ok(());
        };

        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            feed.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(terraform_type, &name),
            move |ctx| {
                let variable = format!("{}_{}", name, secret);
                let mut output = ctx.hcl.render_variable(
                    &TerraformVariable::secret(
                        &variable,
                        format!("The {} used by the feed {}", secret, feed.name),
                    )
                    .with_default(""),
                )?;

                let fields = kind_fields(&feed).with(secret, variable_reference(&variable));

                output.push_str(&ctx.hcl.render(
                    "feed",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &feed.name, terraform_type, &name),
                        "terraform_type": terraform_type,
                        "name": name,
                        "resource_name": feed.name,
                        "fields": fields,
                    }),
                )?);

                Ok(output)
            },
        ))
    }
}

/// Terraform type and secret attribute for each supported feed type
fn feed_kind(feed_type: &str) -> Option<(&'static str, &'static str)> {
    match feed_type {
        "NuGet" => Some(("octopusdeploy_nuget_feed", "password")),
        "Docker" => Some(("octopusdeploy_docker_container_registry", "password")),
        "Maven" => Some(("octopusdeploy_maven_feed", "password")),
        "GitHub" => Some(("octopusdeploy_github_repository_feed", "password")),
        "Helm" => Some(("octopusdeploy_helm_feed", "password")),
        "AwsElasticContainerRegistry" => {
            Some(("octopusdeploy_aws_elastic_container_registry", "secret_key"))
        }
        _ => None,
    }
}

fn kind_fields(feed: &Feed) -> Fields {
    let fields = Fields::new();

    match feed.feed_type.as_str() {
        "AwsElasticContainerRegistry" => fields
            .with("access_key", &feed.access_key)
            .with("region", &feed.region),
        "Docker" => fields
            .with("feed_uri", &feed.feed_uri)
            .with("username", &feed.username)
            .with("api_version", &feed.api_version)
            .with("registry_path", &feed.registry_path)
            .with(
                "package_acquisition_location_options",
                &feed.package_acquisition_location_options,
            ),
        "NuGet" => fields
            .with("feed_uri", &feed.feed_uri)
            .with("username", &feed.username)
            .with("is_enhanced_mode", feed.is_enhanced_mode)
            .with("download_attempts", feed.download_attempts)
            .with(
                "download_retry_backoff_seconds",
                feed.download_retry_backoff_seconds,
            )
            .with(
                "package_acquisition_location_options",
                &feed.package_acquisition_location_options,
            ),
        _ => fields
            .with("feed_uri", &feed.feed_uri)
            .with("username", &feed.username)
            .with("download_attempts", feed.download_attempts)
            .with(
                "download_retry_backoff_seconds",
                feed.download_retry_backoff_seconds,
            )
            .with(
                "package_acquisition_location_options",
                &feed.package_acquisition_location_options,
            ),
    }
}

impl ConvertAll for FeedConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for feed in self.client.fetch_all::<Feed>(RESOURCE_TYPE)? {
            if should_export(&feed.id, RESOURCE_TYPE, registry, visited) {
                self.register(feed, registry)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for FeedConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<Feed>(RESOURCE_TYPE, id)? {
            Some(feed) => self.register(feed, registry),
            None => Ok(()),
        }
    }
}
