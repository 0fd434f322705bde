use anyhow::{Context as _, Result};
use std::sync::Arc;
use tracing::info;

use crate::client::{HttpSourceClient, SourceClient};
use crate::config::ExportConfig;
use crate::context::Context;
use crate::converters::{
    AccountConverter, CertificateConverter, ConvertAll, ConvertById, EnvironmentConverter,
    FeedConverter, GitCredentialConverter, LibraryVariableSetConverter, LifecycleConverter,
    MachinePolicyConverter, ProjectConverter, ProjectGroupConverter, SpaceConverter,
    SpacePopulationConverter, TagSetConverter, TargetConverter, TenantConverter,
    WorkerPoolConverter,
};
use crate::emitter;
use crate::registry::{ResourceRegistry, VisitedSet};

/// Namespaces counted in the run summary
const SUMMARY: [(&str, &str); 5] = [
    ("Projects", "Projects"),
    ("Environments", "Environments"),
    ("Tenants", "Tenants"),
    ("Targets", "Machines"),
    ("Variable sets", "Variables"),
];

pub struct ExportCommand;

impl ExportCommand {
    /// Execute the export command against a live server
    pub fn execute(ctx: &Context, config: &ExportConfig) -> Result<()> {
        let client = HttpSourceClient::new(&config.url, &config.api_key, &config.space)
            .context("Failed to create API client")?;

        Self::run(ctx, Arc::new(client), config)
    }

    /// Build the resource graph from `client` and emit it
    pub fn run(ctx: &Context, client: Arc<dyn SourceClient>, config: &ExportConfig) -> Result<()> {
        ctx.output.section("Exporting space");
        ctx.output.key_value("Server", &config.url);
        ctx.output.key_value("Space", &config.space);

        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        if config.projects.is_empty() {
            Self::export_space(client, &mut registry, &mut visited)?;
        } else {
            Self::export_projects(client, &config.projects, &mut registry, &mut visited)?;
        }

        ctx.output.key_value("Resources", &registry.len().to_string());
        for (label, resource_type) in SUMMARY {
            let count = registry.get_all_resource(resource_type).count();
            if count > 0 {
                ctx.output.key_value(label, &count.to_string());
            }
        }

        info!(resources = registry.len(), "rendering resources");
        let files = emitter::emit(
            &registry,
            ctx.fs.as_ref(),
            ctx.output.as_ref(),
            config.dest.as_deref(),
            config.strict_references,
        )?;

        let unresolved = registry.unresolved_references().len();
        if unresolved > 0 {
            ctx.output.warning(&format!(
                "{} reference(s) point outside the export and were left empty",
                unresolved
            ));
        }

        match &config.dest {
            Some(dest) => ctx
                .output
                .success(&format!("Wrote {} file(s) to {}", files, dest.display())),
            None => ctx.output.success(&format!("Printed {} file(s)", files)),
        }

        Ok(())
    }

    /// Every supported resource in the space
    fn export_space(
        client: Arc<dyn SourceClient>,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        let phases: [(&str, &dyn ConvertAll); 16] = [
            ("space", &SpaceConverter::new(client.clone())),
            ("common", &SpacePopulationConverter::new()),
            ("project groups", &ProjectGroupConverter::new(client.clone())),
            ("environments", &EnvironmentConverter::new(client.clone())),
            ("lifecycles", &LifecycleConverter::new(client.clone())),
            ("accounts", &AccountConverter::new(client.clone())),
            ("feeds", &FeedConverter::new(client.clone())),
            ("worker pools", &WorkerPoolConverter::new(client.clone())),
            ("machine policies", &MachinePolicyConverter::new(client.clone())),
            ("certificates", &CertificateConverter::new(client.clone())),
            ("git credentials", &GitCredentialConverter::new(client.clone())),
            ("tag sets", &TagSetConverter::new(client.clone())),
            ("library variable sets", &LibraryVariableSetConverter::new(client.clone())),
            ("projects", &ProjectConverter::new(client.clone())),
            ("tenants", &TenantConverter::new(client.clone())),
            ("targets", &TargetConverter::new(client)),
        ];

        for (phase, converter) in phases {
            info!(phase, "exporting");
            converter
                .export_all(registry, visited)
                .with_context(|| format!("Failed to export {}", phase))?;
        }

        Ok(())
    }

    /// The given projects and everything they depend on
    fn export_projects(
        client: Arc<dyn SourceClient>,
        projects: &[String],
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        SpacePopulationConverter::new().export_all(registry, visited)?;

        let converter = ProjectConverter::new(client);
        for project_id in projects {
            info!(project = %project_id, "exporting project");
            converter
                .export_by_id(project_id, registry, visited)
                .with_context(|| format!("Failed to export project {}", project_id))?;

            if !registry.has_resource(project_id, "Projects") {
                anyhow::bail!("Project {} was not found", project_id);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockSourceClient;
    use crate::error::ExportError;
    use crate::traits::{MockFileSystem, MockOutput, OutputMessage};
    use serde_json::json;
    use std::path::{Path, PathBuf};

    fn space() -> Arc<MockSourceClient> {
        Arc::new(
            MockSourceClient::new()
                .with_space(json!({ "Id": "Spaces-1", "Name": "Default", "IsDefault": true }))
                .with_collection("Environments", vec![json!({ "Id": "Environments-1", "Name": "Dev" })])
                .with_collection(
                    "ProjectGroups",
                    vec![json!({ "Id": "ProjectGroups-1", "Name": "Apps" })],
                )
                .with_collection(
                    "Lifecycles",
                    vec![json!({
                        "Id": "Lifecycles-1",
                        "Name": "Simple",
                        "Phases": [{ "Name": "Dev", "AutomaticDeploymentTargets": ["Environments-1"] }],
                    })],
                )
                .with_collection(
                    "Projects",
                    vec![json!({
                        "Id": "Projects-1",
                        "Name": "Web",
                        "ProjectGroupId": "ProjectGroups-1",
                        "LifecycleId": "Lifecycles-1",
                        "VariableSetId": "variableset-Projects-1",
                        "DeploymentProcessId": "deploymentprocess-Projects-1",
                    })],
                )
                .with_collection(
                    "DeploymentProcesses",
                    vec![json!({ "Id": "deploymentprocess-Projects-1", "ProjectId": "Projects-1" })],
                )
                .with_collection(
                    "Projects/Projects-1/channels",
                    vec![json!({ "Id": "Channels-1", "Name": "Default", "ProjectId": "Projects-1", "IsDefault": true })],
                )
                .with_collection(
                    "Variables",
                    vec![json!({
                        "Id": "variableset-Projects-1",
                        "OwnerId": "Projects-1",
                        "Variables": [{
                            "Id": "v1",
                            "Name": "Region",
                            "Value": "east",
                            "Type": "String",
                            "Scope": { "Environment": ["Environments-1"] },
                        }],
                    })],
                ),
        )
    }

    fn config(projects: &[&str]) -> ExportConfig {
        ExportConfig {
            url: "https://octopus.example".to_string(),
            api_key: "API-KEY".to_string(),
            space: "Spaces-1".to_string(),
            dest: Some(PathBuf::from("out")),
            console: false,
            projects: projects.iter().map(|p| p.to_string()).collect(),
            strict_references: true,
        }
    }

    #[test]
    fn test_whole_space_export_resolves_every_reference() {
        let fs = Arc::new(MockFileSystem::new());
        let output = Arc::new(MockOutput::new());
        let ctx = Context::test_with(fs.clone(), output.clone());

        ExportCommand::run(&ctx, space(), &config(&[])).unwrap();

        let files = fs.list_files();
        for expected in [
            "out/space_creation/space.tf",
            "out/space_creation/provider.tf",
            "out/space_population/provider.tf",
            "out/space_population/config.tf",
            "out/space_population/project_Web.tf",
        ] {
            assert!(
                files.iter().any(|file| file == Path::new(expected)),
                "missing {} in {:?}",
                expected,
                files
            );
        }

        let project = fs
            .get_file_contents(Path::new("out/space_population/project_Web.tf"))
            .unwrap();
        assert!(project.contains("${octopusdeploy_lifecycle.lifecycle_Simple.id}"));
        assert!(project.contains("${octopusdeploy_project_group.project_group_Apps.id}"));
        assert!(output.has_success());
        assert!(output.contains_message(&OutputMessage::KeyValue(
            "Projects".to_string(),
            "1".to_string()
        )));
    }

    #[test]
    fn test_project_mode_exports_dependencies_only() {
        let client = space();
        let fs = Arc::new(MockFileSystem::new());
        let ctx = Context::test_with(fs.clone(), Arc::new(MockOutput::new()));

        ExportCommand::run(&ctx, client.clone(), &config(&["Projects-1"])).unwrap();

        let files = fs.list_files();
        assert!(files.iter().all(|file| !file.starts_with("out/space_creation")));
        assert!(files.iter().any(|file| file == Path::new("out/space_population/project_Web.tf")));
        assert!(!client.requested("Space"));
        assert!(!client.requested("Machines"));
    }

    #[test]
    fn test_missing_project_fails() {
        let ctx = Context::test();

        let err = ExportCommand::run(&ctx, space(), &config(&["Projects-404"])).unwrap_err();

        assert!(err.to_string().contains("Projects-404"));
    }

    #[test]
    fn test_strict_mode_reports_references_outside_the_export() {
        let client = Arc::new(
            MockSourceClient::new().with_collection(
                "Projects",
                vec![json!({
                    "Id": "Projects-1",
                    "Name": "Web",
                    "ProjectGroupId": "ProjectGroups-1",
                    "LifecycleId": "Lifecycles-1",
                })],
            ),
        );
        let fs = Arc::new(MockFileSystem::new());
        let ctx = Context::test_with(fs.clone(), Arc::new(MockOutput::new()));

        let err = ExportCommand::run(&ctx, client, &config(&[])).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::UnresolvedReferences(_))
        ));
        assert!(fs.list_files().is_empty());
    }

    #[test]
    fn test_console_mode_prints_files() {
        let output = Arc::new(MockOutput::new());
        let fs = Arc::new(MockFileSystem::new());
        let ctx = Context::test_with(fs.clone(), output.clone());
        let config = ExportConfig {
            dest: None,
            console: true,
            ..config(&["Projects-1"])
        };

        ExportCommand::run(&ctx, space(), &config).unwrap();

        assert!(fs.list_files().is_empty());
        assert!(output.plain_text().contains("# space_population/project_Web.tf"));
    }
}
