use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use super::{ConvertAll, ConvertById, EnvironmentConverter, population_file, should_export};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{Fields, TerraformVariable, import_comment, resource_reference, variable_reference};
use crate::model::octopus::Account;
use crate::registry::{ExportedResource, RenderContext, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Accounts";

/// How one kind of account maps onto the provider
struct AccountKind {
    terraform_type: &'static str,
    /// `(attribute, variable suffix)` pairs for secret attributes
    secrets: &'static [(&'static str, &'static str)],
}

fn account_kind(account_type: &str) -> Option<AccountKind> {
    let (terraform_type, secrets): (&'static str, &'static [(&'static str, &'static str)]) =
        match account_type {
            "AzureServicePrincipal" => (
                "octopusdeploy_azure_service_principal",
                &[("password", "password")],
            ),
            "AzureSubscription" => (
                "octopusdeploy_azure_subscription_account",
                &[("certificate", "cert")],
            ),
            "AmazonWebServicesAccount" => {
                ("octopusdeploy_aws_account", &[("secret_key", "secret_key")])
            }
            "GoogleCloudAccount" => ("octopusdeploy_gcp_account", &[("json_key", "json_key")]),
            "SshKeyPair" => (
                "octopusdeploy_ssh_key_account",
                &[
                    ("private_key_file", "cert"),
                    ("private_key_passphrase", "passphrase"),
                ],
            ),
            "UsernamePassword" => (
                "octopusdeploy_username_password_account",
                &[("password", "password")],
            ),
            "Token" => ("octopusdeploy_token_account", &[("token", "token")]),
            _ => return None,
        };

    Some(AccountKind {
        terraform_type,
        secrets,
    })
}

pub struct AccountConverter {
    client: Arc<dyn SourceClient>,
}

impl AccountConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn register(&self, account: Account, registry: &mut ResourceRegistry) -> Result<()> {
        let Some(kind) = account_kind(&account.account_type) else {
            warn!(
                account = %account.name,
                account_type = %account.account_type,
                "account type is not supported and was skipped"
            );
            return Ok(());
        };

        let name = resource_name("account", &account.name);
        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            account.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(kind.terraform_type, &name),
            move |ctx| {
                let mut output = String::new();
                let mut fields = kind_fields(&account);

                for (attribute, suffix) in kind.secrets {
                    let variable = format!("{}_{}", name, suffix);
                    output.push_str(&ctx.hcl.render_variable(&TerraformVariable::secret(
                        &variable,
                        format!("The {} value for the account {}", attribute, account.name),
                    ))?);
                    fields = fields.with(attribute, variable_reference(&variable));
                }

                output.push_str(&render_account(ctx, &account, &fields, kind.terraform_type, &name, &base_url)?);
                Ok(output)
            },
        ))
    }
}

/// Non-secret attributes specific to the account kind
fn kind_fields(account: &Account) -> Fields {
    match account.account_type.as_str() {
        "AzureServicePrincipal" => Fields::new()
            .with("application_id", &account.client_id)
            .with("subscription_id", &account.subscription_number)
            .with("tenant_id", &account.tenant_id)
            .with("azure_environment", &account.azure_environment)
            .with(
                "resource_manager_endpoint",
                &account.resource_management_endpoint_base_uri,
            )
            .with(
                "authentication_endpoint",
                &account.active_directory_endpoint_base_uri,
            ),
        "AzureSubscription" => Fields::new()
            .with("subscription_id", &account.subscription_number)
            .with("azure_environment", &account.azure_environment),
        "AmazonWebServicesAccount" => Fields::new().with("access_key", &account.access_key),
        "SshKeyPair" | "UsernamePassword" => Fields::new().with("username", &account.username),
        _ => Fields::new(),
    }
}

fn render_account(
    ctx: &RenderContext<'_>,
    account: &Account,
    fields: &Fields,
    terraform_type: &str,
    name: &str,
    base_url: &str,
) -> Result<String> {
    ctx.hcl.render(
        "account",
        &json!({
            "import_comment": import_comment(base_url, RESOURCE_TYPE, &account.name, terraform_type, name),
            "terraform_type": terraform_type,
            "name": name,
            "resource_name": account.name,
            "description": account.description,
            "environments": ctx.registry.get_resources("Environments", &account.environment_ids),
            "tenant_tags": account.tenant_tags,
            "tenants": ctx.registry.get_resources("Tenants", &account.tenant_ids),
            "tenanted_deployment_participation": account.tenanted_deployment_participation,
            "fields": fields,
        }),
    )
}

impl ConvertAll for AccountConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for account in self.client.fetch_all::<Account>(RESOURCE_TYPE)? {
            if should_export(&account.id, RESOURCE_TYPE, registry, visited) {
                self.register(account, registry)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for AccountConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        let Some(account) = self.client.fetch_by_id::<Account>(RESOURCE_TYPE, id)? else {
            return Ok(());
        };

        // Tenants are only looked up; exporting them would pull in their projects
        let environments = EnvironmentConverter::new(Arc::clone(&self.client));
        for environment in &account.environment_ids {
            environments.export_by_id(environment, registry, visited)?;
        }

        self.register(account, registry)
    }
}
