use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::{ConvertAll, ConvertById, population_file, should_export};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{TerraformVariable, import_comment, resource_reference, variable_reference};
use crate::model::octopus::GitCredential;
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Git-Credentials";
const TERRAFORM_TYPE: &str = "octopusdeploy_git_credential";

pub struct GitCredentialConverter {
    client: Arc<dyn SourceClient>,
}

impl GitCredentialConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn register(&self, credential: GitCredential, registry: &mut ResourceRegistry) -> Result<()> {
        let name = resource_name("gitcredential", &credential.name);
        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            credential.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(TERRAFORM_TYPE, &name),
            move |ctx| {
                let password = format!("{}_sensitive_value", name);
                let mut output = ctx.hcl.render_variable(&TerraformVariable::secret(
                    &password,
                    format!("The secret used by the git credential {}", credential.name),
                ))?;

                output.push_str(&ctx.hcl.render(
                    "git_credential",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &credential.name, TERRAFORM_TYPE, &name),
                        "name": name,
                        "resource_name": credential.name,
                        "description": credential.description,
                        "credential_type": credential.details.credential_type,
                        "username": credential.details.username,
                        "password": variable_reference(&password),
                    }),
                )?);

                Ok(output)
            },
        ))
    }
}

impl ConvertAll for GitCredentialConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for credential in self.client.fetch_all::<GitCredential>(RESOURCE_TYPE)? {
            if should_export(&credential.id, RESOURCE_TYPE, registry, visited) {
                self.register(credential, registry)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for GitCredentialConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<GitCredential>(RESOURCE_TYPE, id)? {
            Some(credential) => self.register(credential, registry),
            None => Ok(()),
        }
    }
}
