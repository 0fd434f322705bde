use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use super::{ConvertAll, ConvertById, population_file, should_export};
use crate::client::{SourceClient, SourceClientExt};
use crate::hcl::{TerraformVariable, import_comment, resource_reference, variable_reference};
use crate::model::octopus::Certificate;
use crate::registry::{ExportedResource, ResourceRegistry, VisitedSet};
use crate::sanitizer::resource_name;

const RESOURCE_TYPE: &str = "Certificates";
const TERRAFORM_TYPE: &str = "octopusdeploy_certificate";

/// Certificates never export the tenants or environments they are scoped to.
/// Tenants link back to projects, which link to certificates through their
/// variables, so exporting them here would pull in most of the space.
pub struct CertificateConverter {
    client: Arc<dyn SourceClient>,
}

impl CertificateConverter {
    pub fn new(client: Arc<dyn SourceClient>) -> Self {
        Self { client }
    }

    fn register(&self, certificate: Certificate, registry: &mut ResourceRegistry) -> Result<()> {
        let name = resource_name("certificate", &certificate.name);
        let base_url = self.client.space_base_url();

        registry.add_resource(ExportedResource::new(
            certificate.id.clone(),
            RESOURCE_TYPE,
            population_file(&name),
            resource_reference(TERRAFORM_TYPE, &name),
            move |ctx| {
                let password = format!("{}_password", name);
                let data = format!("{}_data", name);

                let mut output = ctx.hcl.render_variable(&TerraformVariable::secret(
                    &password,
                    format!("The password protecting the certificate {}", certificate.name),
                ))?;
                output.push_str(&ctx.hcl.render_variable(&TerraformVariable::secret(
                    &data,
                    format!("The base 64 encoded contents of the certificate {}", certificate.name),
                ))?);

                output.push_str(&ctx.hcl.render(
                    "certificate",
                    &json!({
                        "import_comment": import_comment(&base_url, RESOURCE_TYPE, &certificate.name, TERRAFORM_TYPE, &name),
                        "name": name,
                        "resource_name": certificate.name,
                        "password": variable_reference(&password),
                        "certificate_data": variable_reference(&data),
                        "archived": certificate.archived,
                        "notes": certificate.notes,
                        "environments": ctx.registry.get_resources("Environments", &certificate.environment_ids),
                        "tenant_tags": certificate.tenant_tags,
                        "tenants": ctx.registry.get_resources("Tenants", &certificate.tenant_ids),
                        "tenanted_deployment_participation": certificate.tenanted_deployment_participation,
                    }),
                )?);

                Ok(output)
            },
        ))
    }
}

impl ConvertAll for CertificateConverter {
    fn export_all(&self, registry: &mut ResourceRegistry, visited: &mut VisitedSet) -> Result<()> {
        for certificate in self.client.fetch_all::<Certificate>(RESOURCE_TYPE)? {
            if should_export(&certificate.id, RESOURCE_TYPE, registry, visited) {
                self.register(certificate, registry)?;
            }
        }

        Ok(())
    }
}

impl ConvertById for CertificateConverter {
    fn export_by_id(
        &self,
        id: &str,
        registry: &mut ResourceRegistry,
        visited: &mut VisitedSet,
    ) -> Result<()> {
        if !should_export(id, RESOURCE_TYPE, registry, visited) {
            return Ok(());
        }

        match self.client.fetch_by_id::<Certificate>(RESOURCE_TYPE, id)? {
            Some(certificate) => self.register(certificate, registry),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockSourceClient;
    use crate::hcl::HclWriter;
    use crate::registry::RenderContext;

    fn client() -> Arc<MockSourceClient> {
        Arc::new(
            MockSourceClient::new()
                .with_collection(
                    "Certificates",
                    vec![json!({
                        "Id": "Certificates-1",
                        "Name": "Wildcard",
                        "EnvironmentIds": ["Environments-1"],
                        "TenantIds": ["Tenants-1"],
                    })],
                )
                .with_collection(
                    "Environments",
                    vec![json!({ "Id": "Environments-1", "Name": "Dev" })],
                )
                .with_collection("Tenants", vec![json!({ "Id": "Tenants-1", "Name": "Acme" })]),
        )
    }

    #[test]
    fn test_certificate_does_not_fetch_tenants_or_environments() {
        let client = client();
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        CertificateConverter::new(client.clone())
            .export_by_id("Certificates-1", &mut registry, &mut visited)
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.has_resource("Certificates-1", "Certificates"));
        assert!(!client.requested("Tenants"));
        assert!(!client.requested("Environments"));
    }

    #[test]
    fn test_certificate_renders_secret_variables() {
        let mut registry = ResourceRegistry::new();
        let mut visited = VisitedSet::new();

        CertificateConverter::new(client())
            .export_all(&mut registry, &mut visited)
            .unwrap();

        let hcl = HclWriter::new().unwrap();
        let ctx = RenderContext { registry: &registry, hcl: &hcl };
        let output = registry.resources()[0].render(&ctx).unwrap();

        assert!(output.contains("variable \"certificate_Wildcard_password\" {"));
        assert!(output.contains("variable \"certificate_Wildcard_data\" {"));
        assert!(output.contains("certificate_data = \"${var.certificate_Wildcard_data}\""));
        // Scoped entities were never exported, so nothing resolves
        assert!(output.contains("environments = []"));
        assert!(output.contains("tenants = []"));
    }
}
