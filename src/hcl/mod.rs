//! HCL output for exported resources
//!
//! Every resource type has a Handlebars template under `templates/`. Values
//! are passed as JSON and turned into HCL expressions by the `hcl` helper, so
//! templates never deal with quoting themselves.

pub mod expression;

use anyhow::{Context, Result};
use handlebars::{Handlebars, handlebars_helper};
use serde::Serialize;
use serde_json::Value;

pub use expression::{
    data_reference, escape_template_sequences, resource_reference, variable_reference,
};

const TEMPLATES: &[(&str, &str)] = &[
    ("account", include_str!("templates/account.tf.hbs")),
    ("certificate", include_str!("templates/certificate.tf.hbs")),
    ("channel", include_str!("templates/channel.tf.hbs")),
    ("data_lookup", include_str!("templates/data_lookup.tf.hbs")),
    ("deployment_process", include_str!("templates/deployment_process.tf.hbs")),
    ("environment", include_str!("templates/environment.tf.hbs")),
    ("feed", include_str!("templates/feed.tf.hbs")),
    ("git_credential", include_str!("templates/git_credential.tf.hbs")),
    ("library_variable_set", include_str!("templates/library_variable_set.tf.hbs")),
    ("lifecycle", include_str!("templates/lifecycle.tf.hbs")),
    ("machine_policy", include_str!("templates/machine_policy.tf.hbs")),
    ("project", include_str!("templates/project.tf.hbs")),
    ("project_group", include_str!("templates/project_group.tf.hbs")),
    ("provider", include_str!("templates/provider.tf.hbs")),
    ("script_module", include_str!("templates/script_module.tf.hbs")),
    ("space", include_str!("templates/space.tf.hbs")),
    ("tag", include_str!("templates/tag.tf.hbs")),
    ("tag_set", include_str!("templates/tag_set.tf.hbs")),
    ("target", include_str!("templates/target.tf.hbs")),
    ("tenant", include_str!("templates/tenant.tf.hbs")),
    ("tenant_common_variable", include_str!("templates/tenant_common_variable.tf.hbs")),
    ("tenant_project_variable", include_str!("templates/tenant_project_variable.tf.hbs")),
    ("terraform_config", include_str!("templates/terraform_config.tf.hbs")),
    ("variable", include_str!("templates/variable.tf.hbs")),
    ("worker_pool", include_str!("templates/worker_pool.tf.hbs")),
    ("project_variable", include_str!("templates/project_variable.tf.hbs")),
];

handlebars_helper!(hcl_helper: |value: Json| expression::to_hcl_expression(value));
handlebars_helper!(addresses_helper: |value: Json| expression::to_address_list(value));
handlebars_helper!(present_helper: |value: Json| !value.is_null());

/// Renders resources into HCL using the bundled templates
pub struct HclWriter {
    handlebars: Handlebars<'static>,
}

impl HclWriter {
    /// Create a writer with every bundled template registered
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        // Custom helpers
        handlebars.register_helper("hcl", Box::new(hcl_helper));
        handlebars.register_helper("addresses", Box::new(addresses_helper));
        handlebars.register_helper("present", Box::new(present_helper));

        for (name, source) in TEMPLATES {
            handlebars
                .register_template_string(name, *source)
                .with_context(|| format!("Failed to register template: {}", name))?;
        }

        Ok(Self { handlebars })
    }

    /// Render a named template
    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String> {
        self.handlebars
            .render(template, data)
            .with_context(|| format!("Failed to render template: {}", template))
    }

    /// Render a terraform input variable block
    pub fn render_variable(&self, variable: &TerraformVariable) -> Result<String> {
        self.render("variable", variable)
    }
}

/// A terraform `variable` block
#[derive(Debug, Clone, Serialize)]
pub struct TerraformVariable {
    pub name: String,
    pub nullable: bool,
    pub sensitive: bool,
    pub description: String,
    pub default: Option<Value>,
}

impl TerraformVariable {
    /// A sensitive string variable with no default
    pub fn secret(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
            sensitive: true,
            description: description.into(),
            default: None,
        }
    }

    /// A non-sensitive string variable with no default
    pub fn plain(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
            sensitive: false,
            description: description.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.nullable = true;
        self.default = Some(default.into());
        self
    }
}

/// A single `key = value` attribute for templates whose attribute set
/// depends on the kind of resource
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

/// Ordered attribute list. Null values are skipped so optional attributes
/// simply disappear from the output.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Fields(Vec<Field>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        if !value.is_null() {
            self.0.push(Field {
                key: key.to_string(),
                value,
            });
        }
        self
    }
}

/// A nested block such as `ssh_endpoint { ... }`
#[derive(Debug, Clone, Serialize)]
pub struct Block {
    pub name: String,
    pub fields: Fields,
}

impl Block {
    pub fn new(name: impl Into<String>, fields: Fields) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// Comment explaining how to import an existing resource instead of creating it
pub fn import_comment(
    space_base_url: &str,
    resource_type_path: &str,
    display_name: &str,
    terraform_type: &str,
    resource_name: &str,
) -> String {
    format!(
        "# Import existing resources with the following commands:\n\
         # RESOURCE_ID=$(curl -H \"X-Octopus-ApiKey: ${{OCTOPUS_CLI_API_KEY}}\" {}/{} | jq -r '.Items[] | select(.Name==\"{}\") | .Id')\n\
         # terraform import {}.{} ${{RESOURCE_ID}}\n",
        space_base_url, resource_type_path, display_name, terraform_type, resource_name
    )
}
