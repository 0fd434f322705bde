use anyhow::Result;
use std::fmt;

use super::ResourceRegistry;
use crate::hcl::HclWriter;

/// Everything a deferred renderer may consult once the graph is complete
pub struct RenderContext<'a> {
    pub registry: &'a ResourceRegistry,
    pub hcl: &'a HclWriter,
}

/// Deferred renderer. Closures own copies of their inputs; the registry is
/// only reachable through the context handed in at render time.
pub type RenderFn = Box<dyn Fn(&RenderContext<'_>) -> Result<String>>;

/// One exported entity in the resource graph
pub struct ExportedResource {
    /// Identifier in the source system; empty for synthetic resources
    pub source_id: String,
    /// Namespace the source id is unique in
    pub resource_type: String,
    /// Relative output path, `None` for reference-only descriptors
    pub file_name: Option<String>,
    /// Expression other resources substitute to point at this one
    pub reference: String,
    render: Option<RenderFn>,
}

impl ExportedResource {
    /// Create a descriptor that is emitted to `file_name`
    pub fn new(
        source_id: impl Into<String>,
        resource_type: impl Into<String>,
        file_name: impl Into<String>,
        reference: impl Into<String>,
        render: impl Fn(&RenderContext<'_>) -> Result<String> + 'static,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            resource_type: resource_type.into(),
            file_name: Some(file_name.into()),
            reference: reference.into(),
            render: Some(Box::new(render)),
        }
    }

    /// Create a descriptor that only carries a reference, e.g. a template
    /// nested inside a variable set or an action inside a deployment process
    pub fn reference_only(
        source_id: impl Into<String>,
        resource_type: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            resource_type: resource_type.into(),
            file_name: None,
            reference: reference.into(),
            render: None,
        }
    }

    /// Whether this descriptor produces an output file
    pub fn is_emitted(&self) -> bool {
        self.file_name.is_some() && self.render.is_some()
    }

    /// Run the deferred renderer. Reference-only descriptors render nothing.
    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<String> {
        match &self.render {
            Some(render) => render(ctx),
            None => Ok(String::new()),
        }
    }
}

impl fmt::Debug for ExportedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedResource")
            .field("source_id", &self.source_id)
            .field("resource_type", &self.resource_type)
            .field("file_name", &self.file_name)
            .field("reference", &self.reference)
            .finish()
    }
}
