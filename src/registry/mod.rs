//! Resource graph for a single export run
//!
//! Converters register one [`ExportedResource`] per exported entity and look
//! up each other's reference expressions through the [`ResourceRegistry`].
//! Rendering is deferred until every converter has finished registering.

pub mod descriptor;
#[allow(clippy::module_inception)]
pub mod registry;
pub mod visited;

pub use descriptor::{ExportedResource, RenderContext};
pub use registry::ResourceRegistry;
pub use visited::VisitedSet;
