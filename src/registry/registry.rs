use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

use super::ExportedResource;
use crate::error::ExportError;

/// Outcome of looking up a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The entity is registered; carries its reference expression
    Resolved(String),
    /// No id was given, so there is intentionally nothing to reference
    Absent,
    /// An id was given but nothing is registered under it
    Unresolved,
}

impl Resolution {
    pub fn reference(self) -> Option<String> {
        match self {
            Resolution::Resolved(reference) => Some(reference),
            Resolution::Absent | Resolution::Unresolved => None,
        }
    }
}

/// Append-only store of exported resources for a single export run
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<ExportedResource>,
    index: HashMap<(String, String), usize>,
    unresolved: RefCell<Vec<(String, String)>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor.
    ///
    /// Descriptors with a source id must be unique within their namespace.
    /// Synthetic descriptors (empty source id) are always accepted.
    pub fn add_resource(&mut self, resource: ExportedResource) -> Result<()> {
        if !resource.source_id.is_empty() {
            let key = (resource.resource_type.clone(), resource.source_id.clone());

            if self.index.contains_key(&key) {
                return Err(ExportError::DuplicateResource {
                    resource_type: key.0,
                    source_id: key.1,
                }
                .into());
            }

            self.index.insert(key, self.resources.len());
        }

        debug!(
            resource_type = %resource.resource_type,
            source_id = %resource.source_id,
            reference = %resource.reference,
            "registered resource"
        );

        self.resources.push(resource);
        Ok(())
    }

    /// Register several descriptors, stopping at the first duplicate
    pub fn add_resources(
        &mut self,
        resources: impl IntoIterator<Item = ExportedResource>,
    ) -> Result<()> {
        for resource in resources {
            self.add_resource(resource)?;
        }

        Ok(())
    }

    pub fn has_resource(&self, source_id: &str, resource_type: &str) -> bool {
        self.index
            .contains_key(&(resource_type.to_string(), source_id.to_string()))
    }

    /// Typed lookup behind every other query
    pub fn resolve(&self, resource_type: &str, source_id: &str) -> Resolution {
        if source_id.is_empty() {
            return Resolution::Absent;
        }

        match self
            .index
            .get(&(resource_type.to_string(), source_id.to_string()))
        {
            Some(position) => Resolution::Resolved(self.resources[*position].reference.clone()),
            None => Resolution::Unresolved,
        }
    }

    /// Reference expression for a required field, or an empty string.
    ///
    /// Misses on a non-empty id are remembered so the run can report them.
    pub fn get_resource(&self, resource_type: &str, source_id: &str) -> String {
        match self.resolve(resource_type, source_id) {
            Resolution::Resolved(reference) => reference,
            Resolution::Absent => String::new(),
            Resolution::Unresolved => {
                warn!(
                    resource_type,
                    source_id, "reference to a resource that was not exported"
                );
                self.record_unresolved(resource_type, source_id);
                String::new()
            }
        }
    }

    /// Reference expression for a field that is optional in the target schema
    pub fn get_resource_pointer(&self, resource_type: &str, source_id: &str) -> Option<String> {
        let resolution = self.resolve(resource_type, source_id);

        if resolution == Resolution::Unresolved {
            trace!(resource_type, source_id, "optional reference left unset");
        }

        resolution.reference()
    }

    /// Reference expressions for a list of ids, dropping the ones that do not resolve
    pub fn get_resources<S: AsRef<str>>(&self, resource_type: &str, source_ids: &[S]) -> Vec<String> {
        source_ids
            .iter()
            .filter_map(|id| self.get_resource_pointer(resource_type, id.as_ref()))
            .collect()
    }

    /// Reference expressions for a list that restricts something, like a
    /// variable scope. Every id that does not resolve is recorded as
    /// unresolved. Returns `None` when ids were given but none resolved, since
    /// an empty list would lift the restriction instead of keeping it.
    pub fn get_restricting_resources<S: AsRef<str>>(
        &self,
        resource_type: &str,
        source_ids: &[S],
    ) -> Option<Vec<String>> {
        let references: Vec<String> = source_ids
            .iter()
            .map(|id| self.get_resource(resource_type, id.as_ref()))
            .filter(|reference| !reference.is_empty())
            .collect();

        if references.is_empty() && source_ids.iter().any(|id| !id.as_ref().is_empty()) {
            return None;
        }

        Some(references)
    }

    /// All descriptors in a namespace, in insertion order
    pub fn get_all_resource<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a ExportedResource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.resource_type == resource_type)
    }

    /// All descriptors, in insertion order
    pub fn resources(&self) -> &[ExportedResource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Required references that did not resolve, without repeats
    pub fn unresolved_references(&self) -> Vec<(String, String)> {
        self.unresolved.borrow().clone()
    }

    fn record_unresolved(&self, resource_type: &str, source_id: &str) {
        let entry = (resource_type.to_string(), source_id.to_string());
        let mut unresolved = self.unresolved.borrow_mut();

        if !unresolved.contains(&entry) {
            unresolved.push(entry);
        }
    }
}
