use std::collections::HashSet;

/// Entities whose export has started in this run.
///
/// Converters enter an entity before fetching it, so a cycle is broken at the
/// second visit even when neither side has been registered yet.
#[derive(Debug, Default)]
pub struct VisitedSet {
    entries: HashSet<(String, String)>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an entity as in progress. Returns false if it was already entered.
    pub fn enter(&mut self, resource_type: &str, source_id: &str) -> bool {
        self.entries
            .insert((resource_type.to_string(), source_id.to_string()))
    }

    pub fn contains(&self, resource_type: &str, source_id: &str) -> bool {
        self.entries
            .contains(&(resource_type.to_string(), source_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
