//! Finds source ids embedded in free-form property values and swaps them for
//! reference expressions

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::hcl::escape_template_sequences;
use crate::registry::ResourceRegistry;

lazy_static! {
    static ref ACCOUNT_ID: Regex = Regex::new(r"\bAccounts-\d+\b").expect("Invalid regex pattern");
    static ref FEED_ID: Regex = Regex::new(r"\bFeeds-\d+\b").expect("Invalid regex pattern");
}

/// Scanner for one reference-bearing resource type
#[derive(Debug, Clone, Copy)]
pub struct ReferenceScanner {
    resource_type: &'static str,
    pattern: &'static Regex,
}

impl ReferenceScanner {
    pub fn accounts() -> Self {
        Self {
            resource_type: "Accounts",
            pattern: &ACCOUNT_ID,
        }
    }

    pub fn feeds() -> Self {
        Self {
            resource_type: "Feeds",
            pattern: &FEED_ID,
        }
    }

    /// Every scanner the deployment process uses
    pub fn all() -> [Self; 2] {
        [Self::accounts(), Self::feeds()]
    }

    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    /// Ids found in `text`, without repeats, in order of first appearance
    pub fn find_ids(&self, text: &str) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();

        for found in self.pattern.find_iter(text) {
            if !ids.iter().any(|id| id == found.as_str()) {
                ids.push(found.as_str().to_string());
            }
        }

        ids
    }

    /// Replace each registered id with its reference expression. Ids that
    /// were not exported stay as they are.
    pub fn rewrite(&self, text: &str, registry: &ResourceRegistry) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures| {
                registry
                    .get_resource_pointer(self.resource_type, &caps[0])
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Escape template sequences in a property value, then substitute references
/// from every scanner
pub fn rewrite_property(
    value: &str,
    scanners: &[ReferenceScanner],
    registry: &ResourceRegistry,
) -> String {
    scanners
        .iter()
        .fold(escape_template_sequences(value), |text, scanner| {
            scanner.rewrite(&text, registry)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ExportedResource;

    fn registry_with(entries: &[(&str, &str, &str)]) -> ResourceRegistry {
        let mut registry = ResourceRegistry::new();
        for (resource_type, id, reference) in entries {
            registry
                .add_resource(ExportedResource::reference_only(*id, *resource_type, *reference))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_find_ids_deduplicates_in_order() {
        let ids = ReferenceScanner::feeds().find_ids("Feeds-2 then Feeds-1 then Feeds-2");

        assert_eq!(ids, vec!["Feeds-2".to_string(), "Feeds-1".to_string()]);
    }

    #[test]
    fn test_find_ids_reads_whole_numbers() {
        let ids = ReferenceScanner::feeds().find_ids("{\"FeedId\":\"Feeds-10\"}");

        assert_eq!(ids, vec!["Feeds-10".to_string()]);
    }

    #[test]
    fn test_find_ids_ignores_other_types() {
        assert!(ReferenceScanner::accounts().find_ids("Feeds-1 Projects-2").is_empty());
    }

    #[test]
    fn test_rewrite_does_not_touch_longer_ids() {
        let registry = registry_with(&[("Feeds", "Feeds-1", "${feed_one}")]);

        let rewritten = ReferenceScanner::feeds().rewrite("Feeds-1,Feeds-10", &registry);

        assert_eq!(rewritten, "${feed_one},Feeds-10");
    }

    #[test]
    fn test_rewrite_handles_both_prefix_ids() {
        let registry = registry_with(&[
            ("Feeds", "Feeds-1", "${feed_one}"),
            ("Feeds", "Feeds-10", "${feed_ten}"),
        ]);

        let rewritten = ReferenceScanner::feeds().rewrite("Feeds-10 Feeds-1", &registry);

        assert_eq!(rewritten, "${feed_ten} ${feed_one}");
    }

    #[test]
    fn test_rewrite_leaves_unknown_ids() {
        let registry = ResourceRegistry::new();

        assert_eq!(
            ReferenceScanner::accounts().rewrite("Accounts-3", &registry),
            "Accounts-3"
        );
        assert!(registry.unresolved_references().is_empty());
    }

    #[test]
    fn test_rewrite_property_escapes_before_substituting() {
        let registry = registry_with(&[
            ("Accounts", "Accounts-1", "${octopusdeploy_aws_account.account_aws.id}"),
            ("Feeds", "Feeds-2", "${octopusdeploy_docker_container_registry.feed_docker.id}"),
        ]);

        let rewritten = rewrite_property(
            "echo ${HOME} Accounts-1 Feeds-2",
            &ReferenceScanner::all(),
            &registry,
        );

        assert_eq!(
            rewritten,
            "echo $${HOME} ${octopusdeploy_aws_account.account_aws.id} \
             ${octopusdeploy_docker_container_registry.feed_docker.id}"
        );
    }
}
