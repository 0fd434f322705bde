//! Access to the source server's REST API
//!
//! Converters only see the [`SourceClient`] trait. Paths are relative to the
//! space being exported (`Environments`, `Projects/Projects-1/channels`).

pub mod http;
#[cfg(test)]
pub mod mock;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use http::HttpSourceClient;
#[cfg(test)]
pub use mock::MockSourceClient;

/// Trait for reading the source server to enable testing with mocks
pub trait SourceClient: Send + Sync {
    /// Every item of a collection, following pagination
    fn get_collection(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<Value>>;

    /// A single object, `None` when the server answers 404
    fn get_resource(&self, path: &str) -> Result<Option<Value>>;

    /// A single object by id, `None` when the server answers 404
    fn get_resource_by_id(&self, path: &str, id: &str) -> Result<Option<Value>>;

    /// The space being exported
    fn get_space(&self) -> Result<Value>;

    /// Base URL of the space's API, used in import instructions
    fn space_base_url(&self) -> String;
}

/// Typed helpers on top of [`SourceClient`]
pub trait SourceClientExt: SourceClient {
    fn fetch_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        self.fetch_all_with(path, &[])
    }

    fn fetch_all_with<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        self.get_collection(path, query)?
            .into_iter()
            .map(|item| {
                serde_json::from_value(item)
                    .with_context(|| format!("Failed to parse item from collection: {}", path))
            })
            .collect()
    }

    fn fetch_by_id<T: DeserializeOwned>(&self, path: &str, id: &str) -> Result<Option<T>> {
        self.get_resource_by_id(path, id)?
            .map(|value| {
                serde_json::from_value(value)
                    .with_context(|| format!("Failed to parse resource: {}/{}", path, id))
            })
            .transpose()
    }

    fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.get_resource(path)?
            .map(|value| {
                serde_json::from_value(value)
                    .with_context(|| format!("Failed to parse resource: {}", path))
            })
            .transpose()
    }
}

impl<C: SourceClient + ?Sized> SourceClientExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::octopus::Environment;
    use serde_json::json;

    #[test]
    fn test_fetch_all_deserializes_items() {
        let client = MockSourceClient::new().with_collection(
            "Environments",
            vec![
                json!({ "Id": "Environments-1", "Name": "Dev" }),
                json!({ "Id": "Environments-2", "Name": "Prod" }),
            ],
        );

        let environments: Vec<Environment> = client.fetch_all("Environments").unwrap();

        assert_eq!(environments.len(), 2);
        assert_eq!(environments[1].name, "Prod");
    }

    #[test]
    fn test_fetch_by_id_missing_is_none() {
        let client = MockSourceClient::new();

        let environment: Option<Environment> =
            client.fetch_by_id("Environments", "Environments-9").unwrap();

        assert!(environment.is_none());
    }

    #[test]
    fn test_fetch_reports_parse_errors() {
        let client = MockSourceClient::new()
            .with_resource("Environments/Environments-1", json!({ "Id": 5 }));

        let result: Result<Option<Environment>> =
            client.fetch_by_id("Environments", "Environments-1");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Environments/Environments-1"));
    }
}
