use anyhow::Result;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

use super::SourceClient;

/// In-memory source client for testing. Records every path it is asked for.
pub struct MockSourceClient {
    collections: HashMap<String, Vec<Value>>,
    resources: HashMap<String, Value>,
    space: Value,
    requests: Mutex<Vec<String>>,
}

impl MockSourceClient {
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
            resources: HashMap::new(),
            space: json!({ "Id": "Spaces-1", "Name": "Default" }),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serve `items` for a collection path; each item is also reachable by id
    pub fn with_collection(mut self, path: &str, items: Vec<Value>) -> Self {
        self.collections.insert(path.to_string(), items);
        self
    }

    /// Serve a single object at an exact path
    pub fn with_resource(mut self, path: &str, value: Value) -> Self {
        self.resources.insert(path.to_string(), value);
        self
    }

    pub fn with_space(mut self, space: Value) -> Self {
        self.space = space;
        self
    }

    /// Every path requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Whether any request started with `prefix`
    pub fn requested(&self, prefix: &str) -> bool {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .any(|path| path.starts_with(prefix))
    }

    fn record(&self, path: String) {
        self.requests.lock().unwrap().push(path);
    }
}

impl Default for MockSourceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceClient for MockSourceClient {
    fn get_collection(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<Value>> {
        let key = if query.is_empty() {
            path.to_string()
        } else {
            let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            format!("{}?{}", path, pairs.join("&"))
        };

        self.record(key.clone());

        Ok(self
            .collections
            .get(&key)
            .or_else(|| self.collections.get(path))
            .cloned()
            .unwrap_or_default())
    }

    fn get_resource(&self, path: &str) -> Result<Option<Value>> {
        self.record(path.to_string());
        Ok(self.resources.get(path).cloned())
    }

    fn get_resource_by_id(&self, path: &str, id: &str) -> Result<Option<Value>> {
        let key = format!("{}/{}", path, id);
        self.record(key.clone());

        if let Some(resource) = self.resources.get(&key) {
            return Ok(Some(resource.clone()));
        }

        Ok(self.collections.get(path).and_then(|items| {
            items
                .iter()
                .find(|item| item.get("Id").and_then(Value::as_str) == Some(id))
                .cloned()
        }))
    }

    fn get_space(&self) -> Result<Value> {
        self.record("Space".to_string());
        Ok(self.space.clone())
    }

    fn space_base_url(&self) -> String {
        "https://octopus.example/api/Spaces-1".to_string()
    }
}
