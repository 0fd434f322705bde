use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::SourceClient;
use crate::model::octopus::Collection;

const API_KEY_HEADER: &str = "X-Octopus-ApiKey";
const PAGE_SIZE: usize = 100;

/// Source client talking to a live server over HTTP
pub struct HttpSourceClient {
    server: Url,
    api_key: String,
    space_id: String,
    http: Client,
}

impl HttpSourceClient {
    pub fn new(server: &str, api_key: &str, space_id: &str) -> Result<Self> {
        let server =
            Url::parse(server).with_context(|| format!("Invalid server URL: {}", server))?;

        Ok(Self {
            server,
            api_key: api_key.to_string(),
            space_id: space_id.to_string(),
            http: Client::new(),
        })
    }

    fn api_root(&self) -> String {
        format!("{}/api", self.server.as_str().trim_end_matches('/'))
    }

    /// URL of a path inside the exported space
    fn space_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let raw = format!(
            "{}/{}/{}",
            self.api_root(),
            self.space_id,
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw).with_context(|| format!("Invalid resource URL: {}", raw))?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }

    /// GET a URL, mapping 404 to `None`
    fn get_json(&self, url: &Url) -> Result<Option<Value>> {
        debug!(url = %url, "GET");

        let response = self
            .http
            .get(url.as_str())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .with_context(|| format!("Failed to fetch URL: {}", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            bail!(
                "HTTP request failed with status {}: {}",
                response.status(),
                url
            );
        }

        let body = response
            .text()
            .with_context(|| format!("Failed to read response body from: {}", url))?;

        serde_json::from_str(&body)
            .map(Some)
            .with_context(|| format!("Failed to parse JSON from: {}", url))
    }
}

impl SourceClient for HttpSourceClient {
    fn get_collection(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<Value>> {
        let mut items: Vec<Value> = Vec::new();

        loop {
            let skip = items.len().to_string();
            let take = PAGE_SIZE.to_string();
            let mut page_query = query.to_vec();
            page_query.push(("skip", skip.as_str()));
            page_query.push(("take", take.as_str()));

            let url = self.space_url(path, &page_query)?;
            let Some(page) = self.get_json(&url)? else {
                return Ok(items);
            };

            let page: Collection<Value> = serde_json::from_value(page)
                .with_context(|| format!("Failed to parse collection from: {}", url))?;

            let received = page.items.len();
            items.extend(page.items);

            if received == 0 || items.len() as u64 >= page.total_results {
                break;
            }
        }

        Ok(items)
    }

    fn get_resource(&self, path: &str) -> Result<Option<Value>> {
        let url = self.space_url(path, &[])?;
        self.get_json(&url)
    }

    fn get_resource_by_id(&self, path: &str, id: &str) -> Result<Option<Value>> {
        self.get_resource(&format!("{}/{}", path.trim_end_matches('/'), id))
    }

    fn get_space(&self) -> Result<Value> {
        let raw = format!("{}/Spaces/{}", self.api_root(), self.space_id);
        let url = Url::parse(&raw).with_context(|| format!("Invalid space URL: {}", raw))?;

        self.get_json(&url)?
            .with_context(|| format!("Space {} was not found", self.space_id))
    }

    fn space_base_url(&self) -> String {
        format!("{}/{}", self.api_root(), self.space_id)
    }
}
