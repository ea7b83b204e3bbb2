//! Source A: the legacy global traffic manager's wide-IP inventory.
//!
//! The management API exposes one collection per record type at
//! `{base}/{type}` (e.g. `/mgmt/tm/gtm/wideip/a`). Each collection is a JSON
//! object whose optional `items` array lists the wide IPs by `name`.

use crate::core::{InventorySource, RecordType};
use crate::inventory::client::{get_json, Credentials};
use crate::inventory::{Inventory, InventoryError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct WideIpCollection {
    #[serde(default)]
    items: Option<Vec<WideIp>>,
}

#[derive(Debug, Deserialize)]
struct WideIp {
    name: String,
}

/// Fetches Source A's inventory, one request per record type.
pub struct LegacyGtmSource {
    client: Client,
    base_url: String,
    credentials: Credentials,
    record_types: Vec<RecordType>,
}

impl LegacyGtmSource {
    /// # Arguments
    /// * `base_url` - The collection root, e.g. `https://gtm.example/mgmt/tm/gtm/wideip`.
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        credentials: Credentials,
        record_types: Vec<RecordType>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            record_types,
        }
    }

    fn collection_url(&self, record_type: RecordType) -> String {
        format!(
            "{}/{}",
            self.base_url,
            record_type.as_str().to_ascii_lowercase()
        )
    }
}

#[async_trait]
impl InventorySource for LegacyGtmSource {
    fn name(&self) -> &str {
        "source-a"
    }

    async fn fetch(&self) -> Result<Inventory, InventoryError> {
        let mut entries = Vec::new();
        for record_type in &self.record_types {
            let url = self.collection_url(*record_type);
            let collection: WideIpCollection =
                get_json(&self.client, self.name(), &url, &self.credentials, &[]).await?;

            // A type with no wide IPs comes back without an `items` key.
            let items = collection.items.unwrap_or_default();
            debug!(record_type = %record_type, count = items.len(), "Fetched wide IPs");
            entries.extend(items.into_iter().map(|item| (*record_type, item.name)));
        }

        let inventory = Inventory::from_entries(entries);
        info!(entries = inventory.len(), "Loaded Source A inventory");
        Ok(inventory)
    }
}
