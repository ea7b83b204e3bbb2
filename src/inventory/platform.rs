//! Source B: the DNS management platform's GSLB map inventory.
//!
//! The zone listing is paginated. Every page carries `resources` (each with a
//! `gmaps` array of domain names) and `total_size`; pages are requested with
//! an incrementing `page_num` until `ceil(total_size / page_size)` pages have
//! been read.

use crate::core::{InventorySource, RecordType};
use crate::inventory::client::{get_json, Credentials};
use crate::inventory::{Inventory, InventoryError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ZonePage {
    #[serde(default)]
    resources: Option<Vec<ZoneResource>>,
    #[serde(deserialize_with = "count_from_number_or_string")]
    total_size: u64,
    #[serde(default, deserialize_with = "optional_count")]
    page_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ZoneResource {
    #[serde(default)]
    gmaps: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn into_count<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

fn count_from_number_or_string<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    NumberOrString::deserialize(de)?.into_count()
}

fn optional_count<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u64>, D::Error> {
    Option::<NumberOrString>::deserialize(de)?
        .map(NumberOrString::into_count)
        .transpose()
}

/// Fetches Source B's inventory by walking the paginated zone listing.
pub struct PagedZoneSource {
    client: Client,
    url: String,
    credentials: Credentials,
    page_size: u64,
    record_type: RecordType,
}

impl PagedZoneSource {
    /// # Arguments
    /// * `url` - The zone listing endpoint, e.g. `https://dns.example:20120/views/ADD/dzone`.
    /// * `record_type` - The type every GSLB map name is filed under.
    pub fn new(
        client: Client,
        url: impl Into<String>,
        credentials: Credentials,
        page_size: u64,
        record_type: RecordType,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            credentials,
            page_size: page_size.max(1),
            record_type,
        }
    }

    async fn fetch_page(&self, page_num: u64) -> Result<ZonePage, InventoryError> {
        let query = [
            ("page_num", page_num.to_string()),
            ("page_size", self.page_size.to_string()),
            ("with_add", "yes".to_string()),
        ];
        get_json(&self.client, self.name(), &self.url, &self.credentials, &query).await
    }
}

#[async_trait]
impl InventorySource for PagedZoneSource {
    fn name(&self) -> &str {
        "source-b"
    }

    async fn fetch(&self) -> Result<Inventory, InventoryError> {
        let first = self.fetch_page(1).await?;
        let total_size = first.total_size;
        let page_size = first.page_size.filter(|size| *size > 0).unwrap_or(self.page_size);
        let total_pages = total_size.div_ceil(page_size).max(1);
        debug!(total_size, page_size, total_pages, "Paging zone listing");

        let mut names: Vec<String> = Vec::new();
        collect_gmaps(&mut names, first);

        for page_num in 2..=total_pages {
            let page = self.fetch_page(page_num).await?;
            if page.resources.as_ref().map_or(true, Vec::is_empty) {
                debug!(
                    page_num,
                    total_pages, "Zone listing returned an empty page before the advertised end"
                );
                break;
            }
            collect_gmaps(&mut names, page);
        }

        let inventory =
            Inventory::from_entries(names.into_iter().map(|name| (self.record_type, name)));
        info!(entries = inventory.len(), "Loaded Source B inventory");
        Ok(inventory)
    }
}

fn collect_gmaps(names: &mut Vec<String>, page: ZonePage) {
    for resource in page.resources.unwrap_or_default() {
        names.extend(resource.gmaps.unwrap_or_default());
    }
}
