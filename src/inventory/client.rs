//! Shared HTTP plumbing for the inventory sources.

use crate::config::InventoryConfig;
use crate::inventory::InventoryError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Basic-auth credentials for a platform's management API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Builds the HTTP client both inventory sources share.
pub fn build_http_client(config: &InventoryConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Issues an authenticated GET and decodes the JSON body.
#[instrument(skip(client, credentials, query), fields(source = source_name))]
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    source_name: &str,
    url: &str,
    credentials: &Credentials,
    query: &[(&str, String)],
) -> Result<T, InventoryError> {
    debug!(?query, "Requesting inventory page");
    let response = client
        .get(url)
        .basic_auth(&credentials.username, Some(&credentials.password))
        .query(query)
        .send()
        .await
        .map_err(|error| InventoryError::Transport {
            source_name: source_name.to_string(),
            url: url.to_string(),
            error,
        })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(InventoryError::Status {
            source_name: source_name.to_string(),
            url: url.to_string(),
            status,
        });
    }

    response.json::<T>().await.map_err(|error| InventoryError::Decode {
        source_name: source_name.to_string(),
        url: url.to_string(),
        error,
    })
}
