#![allow(dead_code)]
//! A canned inventory source.

use async_trait::async_trait;
use dnsreconcile::core::{InventorySource, RecordType};
use dnsreconcile::inventory::{Inventory, InventoryError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FakeInventorySource {
    name: &'static str,
    inventory: Option<Inventory>,
    fetches: Arc<AtomicU32>,
}

impl FakeInventorySource {
    pub fn new(name: &'static str, entries: &[(RecordType, &str)]) -> Self {
        Self {
            name,
            inventory: Some(Inventory::from_entries(entries.iter().copied())),
            fetches: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A source whose every fetch fails.
    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            inventory: None,
            fetches: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventorySource for FakeInventorySource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self) -> Result<Inventory, InventoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inventory.clone().ok_or_else(|| InventoryError::Invalid {
            source_name: self.name.to_string(),
            reason: "authentication failed".to_string(),
        })
    }
}
