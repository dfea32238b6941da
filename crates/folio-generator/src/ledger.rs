//! The resource ledger: one row per produced route.
//!
//! Read by sitemap generation and cache-header logic, written at the end of a
//! build or opportunistically while serving.

use std::{collections::BTreeMap, fs, path::Path};

use chrono::{SecondsFormat, Utc};
use folio_core::ResourceType;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Ledger persistence errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// One produced route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Route without a leading slash.
    pub route: String,

    #[serde(rename = "type")]
    pub resource_type: ResourceType,

    /// Content hash; empty for pages.
    pub hash: String,

    /// RFC 3339 timestamp.
    pub lastmod: String,
}

impl LedgerEntry {
    /// Create an entry stamped with the current time.
    pub fn new(route: &str, resource_type: ResourceType, hash: impl Into<String>) -> Self {
        Self {
            route: route.trim_start_matches('/').to_string(),
            resource_type,
            hash: hash.into(),
            lastmod: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Shared table of produced routes, unique by route.
///
/// Every bulk insert happens under one write lock, so readers see either
/// none or all of it.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    entries: RwLock<BTreeMap<String, LedgerEntry>>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a persisted ledger. A missing file yields an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let entries: Vec<LedgerEntry> = serde_json::from_slice(&fs::read(path)?)?;
        debug!(path = %path.display(), count = entries.len(), "loaded ledger");
        let ledger = Self::new();
        ledger.insert_many(entries);
        Ok(ledger)
    }

    /// Persist the ledger as a JSON array ordered by route.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&self.all())?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Insert or replace the entry for its route.
    pub fn upsert(&self, entry: LedgerEntry) {
        self.entries.write().insert(entry.route.clone(), entry);
    }

    /// Insert a batch of entries under a single lock.
    pub fn insert_many(&self, entries: impl IntoIterator<Item = LedgerEntry>) {
        let mut table = self.entries.write();
        for entry in entries {
            table.insert(entry.route.clone(), entry);
        }
    }

    pub fn get(&self, route: &str) -> Option<LedgerEntry> {
        self.entries
            .read()
            .get(route.trim_start_matches('/'))
            .cloned()
    }

    /// All entries of one resource type, ordered by route.
    pub fn list_by_type(&self, resource_type: ResourceType) -> Vec<LedgerEntry> {
        self.entries
            .read()
            .values()
            .filter(|e| e.resource_type == resource_type)
            .cloned()
            .collect()
    }

    /// All entries, ordered by route.
    pub fn all(&self) -> Vec<LedgerEntry> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
