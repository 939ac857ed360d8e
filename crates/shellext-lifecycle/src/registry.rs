//! Extension registry: the record set, the enable order, and the
//! versions of unloaded extensions.
//!
//! The registry does no locking of its own; the manager owns it behind a
//! single mutex and is its only writer.

use std::collections::HashMap;

use tracing::{debug, info};

use shellext_core::error::ExtensionError;
use shellext_core::types::{ExtensionOrigin, ExtensionState, MetadataVersion};

use crate::record::ExtensionRecord;

/// Registry of every known extension.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    /// Extension id → record.
    records: HashMap<String, ExtensionRecord>,
    /// Ids in the order they were first discovered. Survives reloads.
    discovery: Vec<String>,
    /// Ids of active extensions, in activation order.
    enable_order: Vec<String>,
    /// Id → version of per-user extensions whose code was imported and then unloaded.
    unloaded_versions: HashMap<String, Option<MetadataVersion>>,
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record.
    pub fn insert(&mut self, record: ExtensionRecord) -> Result<(), ExtensionError> {
        if let Some(existing) = self.records.get(&record.uuid) {
            return Err(ExtensionError::DuplicateId {
                uuid: record.uuid.clone(),
                existing: existing.dir.clone(),
            });
        }

        debug!(uuid = %record.uuid, path = %record.dir.display(), "Registering extension");

        if !self.discovery.contains(&record.uuid) {
            self.discovery.push(record.uuid.clone());
        }
        self.records.insert(record.uuid.clone(), record);

        Ok(())
    }

    /// Removes a record. Its discovery position is kept so a reload
    /// registers it in the same place.
    pub fn remove(&mut self, uuid: &str) -> Option<ExtensionRecord> {
        self.remove_enabled(uuid);
        self.records.remove(uuid)
    }

    /// Gets a record by id.
    pub fn get(&self, uuid: &str) -> Option<&ExtensionRecord> {
        self.records.get(uuid)
    }

    /// Gets a mutable record by id.
    pub fn get_mut(&mut self, uuid: &str) -> Option<&mut ExtensionRecord> {
        self.records.get_mut(uuid)
    }

    /// Checks whether a record is registered.
    pub fn contains(&self, uuid: &str) -> bool {
        self.records.contains_key(uuid)
    }

    /// State of a record, if registered.
    pub fn state(&self, uuid: &str) -> Option<ExtensionState> {
        self.records.get(uuid).map(|r| r.state())
    }

    /// Registered ids in discovery order.
    pub fn uuids(&self) -> Vec<String> {
        self.discovery
            .iter()
            .filter(|uuid| self.records.contains_key(*uuid))
            .cloned()
            .collect()
    }

    /// Records in discovery order.
    pub fn records(&self) -> impl Iterator<Item = &ExtensionRecord> {
        self.discovery.iter().filter_map(|uuid| self.records.get(uuid))
    }

    /// Position of `uuid` in discovery order.
    pub fn discovery_index(&self, uuid: &str) -> Option<usize> {
        self.discovery.iter().position(|u| u == uuid)
    }

    /// Active ids in activation order.
    pub fn enable_order(&self) -> &[String] {
        &self.enable_order
    }

    /// Appends an id to the enable order. Ignores ids already present.
    pub fn push_enabled(&mut self, uuid: &str) {
        if !self.enable_order.iter().any(|u| u == uuid) {
            self.enable_order.push(uuid.to_string());
        }
    }

    /// Removes an id from the enable order.
    pub fn remove_enabled(&mut self, uuid: &str) {
        self.enable_order.retain(|u| u != uuid);
    }

    /// Ids enabled after `uuid`, in activation order.
    pub fn downstream_of(&self, uuid: &str) -> Option<Vec<String>> {
        let idx = self.enable_order.iter().position(|u| u == uuid)?;
        Some(self.enable_order[idx + 1..].to_vec())
    }

    /// Remembers the version of an unloaded extension whose code stays
    /// resident for the rest of the process.
    pub fn note_unloaded(&mut self, record: &ExtensionRecord) {
        if record.origin == ExtensionOrigin::PerUser && record.imported {
            info!(
                uuid = %record.uuid,
                version = ?record.metadata.version,
                "Remembering unloaded extension version"
            );
            self.unloaded_versions
                .insert(record.uuid.clone(), record.metadata.version.clone());
        }
    }

    /// Checks the duplicate-version guard for a record about to load.
    ///
    /// A matching version clears the entry; a different one is a conflict.
    pub fn check_unloaded_version(
        &mut self,
        uuid: &str,
        version: &Option<MetadataVersion>,
    ) -> Result<(), ExtensionError> {
        match self.unloaded_versions.get(uuid) {
            None => Ok(()),
            Some(loaded) if loaded == version => {
                self.unloaded_versions.remove(uuid);
                Ok(())
            }
            Some(loaded) => Err(ExtensionError::VersionConflict {
                uuid: uuid.to_string(),
                loaded: loaded.clone(),
                requested: version.clone(),
            }),
        }
    }

    /// Drops the unloaded-version entry once a record loaded cleanly.
    pub fn forget_unloaded(&mut self, uuid: &str) {
        self.unloaded_versions.remove(uuid);
    }
}
