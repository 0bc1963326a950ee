//! Process-wide registry of hooked instances.
//!
//! The [`Registry`] maps an [`InstanceId`] to the [`GhostTable`] of that instance. It answers
//! whether an instance is hooked, routes `call_original` lookups and lets the destruction path
//! force-release an instance's ghost table by handle alone.
//!
//! # Thread Safety
//!
//! The registry is backed by a sharded [`DashMap`], so instances owned by different threads
//! can be hooked and unhooked concurrently without contending on a single lock. Shard guards
//! are only ever held for the duration of a table lookup or mutation and never while an
//! interceptor or original implementation runs.
//!
//! # Lifecycle
//!
//! Entries are inserted by the first override on an instance and removed when the last
//! override is reset, when the ghost table is cleared, or when the instance is destroyed.
//! Removing an entry drops the [`GhostTable`], which restores the instance's class table.

use std::sync::OnceLock;

use dashmap::DashMap;

use crate::{dispatch::InstanceId, hook::GhostTable};

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Mapping from hooked instances to their ghost tables.
#[derive(Debug, Default)]
pub struct Registry {
    ghosts: DashMap<InstanceId, GhostTable>,
}

impl Registry {
    /// The process-wide registry
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::default)
    }

    /// Returns true if `instance` currently owns a ghost table
    #[must_use]
    pub fn contains(&self, instance: InstanceId) -> bool {
        self.ghosts.contains_key(&instance)
    }

    /// Number of hooked instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    /// Returns true if no instance is hooked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    /// Handles of all hooked instances, in no particular order
    #[must_use]
    pub fn instances(&self) -> Vec<InstanceId> {
        self.ghosts.iter().map(|entry| *entry.key()).collect()
    }

    /// Runs `f` on the ghost table of `instance` while holding its shard for reading.
    ///
    /// `f` must not call back into the registry or invoke any table entry.
    pub fn with_ghost<T>(&self, instance: InstanceId, f: impl FnOnce(&GhostTable) -> T) -> Option<T> {
        self.ghosts.get(&instance).map(|ghost| f(&ghost))
    }

    /// Drops the ghost table of `instance`, restoring its class table.
    ///
    /// Returns true if a ghost table was released. Calling this for an unhooked instance is a
    /// no-op.
    pub fn release(&self, instance: InstanceId) -> bool {
        // The shard guard is gone once `remove` returns, the ghost drops afterwards
        let removed = self.ghosts.remove(&instance);
        removed.is_some()
    }

    pub(crate) fn ghosts(&self) -> &DashMap<InstanceId, GhostTable> {
        &self.ghosts
    }
}
