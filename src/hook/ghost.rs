//! Per-instance ghost tables.
//!
//! A [`GhostTable`] is the private copy of a class table installed as one instance's table
//! pointer. It records an [`OverrideEntry`] for every slot it redirects, each holding the
//! interceptor and the original class entry captured when the slot was first overridden.
//!
//! Dropping a ghost table puts the class-shared table back into the instance's table cell, so
//! every path that removes a ghost from the registry also restores the instance.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    config::RehookPolicy,
    dispatch::{Entry, InstanceId, ObjectHeader, SlotIndex, TableCell, VTable},
    Error, Result,
};

/// One redirected slot of a ghost table.
#[derive(Debug, Clone)]
pub struct OverrideEntry {
    slot: SlotIndex,
    interceptor: Entry,
    original: Entry,
}

impl OverrideEntry {
    /// The redirected slot
    #[must_use]
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    /// The installed interceptor
    #[must_use]
    pub fn interceptor(&self) -> &Entry {
        &self.interceptor
    }

    /// The class entry captured at the first install on this slot
    #[must_use]
    pub fn original(&self) -> &Entry {
        &self.original
    }
}

/// Entries taken out of a ghost table.
///
/// An interceptor may own hookable objects whose teardown re-enters the registry. Whoever holds
/// a registry shard while editing a ghost table keeps this value until the shard guard is gone.
#[must_use]
#[derive(Debug, Default)]
pub(crate) struct Displaced(Vec<Entry>);

impl Displaced {
    fn push(&mut self, entry: Option<Entry>) {
        self.0.extend(entry);
    }

    /// Number of entries held back
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// Outcome of installing an interceptor into a ghost table.
#[derive(Debug)]
pub(crate) enum Installed {
    /// The slot was not overridden before
    Fresh,
    /// The interceptor of an already overridden slot was swapped out
    Replaced(Displaced),
}

/// Private dispatch table of one hooked instance.
pub struct GhostTable {
    instance: InstanceId,
    class: &'static str,
    table: Arc<VTable>,
    original_table: Arc<VTable>,
    cell: TableCell,
    overrides: BTreeMap<SlotIndex, OverrideEntry>,
}

impl GhostTable {
    /// Copies the class table of `header` without installing the copy yet.
    pub(crate) fn new(header: &ObjectHeader) -> Result<Self> {
        let original_table = header.class_table().clone();
        let table = Arc::new(original_table.duplicate()?);

        Ok(GhostTable {
            instance: header.id(),
            class: header.class_name(),
            table,
            original_table,
            cell: header.table_cell().clone(),
            overrides: BTreeMap::new(),
        })
    }

    /// Makes the instance dispatch through this ghost table.
    pub(crate) fn attach(&self) {
        *write_lock!(self.cell) = self.table.clone();
    }

    /// Redirects `slot` to `interceptor`.
    ///
    /// The original is captured from the class table the first time a slot is overridden and
    /// kept across later replacements. On error `interceptor` is dropped here, so callers under
    /// a registry shard hold their own clone of it.
    pub(crate) fn install(
        &mut self,
        slot: SlotIndex,
        interceptor: Entry,
        policy: RehookPolicy,
    ) -> Result<Installed> {
        if let Some(existing) = self.overrides.get_mut(&slot) {
            if policy == RehookPolicy::Reject {
                return Err(Error::RehookRejected {
                    class: self.class,
                    slot,
                });
            }
            let mut displaced = Displaced::default();
            displaced.push(Some(std::mem::replace(
                &mut existing.interceptor,
                interceptor.clone(),
            )));
            displaced.push(self.table.patch(slot, interceptor));
            return Ok(Installed::Replaced(displaced));
        }

        let original = self.original_table.entry(slot).ok_or_else(|| {
            unsupported_layout!("slot {} missing from the class table of {}", slot, self.class)
        })?;
        self.table.patch(slot, interceptor.clone());
        self.overrides.insert(
            slot,
            OverrideEntry {
                slot,
                interceptor,
                original,
            },
        );
        Ok(Installed::Fresh)
    }

    /// Puts the recorded original back into `slot`.
    ///
    /// Returns the removed interceptor, or `None` if the slot was not overridden.
    pub(crate) fn restore(&mut self, slot: SlotIndex) -> Option<Displaced> {
        let entry = self.overrides.remove(&slot)?;
        let mut displaced = Displaced::default();
        displaced.push(self.table.patch(slot, entry.original));
        displaced.push(Some(entry.interceptor));
        Some(displaced)
    }

    /// The instance this ghost table belongs to
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// The private table
    #[must_use]
    pub fn table(&self) -> &Arc<VTable> {
        &self.table
    }

    /// The class-shared table restored on teardown
    #[must_use]
    pub fn original_table(&self) -> &Arc<VTable> {
        &self.original_table
    }

    /// The override recorded for `slot`
    #[must_use]
    pub fn get(&self, slot: SlotIndex) -> Option<&OverrideEntry> {
        self.overrides.get(&slot)
    }

    /// The original captured for `slot`, if the slot is overridden
    #[must_use]
    pub fn original(&self, slot: SlotIndex) -> Option<Entry> {
        self.overrides.get(&slot).map(|o| o.original.clone())
    }

    /// Number of distinct overridden slots
    #[must_use]
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Overridden slots in ascending order
    #[must_use]
    pub fn overridden_slots(&self) -> Vec<SlotIndex> {
        self.overrides.keys().copied().collect()
    }

    /// Returns true if no slot is overridden anymore
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

impl fmt::Debug for GhostTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GhostTable")
            .field("instance", &self.instance)
            .field("class", &self.class)
            .field("table", &self.table.id())
            .field("overrides", &self.overridden_slots())
            .finish()
    }
}

impl Drop for GhostTable {
    fn drop(&mut self) {
        // Only restore the cell if it still points at this ghost
        if let Ok(mut current) = self.cell.write() {
            if Arc::ptr_eq(&*current, &self.table) {
                *current = self.original_table.clone();
            }
        }
    }
}
