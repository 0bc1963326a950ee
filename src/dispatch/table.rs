//! Dispatch tables and typed method identifiers.
//!
//! A [`VTable`] is the explicit, swappable strategy table every hookable object dispatches
//! through. One table is built per class and shared by all of its instances; the hook manager
//! duplicates it into a private ghost table when an instance gets its first override.
//!
//! Implementations are stored type-erased as [`Entry`] values. An entry is reference counted,
//! so copying a table copies handles, never closures, and entry identity (the equivalent of
//! "same code address") is plain pointer identity.

use std::{
    any::Any,
    fmt,
    marker::PhantomData,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use crate::{
    dispatch::{
        layout::{ClassLayout, SlotIndex},
        methodptr::MethodPtr,
        resolver::resolve_slot,
    },
    Error, Result,
};

/// Shared, typed implementation of one virtual method.
pub type Implementation<C, A, R> = Arc<dyn Fn(&C, A) -> R + Send + Sync>;

/// Typed identifier of a hookable virtual method.
///
/// Bound at compile time by the binding layer: the method name for diagnostics, the encoded
/// [`MethodPtr`] for slot resolution and the signature `Fn(&C, A) -> R` for the entries stored
/// in the slot. Methods taking several arguments use a tuple for `A`.
pub struct Method<C, A, R> {
    name: &'static str,
    ptr: MethodPtr,
    _signature: PhantomData<fn(&C, A) -> R>,
}

impl<C, A, R> Method<C, A, R> {
    /// Creates a method identifier
    #[must_use]
    pub const fn new(name: &'static str, ptr: MethodPtr) -> Self {
        Method {
            name,
            ptr,
            _signature: PhantomData,
        }
    }

    /// Name of the method
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Encoded pointer of the method
    #[must_use]
    pub const fn ptr(&self) -> MethodPtr {
        self.ptr
    }
}

impl<C, A, R> Clone for Method<C, A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, A, R> Copy for Method<C, A, R> {}

impl<C, A, R> fmt::Debug for Method<C, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("ptr", &self.ptr)
            .finish()
    }
}

/// Type-erased implementation stored in a dispatch-table slot.
#[derive(Clone)]
pub struct Entry(Arc<dyn Any + Send + Sync>);

impl Entry {
    /// Wraps an implementation of the signature `Fn(&C, A) -> R`
    pub fn new<C, A, R, F>(f: F) -> Self
    where
        C: 'static,
        A: 'static,
        R: 'static,
        F: Fn(&C, A) -> R + Send + Sync + 'static,
    {
        let implementation: Implementation<C, A, R> = Arc::new(f);
        Entry(Arc::new(implementation))
    }

    /// Returns true if both entries are the same implementation.
    #[must_use]
    pub fn same_as(&self, other: &Entry) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the typed implementation, or `None` if the signature differs.
    #[must_use]
    pub fn implementation<C, A, R>(&self) -> Option<Implementation<C, A, R>>
    where
        C: 'static,
        A: 'static,
        R: 'static,
    {
        self.0.downcast_ref::<Implementation<C, A, R>>().cloned()
    }

    /// Invokes the entry on `receiver`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignatureMismatch`] if the entry was built for another signature.
    pub fn invoke<C, A, R>(
        &self,
        method: &Method<C, A, R>,
        slot: SlotIndex,
        receiver: &C,
        args: A,
    ) -> Result<R>
    where
        C: 'static,
        A: 'static,
        R: 'static,
    {
        let implementation = self
            .implementation::<C, A, R>()
            .ok_or(Error::SignatureMismatch {
                method: method.name(),
                slot,
            })?;
        Ok(implementation(receiver, args))
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry({:p})", Arc::as_ptr(&self.0))
    }
}

static NEXT_TABLE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(u64);

impl TableId {
    fn next() -> Self {
        TableId(NEXT_TABLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vt#{}", self.0)
    }
}

/// Where the entry for a method lives for one specific instance.
///
/// The safe counterpart of "the address of the table entry": the table the instance currently
/// dispatches through and the slot inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocation {
    /// The table the instance currently dispatches through
    pub table: TableId,
    /// The slot inside that table
    pub slot: SlotIndex,
    /// True if `table` is the instance's private ghost table
    pub ghost: bool,
}

/// A dispatch table: one [`Entry`] per slot of a [`ClassLayout`].
pub struct VTable {
    id: TableId,
    layout: Arc<ClassLayout>,
    entries: RwLock<Vec<Entry>>,
}

impl VTable {
    /// Starts building the class-shared table for `layout`
    #[must_use]
    pub fn builder(layout: &Arc<ClassLayout>) -> VTableBuilder {
        VTableBuilder {
            layout: layout.clone(),
            entries: vec![None; layout.len()],
        }
    }

    /// Identity of this table
    #[must_use]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// The layout this table is shaped after
    #[must_use]
    pub fn layout(&self) -> &Arc<ClassLayout> {
        &self.layout
    }

    /// Number of slots
    #[must_use]
    pub fn len(&self) -> usize {
        read_lock!(self.entries).len()
    }

    /// Returns true if the table has no slots
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The entry currently stored in `slot`
    #[must_use]
    pub fn entry(&self, slot: SlotIndex) -> Option<Entry> {
        read_lock!(self.entries).get(slot.index()).cloned()
    }

    /// Replaces the entry in `slot`, returning the previous one.
    ///
    /// Returns `None` and leaves the table unchanged if `slot` is out of range.
    pub fn patch(&self, slot: SlotIndex, entry: Entry) -> Option<Entry> {
        let mut entries = write_lock!(self.entries);
        let target = entries.get_mut(slot.index())?;
        Some(std::mem::replace(target, entry))
    }

    /// Creates an independent copy with a fresh identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the entry storage cannot be reserved.
    pub fn duplicate(&self) -> Result<VTable> {
        let entries = read_lock!(self.entries);
        let mut copy = Vec::new();
        copy.try_reserve_exact(entries.len())?;
        copy.extend(entries.iter().cloned());

        Ok(VTable {
            id: TableId::next(),
            layout: self.layout.clone(),
            entries: RwLock::new(copy),
        })
    }
}

impl fmt::Debug for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VTable")
            .field("id", &self.id)
            .field("class", &self.layout.name())
            .field("slots", &self.len())
            .finish()
    }
}

/// Builder for class-shared [`VTable`]s.
pub struct VTableBuilder {
    layout: Arc<ClassLayout>,
    entries: Vec<Option<Entry>>,
}

impl VTableBuilder {
    /// Installs the built-in implementation of `method`.
    ///
    /// # Errors
    ///
    /// Returns the resolution error if `method` does not name a virtual slot of the layout, or
    /// [`Error::UnsupportedLayout`] if the slot it resolves to declares a different method.
    pub fn implement<C, A, R, F>(mut self, method: &Method<C, A, R>, f: F) -> Result<Self>
    where
        C: 'static,
        A: 'static,
        R: 'static,
        F: Fn(&C, A) -> R + Send + Sync + 'static,
    {
        let slot = resolve_slot(&self.layout, method.ptr())?;
        let declared = self.layout.slot(slot).map(|decl| decl.name);
        if declared != Some(method.name()) {
            return Err(unsupported_layout!(
                "{} resolves to slot {} of {}, which declares {:?}",
                method.name(),
                slot,
                self.layout.name(),
                declared
            ));
        }
        self.entries[slot.index()] = Some(Entry::new(f));
        Ok(self)
    }

    /// Fills every still-empty slot with the matching entry of `base`.
    ///
    /// Slots are matched by declaring class and method name, so entries land in the right
    /// place even when `base` sits behind a this-adjustment in this layout.
    #[must_use]
    pub fn inherit(mut self, base: &VTable) -> Self {
        for (index, decl) in self.layout.slots().iter().enumerate() {
            if self.entries[index].is_some() {
                continue;
            }
            if let Some(slot) = base.layout().find_slot(decl.declaring, decl.name) {
                self.entries[index] = base.entry(slot);
            }
        }
        self
    }

    /// Finishes the table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unimplemented`] naming the first slot without an entry.
    pub fn build(self) -> Result<Arc<VTable>> {
        let mut entries = Vec::with_capacity(self.entries.len());
        for (index, entry) in self.entries.into_iter().enumerate() {
            match entry {
                Some(entry) => entries.push(entry),
                None => {
                    return Err(Error::Unimplemented {
                        class: self.layout.name(),
                        method: self.layout.slots()[index].name,
                    })
                }
            }
        }

        Ok(Arc::new(VTable {
            id: TableId::next(),
            layout: self.layout,
            entries: RwLock::new(entries),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::layouts;

    struct Dummy;

    const EVENT: Method<Dummy, u32, u32> = Method::new("event", MethodPtr::virtual_slot("Object", 0));
    const TIMER: Method<Dummy, (), &'static str> =
        Method::new("timer_event", MethodPtr::virtual_slot("Object", 1));

    fn object_table() -> Arc<VTable> {
        VTable::builder(&layouts::object())
            .implement(&EVENT, |_, n| n + 1)
            .unwrap()
            .implement(&TIMER, |_, ()| "object")
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_every_slot() {
        let result = VTable::builder(&layouts::object())
            .implement(&EVENT, |_, n| n)
            .unwrap()
            .build();
        match result {
            Err(Error::Unimplemented { class, method }) => {
                assert_eq!(class, "Object");
                assert_eq!(method, "timer_event");
            }
            other => panic!("expected Unimplemented, got {other:?}"),
        }
    }

    #[test]
    fn test_implement_rejects_misplaced_method() {
        // `timer_event` sits at index 1, not 0
        let misplaced: Method<Dummy, (), &'static str> =
            Method::new("timer_event", MethodPtr::virtual_slot("Object", 0));
        let result = VTable::builder(&layouts::object()).implement(&misplaced, |_, ()| "x");
        assert!(matches!(result, Err(Error::UnsupportedLayout { .. })));
    }

    #[test]
    fn test_invoke_and_signature_mismatch() {
        let table = object_table();
        let slot = SlotIndex::new(0);
        let entry = table.entry(slot).unwrap();
        assert_eq!(entry.invoke(&EVENT, slot, &Dummy, 41).unwrap(), 42);

        let wrong: Method<Dummy, u32, bool> = Method::new("event", EVENT.ptr());
        assert!(matches!(
            entry.invoke(&wrong, slot, &Dummy, 1),
            Err(Error::SignatureMismatch { method: "event", .. })
        ));
    }

    #[test]
    fn test_duplicate_shares_entries_not_storage() {
        let table = object_table();
        let copy = table.duplicate().unwrap();
        assert_ne!(copy.id(), table.id());
        assert_eq!(copy.len(), table.len());

        let slot = SlotIndex::new(1);
        assert!(copy.entry(slot).unwrap().same_as(&table.entry(slot).unwrap()));

        let patched = Entry::new(|_: &Dummy, _: ()| "patched");
        let previous = copy.patch(slot, patched.clone()).unwrap();
        assert!(previous.same_as(&table.entry(slot).unwrap()));
        assert!(copy.entry(slot).unwrap().same_as(&patched));
        assert!(!table.entry(slot).unwrap().same_as(&patched));
    }

    #[test]
    fn test_patch_out_of_range() {
        let table = object_table();
        let entry = Entry::new(|_: &Dummy, n: u32| n);
        assert!(table.patch(SlotIndex::new(99), entry).is_none());
    }

    #[test]
    fn test_inherit_matches_by_declaration() {
        let base = object_table();
        let derived = VTable::builder(&layouts::repeated_base())
            .inherit(&base)
            .build();
        // The secondary copy of Object is filled from the same base entries
        let derived = derived.unwrap();
        let layout = derived.layout().clone();
        for (index, decl) in layout.slots().iter().enumerate() {
            let expected = base.layout().find_slot(decl.declaring, decl.name).unwrap();
            assert!(derived
                .entry(SlotIndex::new(index))
                .unwrap()
                .same_as(&base.entry(expected).unwrap()));
        }
    }
}
