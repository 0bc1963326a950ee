//! Hookable objects.
//!
//! Every hookable object embeds an [`ObjectHeader`], the per-instance part of the dispatch
//! machinery: a process-unique [`InstanceId`] handle, the class-shared table and the table
//! pointer the instance actually dispatches through. Objects implement [`Hookable`] to expose
//! their header and route their virtual calls through [`dispatch`].
//!
//! Dropping the header is the object's destruction notification. Registered
//! [`ObjectHeader::on_destroyed`] callbacks run first, then any ghost table still registered
//! for the instance is released, so a hook can never outlive the object it was installed on.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    thread::{self, ThreadId},
};

use crate::{
    dispatch::{
        layout::ClassLayout,
        resolver::resolve_slot,
        table::{Method, VTable},
    },
    hook::Registry,
    Result,
};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Handle identifying one hookable object for its whole lifetime.
///
/// Handles are allocated from a process-wide counter and never reused, so a stale handle can
/// never alias a newer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        InstanceId(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw handle value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared cell holding the table an instance dispatches through.
pub type TableCell = Arc<RwLock<Arc<VTable>>>;

type DestroyedCallback = Box<dyn Fn(InstanceId) + Send + Sync>;

/// Per-instance dispatch state embedded in every hookable object.
pub struct ObjectHeader {
    id: InstanceId,
    class_table: Arc<VTable>,
    vptr: TableCell,
    owner: ThreadId,
    destroyed: boxcar::Vec<DestroyedCallback>,
}

impl ObjectHeader {
    /// Creates the header of a new instance of the class `class_table` was built for.
    ///
    /// The calling thread becomes the owner thread of the instance.
    #[must_use]
    pub fn new(class_table: &Arc<VTable>) -> Self {
        ObjectHeader {
            id: InstanceId::next(),
            class_table: class_table.clone(),
            vptr: Arc::new(RwLock::new(class_table.clone())),
            owner: thread::current().id(),
            destroyed: boxcar::Vec::new(),
        }
    }

    /// Handle of this instance
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Layout of the instance's class
    #[must_use]
    pub fn layout(&self) -> &Arc<ClassLayout> {
        self.class_table.layout()
    }

    /// Name of the instance's class
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        self.class_table.layout().name()
    }

    /// The table shared by every instance of the class
    #[must_use]
    pub fn class_table(&self) -> &Arc<VTable> {
        &self.class_table
    }

    /// The table this instance currently dispatches through
    #[must_use]
    pub fn current_table(&self) -> Arc<VTable> {
        read_lock!(self.vptr).clone()
    }

    /// Returns true if the instance dispatches through its class table
    #[must_use]
    pub fn uses_class_table(&self) -> bool {
        self.current_table().id() == self.class_table.id()
    }

    /// The thread that created the instance
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Returns true if called from the owner thread
    #[must_use]
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Registers a callback invoked when the instance is destroyed.
    ///
    /// Callbacks run in registration order, before the instance's hooks are released.
    pub fn on_destroyed<F>(&self, callback: F)
    where
        F: Fn(InstanceId) + Send + Sync + 'static,
    {
        self.destroyed.push(Box::new(callback));
    }

    pub(crate) fn table_cell(&self) -> &TableCell {
        &self.vptr
    }
}

impl fmt::Debug for ObjectHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeader")
            .field("id", &self.id)
            .field("class", &self.class_name())
            .field("table", &self.current_table().id())
            .finish()
    }
}

impl Drop for ObjectHeader {
    fn drop(&mut self) {
        for (_, callback) in self.destroyed.iter() {
            callback(self.id);
        }

        if Registry::global().release(self.id) {
            tracing::debug!(instance = %self.id, class = self.class_name(), "released hooks of destroyed instance");
        }
    }
}

/// An object whose virtual methods dispatch through a swappable table.
pub trait Hookable {
    /// The object's dispatch header
    fn header(&self) -> &ObjectHeader;
}

/// Performs a virtual call of `method` on `receiver`.
///
/// The entry is read from the table the instance currently uses and the table lock is released
/// before the entry runs, so implementations and interceptors may freely call back into the
/// object or the hook manager.
///
/// # Errors
///
/// Returns the resolution error if `method` is not a virtual method of the receiver's class,
/// or [`crate::Error::SignatureMismatch`] if the slot holds an entry of another signature.
pub fn dispatch<C, A, R>(receiver: &C, method: &Method<C, A, R>, args: A) -> Result<R>
where
    C: Hookable + 'static,
    A: 'static,
    R: 'static,
{
    let header = receiver.header();
    let slot = resolve_slot(header.layout(), method.ptr())?;
    let entry = header.current_table().entry(slot).ok_or_else(|| {
        unsupported_layout!(
            "slot {} missing from the table of {}",
            slot,
            header.class_name()
        )
    })?;
    entry.invoke(method, slot, receiver, args)
}
