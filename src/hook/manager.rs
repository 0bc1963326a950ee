//! The instance hook manager.
//!
//! [`HookManager`] is the public contract the shims are written against: override one virtual
//! method on one instance, call the original implementation from inside the interceptor, reset
//! the override, and query or force-clear the hooks of an instance.
//!
//! # State Machine
//!
//! Every instance is either `Unhooked` (dispatching through its class table) or `Hooked(n)`
//! (dispatching through a private ghost table with `n` distinct overridden slots). The first
//! override moves an instance to `Hooked(1)`, resetting the last override or clearing the
//! ghost table moves it back to `Unhooked`. Each transition happens while the registry shard of
//! that instance is held, so it is atomic with respect to every other registry operation.
//!
//! # Failure Semantics
//!
//! Every failing operation leaves the instance exactly as it was. A failed override means the
//! toolkit behaviour stays in place.
//!
//! # Examples
//!
//! ```rust
//! use shimhook::HookManager;
//! use shimhook::toolkit::{Size, Window, WindowType};
//!
//! let hooks = HookManager::global();
//! let window = Window::new("demo", WindowType::Window)?;
//!
//! hooks.override_method(&window, &Window::RESIZE, |w: &Window, size: Size| {
//!     let clamped = Size::new(size.width.max(64), size.height.max(64));
//!     let _ = HookManager::global().call_original(w, &Window::RESIZE, clamped);
//! })?;
//!
//! window.resize(Size::new(10, 10))?;
//! assert_eq!(window.size(), Size::new(64, 64));
//!
//! hooks.reset(&window, &Window::RESIZE)?;
//! assert!(!hooks.has_ghost_table(&window));
//! # Ok::<(), shimhook::Error>(())
//! ```

use std::sync::OnceLock;

use dashmap::mapref::entry::Entry as MapEntry;

use crate::{
    config::HookConfig,
    dispatch::{
        resolve_slot, Entry, EntryLocation, Hookable, InstanceId, Method, ObjectHeader, SlotIndex,
    },
    hook::{ghost::Installed, GhostTable, HookGuard, Registry},
    Error, Result,
};

static GLOBAL: OnceLock<HookManager> = OnceLock::new();

/// Installs, invokes and removes per-instance method overrides.
///
/// All managers share the process-wide [`Registry`]; they differ only in their
/// [`HookConfig`].
#[derive(Debug)]
pub struct HookManager {
    config: HookConfig,
    registry: &'static Registry,
}

impl HookManager {
    /// The process-wide manager with the default configuration
    pub fn global() -> &'static HookManager {
        GLOBAL.get_or_init(|| HookManager::new(HookConfig::default()))
    }

    /// Creates a manager with `config`, sharing the process-wide registry
    #[must_use]
    pub fn new(config: HookConfig) -> Self {
        HookManager {
            config,
            registry: Registry::global(),
        }
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// The registry backing this manager
    #[must_use]
    pub fn registry(&self) -> &'static Registry {
        self.registry
    }

    /// Redirects `method` on `instance` to `interceptor`.
    ///
    /// Afterwards every virtual call through `method` on `instance` runs `interceptor`; other
    /// instances of the class and other methods of `instance` are unaffected. The interceptor
    /// is responsible for calling [`HookManager::call_original`] if the toolkit behaviour must
    /// be preserved.
    ///
    /// Overriding an already overridden slot follows [`HookConfig::rehook`]; the original
    /// captured at the first install is kept either way.
    ///
    /// # Errors
    ///
    /// - [`Error::NotVirtual`] or [`Error::UnsupportedLayout`] if `method` does not resolve
    /// - [`Error::ForeignThread`] if called off the owner thread while enforcement is on
    /// - [`Error::RehookRejected`] if the slot is overridden and the policy rejects replacing
    /// - [`Error::Allocation`] if the ghost table cannot be allocated
    pub fn override_method<C, A, R, F>(
        &self,
        instance: &C,
        method: &Method<C, A, R>,
        interceptor: F,
    ) -> Result<()>
    where
        C: Hookable + 'static,
        A: 'static,
        R: 'static,
        F: Fn(&C, A) -> R + Send + Sync + 'static,
    {
        let header = instance.header();
        self.check_owner(header)?;
        let slot = self.resolve(header, method)?;
        let interceptor = Entry::new(interceptor);

        // Dropped after the shard guard below; interceptors may own hookable objects
        let _pending = interceptor.clone();
        let mut _displaced = None;

        match self.registry.ghosts().entry(header.id()) {
            MapEntry::Occupied(mut occupied) => {
                let installed = occupied
                    .get_mut()
                    .install(slot, interceptor, self.config.rehook)
                    .inspect_err(|e| {
                        tracing::debug!(instance = %header.id(), method = method.name(), error = %e, "override refused");
                    })?;
                let replaced = matches!(installed, Installed::Replaced(_));
                if let Installed::Replaced(old) = installed {
                    _displaced = Some(old);
                }
                tracing::debug!(
                    instance = %header.id(),
                    class = header.class_name(),
                    method = method.name(),
                    %slot,
                    replaced,
                    overrides = occupied.get().override_count(),
                    "installed override"
                );
            }
            MapEntry::Vacant(vacant) => {
                let mut ghost = GhostTable::new(header)?;
                ghost.install(slot, interceptor, self.config.rehook)?;
                ghost.attach();
                tracing::debug!(
                    instance = %header.id(),
                    class = header.class_name(),
                    method = method.name(),
                    %slot,
                    table = %ghost.table().id(),
                    "installed ghost table"
                );
                vacant.insert(ghost);
            }
        }
        Ok(())
    }

    /// Installs an override that is reset when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Same as [`HookManager::override_method`].
    pub fn scoped_override<'a, C, A, R, F>(
        &'a self,
        instance: &'a C,
        method: &Method<C, A, R>,
        interceptor: F,
    ) -> Result<HookGuard<'a, C, A, R>>
    where
        C: Hookable + 'static,
        A: 'static,
        R: 'static,
        F: Fn(&C, A) -> R + Send + Sync + 'static,
    {
        self.override_method(instance, method, interceptor)?;
        Ok(HookGuard::new(self, instance, *method))
    }

    /// Invokes the original implementation of `method` on `instance`.
    ///
    /// For an overridden slot this is the class entry captured at the first install. For an
    /// unhooked instance it is the class table's current entry. For a hooked instance whose
    /// slot is not overridden the class entry is used as long as the ghost copy still agrees
    /// with it.
    ///
    /// # Errors
    ///
    /// - [`Error::NotVirtual`] or [`Error::UnsupportedLayout`] if `method` does not resolve
    /// - [`Error::UnknownOriginal`] if the class table was patched after the ghost was made
    /// - [`Error::SignatureMismatch`] if the original was built for another signature
    pub fn call_original<C, A, R>(&self, instance: &C, method: &Method<C, A, R>, args: A) -> Result<R>
    where
        C: Hookable + 'static,
        A: 'static,
        R: 'static,
    {
        let header = instance.header();
        let slot = self.resolve(header, method)?;
        let original = self.original_entry(header, slot)?;

        if self.config.trace_dispatch {
            tracing::trace!(instance = %header.id(), method = method.name(), %slot, "calling original");
        }
        // No registry or table lock is held here
        original.invoke(method, slot, instance, args)
    }

    /// Restores the original implementation of `method` on `instance`.
    ///
    /// When the last override goes, the ghost table is released and the instance dispatches
    /// through its class table again. Resetting a method that is not overridden is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::NotVirtual`] or [`Error::UnsupportedLayout`] if `method` does not resolve
    /// - [`Error::ForeignThread`] if called off the owner thread while enforcement is on
    pub fn reset<C, A, R>(&self, instance: &C, method: &Method<C, A, R>) -> Result<()>
    where
        C: Hookable + 'static,
        A: 'static,
        R: 'static,
    {
        let header = instance.header();
        self.check_owner(header)?;
        let slot = self.resolve(header, method)?;

        // Declared before the guard so the removed interceptor drops after the shard is released
        let _displaced;
        let MapEntry::Occupied(mut occupied) = self.registry.ghosts().entry(header.id()) else {
            return Ok(());
        };
        match occupied.get_mut().restore(slot) {
            Some(displaced) => _displaced = displaced,
            None => return Ok(()),
        }

        tracing::debug!(instance = %header.id(), method = method.name(), %slot, "reset override");
        if occupied.get().is_empty() {
            let ghost = occupied.remove();
            tracing::debug!(instance = %header.id(), table = %ghost.table().id(), "released ghost table");
        }
        Ok(())
    }

    /// Returns true if `instance` dispatches through a ghost table
    #[must_use]
    pub fn has_ghost_table<C: Hookable>(&self, instance: &C) -> bool {
        self.registry.contains(instance.header().id())
    }

    /// Drops every override on `instance` at once.
    ///
    /// Safe to call on an unhooked instance and safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignThread`] if called off the owner thread while enforcement is on.
    pub fn clear_ghost_table<C: Hookable>(&self, instance: &C) -> Result<()> {
        let header = instance.header();
        self.check_owner(header)?;
        self.clear_ghost_table_by_id(header.id());
        Ok(())
    }

    /// Drops every override of the instance behind `instance`, by handle.
    ///
    /// Meant for destroyed callbacks, which only receive the handle. Returns true if a ghost
    /// table was released.
    pub fn clear_ghost_table_by_id(&self, instance: InstanceId) -> bool {
        let released = self.registry.release(instance);
        if released {
            tracing::debug!(%instance, "cleared ghost table");
        }
        released
    }

    /// Returns true if `method` is overridden on `instance`.
    ///
    /// # Errors
    ///
    /// Returns the resolution error if `method` does not resolve.
    pub fn is_overridden<C, A, R>(&self, instance: &C, method: &Method<C, A, R>) -> Result<bool>
    where
        C: Hookable,
    {
        let header = instance.header();
        let slot = self.resolve(header, method)?;
        Ok(self
            .registry
            .with_ghost(header.id(), |ghost| ghost.get(slot).is_some())
            .unwrap_or(false))
    }

    /// Number of distinct overridden slots on `instance`
    #[must_use]
    pub fn override_count<C: Hookable>(&self, instance: &C) -> usize {
        self.registry
            .with_ghost(instance.header().id(), GhostTable::override_count)
            .unwrap_or(0)
    }

    /// Overridden slots of `instance` in ascending order
    #[must_use]
    pub fn overridden_slots<C: Hookable>(&self, instance: &C) -> Vec<SlotIndex> {
        self.registry
            .with_ghost(instance.header().id(), GhostTable::overridden_slots)
            .unwrap_or_default()
    }

    /// Handles of every hooked instance in the process
    #[must_use]
    pub fn hooked_instances(&self) -> Vec<InstanceId> {
        self.registry.instances()
    }

    /// Where `instance` currently finds its entry for `method`.
    ///
    /// # Errors
    ///
    /// Returns the resolution error if `method` does not resolve.
    pub fn entry_location<C, A, R>(&self, instance: &C, method: &Method<C, A, R>) -> Result<EntryLocation>
    where
        C: Hookable,
    {
        let header = instance.header();
        let slot = self.resolve(header, method)?;
        let table = header.current_table();
        Ok(EntryLocation {
            table: table.id(),
            slot,
            ghost: table.id() != header.class_table().id(),
        })
    }

    fn resolve<C, A, R>(&self, header: &ObjectHeader, method: &Method<C, A, R>) -> Result<SlotIndex> {
        resolve_slot(header.layout(), method.ptr()).inspect_err(|e| {
            tracing::debug!(class = header.class_name(), method = method.name(), error = %e, "slot resolution failed");
        })
    }

    fn check_owner(&self, header: &ObjectHeader) -> Result<()> {
        if self.config.enforce_owner_thread && !header.is_owner_thread() {
            tracing::warn!(instance = %header.id(), class = header.class_name(), "hook mutation from a foreign thread");
            return Err(Error::ForeignThread {
                instance: header.id(),
            });
        }
        Ok(())
    }

    fn original_entry(&self, header: &ObjectHeader, slot: SlotIndex) -> Result<Entry> {
        let recorded = self
            .registry
            .with_ghost(header.id(), |ghost| (ghost.original(slot), ghost.table().entry(slot)));
        let class_entry = header.class_table().entry(slot).ok_or_else(|| {
            unsupported_layout!("slot {} missing from the class table of {}", slot, header.class_name())
        })?;

        match recorded {
            None => Ok(class_entry),
            Some((Some(original), _)) => Ok(original),
            Some((None, Some(copy))) if copy.same_as(&class_entry) => Ok(class_entry),
            Some((None, _)) => {
                tracing::warn!(
                    instance = %header.id(),
                    class = header.class_name(),
                    %slot,
                    "class table changed since the ghost table was made, no unambiguous original"
                );
                Err(Error::UnknownOriginal {
                    class: header.class_name(),
                    slot,
                })
            }
        }
    }
}
