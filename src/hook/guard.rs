//! Scoped overrides.

use crate::{
    dispatch::{Hookable, Method},
    hook::HookManager,
};

/// Resets an override when dropped.
///
/// Returned by [`HookManager::scoped_override`]. Useful when an interceptor must only be active
/// for the duration of one operation, for example while a drag is in progress.
///
/// # Examples
///
/// ```rust
/// use shimhook::HookManager;
/// use shimhook::toolkit::{Size, Window, WindowType};
///
/// let hooks = HookManager::global();
/// let window = Window::new("scoped", WindowType::Window)?;
/// {
///     let _guard = hooks.scoped_override(&window, &Window::RESIZE, |_: &Window, _: Size| {})?;
///     window.resize(Size::new(300, 200))?;
///     assert_ne!(window.size(), Size::new(300, 200));
/// }
/// assert!(!hooks.has_ghost_table(&window));
/// # Ok::<(), shimhook::Error>(())
/// ```
#[must_use = "the override is reset as soon as the guard is dropped"]
pub struct HookGuard<'a, C, A, R>
where
    C: Hookable + 'static,
    A: 'static,
    R: 'static,
{
    manager: &'a HookManager,
    instance: &'a C,
    method: Method<C, A, R>,
}

impl<'a, C, A, R> HookGuard<'a, C, A, R>
where
    C: Hookable + 'static,
    A: 'static,
    R: 'static,
{
    pub(crate) fn new(manager: &'a HookManager, instance: &'a C, method: Method<C, A, R>) -> Self {
        HookGuard {
            manager,
            instance,
            method,
        }
    }

    /// The guarded method
    #[must_use]
    pub fn method(&self) -> &Method<C, A, R> {
        &self.method
    }
}

impl<C, A, R> Drop for HookGuard<'_, C, A, R>
where
    C: Hookable + 'static,
    A: 'static,
    R: 'static,
{
    fn drop(&mut self) {
        if let Err(e) = self.manager.reset(self.instance, &self.method) {
            tracing::warn!(method = self.method.name(), error = %e, "failed to reset scoped override");
        }
    }
}
