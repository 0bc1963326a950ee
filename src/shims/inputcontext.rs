//! Input panel routing.

use std::sync::Arc;

use crate::{
    hook::HookManager,
    toolkit::{InputContext, Rect},
    Result,
};

/// The session's input method service.
pub trait InputMethodService: Send + Sync {
    /// Shows or hides the on-screen keyboard
    fn set_im_active(&self, active: bool);

    /// Whether the on-screen keyboard is shown
    fn im_active(&self) -> bool;

    /// Screen area covered by the on-screen keyboard
    fn geometry(&self) -> Rect;
}

/// Routes the input panel methods of an [`InputContext`] to an [`InputMethodService`].
pub struct InputContextHook {
    service: Arc<dyn InputMethodService>,
}

impl InputContextHook {
    /// Creates a hook forwarding to `service`
    pub fn new(service: Arc<dyn InputMethodService>) -> Self {
        InputContextHook { service }
    }

    /// Intercepts the input panel methods of `context` through the process-wide manager
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if one of the overrides cannot be installed.
    pub fn install(&self, context: &InputContext) -> Result<()> {
        self.install_with(HookManager::global(), context)
    }

    /// Intercepts the input panel methods of `context` through `hooks`
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if one of the overrides cannot be installed.
    pub fn install_with(&self, hooks: &HookManager, context: &InputContext) -> Result<()> {
        let service = Arc::clone(&self.service);
        hooks.override_method(context, &InputContext::SHOW_INPUT_PANEL, move |_: &InputContext, ()| {
            service.set_im_active(true);
        })?;
        let service = Arc::clone(&self.service);
        hooks.override_method(context, &InputContext::HIDE_INPUT_PANEL, move |_: &InputContext, ()| {
            service.set_im_active(false);
        })?;
        let service = Arc::clone(&self.service);
        hooks.override_method(
            context,
            &InputContext::IS_INPUT_PANEL_VISIBLE,
            move |_: &InputContext, ()| service.im_active(),
        )?;
        let service = Arc::clone(&self.service);
        hooks.override_method(context, &InputContext::KEYBOARD_RECT, move |_: &InputContext, ()| {
            service.geometry()
        })
    }
}

impl std::fmt::Debug for InputContextHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputContextHook").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    struct FakeService {
        active: AtomicBool,
    }

    impl InputMethodService for FakeService {
        fn set_im_active(&self, active: bool) {
            self.active.store(active, Ordering::SeqCst);
        }

        fn im_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        fn geometry(&self) -> Rect {
            if self.im_active() {
                Rect::new(0, 600, 1280, 200)
            } else {
                Rect::default()
            }
        }
    }

    #[test]
    fn test_panel_routed_to_service() {
        let service = Arc::new(FakeService {
            active: AtomicBool::new(false),
        });
        let context = InputContext::new().unwrap();
        InputContextHook::new(service.clone()).install(&context).unwrap();

        context.show_input_panel().unwrap();
        assert!(service.im_active());
        assert!(context.is_input_panel_visible().unwrap());
        assert_eq!(context.keyboard_rect().unwrap(), Rect::new(0, 600, 1280, 200));

        context.hide_input_panel().unwrap();
        assert!(!context.is_input_panel_visible().unwrap());
        assert_eq!(HookManager::global().override_count(&context), 4);
    }
}
