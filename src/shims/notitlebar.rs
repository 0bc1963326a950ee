//! System moves for windows without a title bar.
//!
//! A [`NoTitlebarHelper`] takes over a window whose decorations are drawn by the application.
//! As long as [`ENABLE_SYSTEM_MOVE_PROPERTY`] is not set to false it intercepts the window's
//! `event` method and hands unhandled left-button drags to the window manager as a system
//! move.

use std::sync::{
    atomic::{AtomicBool, AtomicI32, Ordering},
    Arc, Mutex, Weak,
};

use crate::{
    dispatch::Hookable,
    hook::HookManager,
    toolkit::{EventKind, EventRef, MouseButtons, Point, PropertyValue, Window, WindowFlags},
    Result,
};

/// Window property switching system moves on and off; unset means enabled
pub const ENABLE_SYSTEM_MOVE_PROPERTY: &str = "_d_enableSystemMove";

/// Pointer travel in pixels below which a move does not start a drag
pub const DEFAULT_DRAG_DISTANCE: i32 = 10;

#[derive(Debug, Default)]
struct Touch {
    down: bool,
    begin: Point,
}

#[derive(Debug)]
struct MoveState {
    touch: Mutex<Touch>,
    moving: AtomicBool,
    enabled: AtomicBool,
    drag_distance: AtomicI32,
}

impl MoveState {
    fn window_event(&self, hooks: &HookManager, window: &Window, event: EventRef) -> bool {
        let kind = event.kind();
        {
            let mut touch = lock!(self.touch);
            match kind {
                EventKind::TouchBegin => touch.down = true,
                EventKind::TouchEnd | EventKind::MouseButtonRelease => touch.down = false,
                EventKind::MouseButtonPress if touch.down => touch.begin = event.global_pos(),
                EventKind::MouseMove => {
                    let delta = touch.begin - event.global_pos();
                    if delta.manhattan_length() < self.drag_distance.load(Ordering::Relaxed) {
                        drop(touch);
                        return call_original(hooks, window, event);
                    }
                }
                _ => {}
            }
        }

        let is_left_drag = kind == EventKind::MouseMove && event.buttons() == MouseButtons::LEFT;
        if kind == EventKind::MouseButtonRelease {
            self.moving.store(false, Ordering::Release);
        }

        if !call_original(hooks, window, event.clone()) {
            return false;
        }

        // The window manager may swallow the release that ends a move
        if kind == EventKind::MouseButtonPress {
            self.moving.store(false, Ordering::Release);
        }

        if is_left_drag
            && !event.is_accepted()
            && window.geometry().contains(event.global_pos())
            && self.enabled.load(Ordering::Acquire)
            && !self.moving.swap(true, Ordering::AcqRel)
        {
            event.accept();
            window.start_system_move(event.global_pos());
        }
        true
    }
}

fn call_original(hooks: &HookManager, window: &Window, event: EventRef) -> bool {
    hooks
        .call_original(window, &Window::EVENT, event)
        .unwrap_or_else(|e| {
            tracing::warn!(window = %window.header().id(), error = %e, "original event handler failed");
            false
        })
}

/// Window helper for applications drawing their own title bar.
///
/// Dropping the helper removes every hook from its window.
pub struct NoTitlebarHelper {
    hooks: &'static HookManager,
    window: Arc<Window>,
    state: Arc<MoveState>,
}

impl NoTitlebarHelper {
    /// Takes over `window` using the process-wide hook manager
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if the event hook cannot be installed.
    pub fn new(window: Arc<Window>) -> Result<Self> {
        NoTitlebarHelper::with_manager(HookManager::global(), window)
    }

    /// Takes over `window`, installing hooks through `hooks`.
    ///
    /// Clears the frameless hint of the window and applies the current value of
    /// [`ENABLE_SYSTEM_MOVE_PROPERTY`].
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if the event hook cannot be installed.
    pub fn with_manager(hooks: &'static HookManager, window: Arc<Window>) -> Result<Self> {
        if window.flags().contains(WindowFlags::FRAMELESS) {
            tracing::debug!(window = %window.header().id(), "clearing frameless hint");
            window.set_flag(WindowFlags::FRAMELESS, false);
        }

        let helper = NoTitlebarHelper {
            hooks,
            window,
            state: Arc::new(MoveState {
                touch: Mutex::new(Touch::default()),
                moving: AtomicBool::new(false),
                enabled: AtomicBool::new(true),
                drag_distance: AtomicI32::new(DEFAULT_DRAG_DISTANCE),
            }),
        };
        helper.update_enable_system_move_from_property()?;
        Ok(helper)
    }

    /// The managed window
    #[must_use]
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Returns true if unhandled drags start a system move
    #[must_use]
    pub fn is_system_move_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::Acquire)
    }

    /// Returns true while a system move started by the helper is in progress
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.state.moving.load(Ordering::Acquire)
    }

    /// Sets the pointer travel needed before a move counts as a drag
    pub fn set_drag_distance(&self, distance: i32) {
        self.state.drag_distance.store(distance, Ordering::Relaxed);
    }

    /// Sets a window property and applies it.
    ///
    /// Unchanged values are ignored. For `_d_` properties the matching update handler runs
    /// afterwards; properties without a handler are stored and reported.
    ///
    /// # Errors
    ///
    /// Returns the error of the update handler.
    pub fn set_window_property(&self, name: &str, value: PropertyValue) -> Result<()> {
        if self.window.property(name).as_ref() == Some(&value) {
            tracing::trace!(window = %self.window.header().id(), name, "property unchanged");
            return Ok(());
        }
        self.window.set_property(name, value);

        if !name.starts_with("_d_") {
            return Ok(());
        }
        match name {
            ENABLE_SYSTEM_MOVE_PROPERTY => self.update_enable_system_move_from_property(),
            _ => {
                tracing::warn!(window = %self.window.header().id(), name, "no update handler for window property");
                Ok(())
            }
        }
    }

    fn update_enable_system_move_from_property(&self) -> Result<()> {
        let enabled = self
            .window
            .property(ENABLE_SYSTEM_MOVE_PROPERTY)
            .is_none_or(|v| v.to_bool());
        self.state.enabled.store(enabled, Ordering::Release);
        tracing::debug!(window = %self.window.header().id(), enabled, "system move");

        if enabled {
            if self.hooks.is_overridden(&*self.window, &Window::EVENT)? {
                return Ok(());
            }
            let hooks = self.hooks;
            let state: Weak<MoveState> = Arc::downgrade(&self.state);
            self.hooks
                .override_method(&*self.window, &Window::EVENT, move |w: &Window, event: EventRef| {
                    match state.upgrade() {
                        Some(state) => state.window_event(hooks, w, event),
                        None => call_original(hooks, w, event),
                    }
                })
        } else if self.hooks.has_ghost_table(&*self.window) {
            self.hooks.reset(&*self.window, &Window::EVENT)
        } else {
            Ok(())
        }
    }
}

impl Drop for NoTitlebarHelper {
    fn drop(&mut self) {
        if !self.hooks.has_ghost_table(&*self.window) {
            return;
        }
        if let Err(e) = self.hooks.clear_ghost_table(&*self.window) {
            tracing::warn!(window = %self.window.header().id(), error = %e, "failed to clear window hooks");
        }
    }
}

impl std::fmt::Debug for NoTitlebarHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoTitlebarHelper")
            .field("window", &self.window)
            .field("state", &self.state)
            .finish()
    }
}
