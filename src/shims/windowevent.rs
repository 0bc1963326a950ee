//! Native event filtering for platform windows.
//!
//! [`WindowEventHook`] intercepts the native event handlers of a [`PlatformWindow`]. Which
//! handlers it takes over depends on the window:
//!
//! | Handler | Hooked for |
//! |---------|------------|
//! | `handle_map_notify` | windows with redirected content |
//! | `handle_configure_notify` | every window |
//! | `handle_client_message`, `handle_focus_in`, `handle_focus_out`, `handle_enter_leave`, `window_event` | regular windows and dialogs |
//! | `handle_property_notify` | regular windows |
//!
//! The hooks are part of the window's ghost table and go away with the window.

use std::sync::Arc;

use crate::{
    dispatch::Hookable,
    hook::HookManager,
    toolkit::{
        preferred_action, ClientMessage, Connection, Crossing, CrossingKind, DropActions, DropEvent,
        DropEventKind, FocusEvent, MouseButtons, NotifyDetail, NotifyMode, PlatformWindow,
        PropertyNotify, PropertyValue, Rect, ServerProperty, WindowType, NONE,
    },
    Result,
};

/// Window property mirroring the `_NET_WM_STATE` flags as an integer
pub const NET_WM_STATES_PROPERTY: &str = "_d_netWmStates";

/// Drop data format of a direct save drag
pub const DIRECT_SAVE_FORMAT: &str = "XdndDirectSave0";

/// Installs the native event hooks on platform windows.
pub struct WindowEventHook;

impl WindowEventHook {
    /// Hooks `window` through the process-wide hook manager
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if one of the overrides cannot be installed.
    pub fn install(window: &PlatformWindow, redirect_content: bool) -> Result<()> {
        WindowEventHook::install_with(HookManager::global(), window, redirect_content)
    }

    /// Hooks `window` through `hooks`.
    ///
    /// `redirect_content` marks windows whose content is composited from an offscreen pixmap;
    /// their pixmap is marked dirty when the window is mapped or reconfigured.
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if one of the overrides cannot be installed. Hooks
    /// installed before the failing one stay in place.
    pub fn install_with(hooks: &'static HookManager, window: &PlatformWindow, redirect_content: bool) -> Result<()> {
        let window_type = window.window_type();
        tracing::debug!(window = %window.header().id(), %window_type, redirect_content, "installing window event hooks");

        if redirect_content {
            hooks.override_method(window, &PlatformWindow::HANDLE_MAP_NOTIFY, move |w: &PlatformWindow, ()| {
                if let Err(e) = hooks.call_original(w, &PlatformWindow::HANDLE_MAP_NOTIFY, ()) {
                    tracing::warn!(window = %w.header().id(), error = %e, "original map notify failed");
                }
                w.mark_pixmap_dirty(None);
            })?;
        }

        hooks.override_method(
            window,
            &PlatformWindow::HANDLE_CONFIGURE_NOTIFY,
            move |w: &PlatformWindow, rect: Rect| {
                if let Err(e) = hooks.call_original(w, &PlatformWindow::HANDLE_CONFIGURE_NOTIFY, rect) {
                    tracing::warn!(window = %w.header().id(), error = %e, "original configure notify failed");
                }
                if redirect_content {
                    w.mark_pixmap_dirty(Some(rect.size()));
                }
            },
        )?;

        if matches!(window_type, WindowType::Window | WindowType::Dialog) {
            hooks.override_method(
                window,
                &PlatformWindow::HANDLE_CLIENT_MESSAGE,
                move |w: &PlatformWindow, message: ClientMessage| client_message(hooks, w, message),
            )?;
            hooks.override_method(
                window,
                &PlatformWindow::HANDLE_FOCUS_IN,
                move |w: &PlatformWindow, event: FocusEvent| focus_in(hooks, w, event),
            )?;
            hooks.override_method(
                window,
                &PlatformWindow::HANDLE_FOCUS_OUT,
                move |w: &PlatformWindow, event: FocusEvent| focus_out(hooks, w, event),
            )?;
            hooks.override_method(
                window,
                &PlatformWindow::HANDLE_ENTER_LEAVE,
                move |w: &PlatformWindow, crossing: Crossing| enter_leave(hooks, w, crossing),
            )?;
            hooks.override_method(
                window,
                &PlatformWindow::WINDOW_EVENT,
                move |w: &PlatformWindow, event: DropEvent| window_event(hooks, w, event),
            )?;
        }

        if window_type == WindowType::Window {
            hooks.override_method(
                window,
                &PlatformWindow::HANDLE_PROPERTY_NOTIFY,
                move |w: &PlatformWindow, notify: PropertyNotify| property_notify(hooks, w, notify),
            )?;
        }
        Ok(())
    }
}

/// Actions the drag source lists in its `XdndActionList`
fn source_actions(connection: &Connection, source: u32) -> DropActions {
    match connection.server_property(source, connection.atom("XdndActionList")) {
        Some(ServerProperty::Atoms(atoms)) => atoms
            .iter()
            .fold(DropActions::empty(), |actions, atom| actions | connection.drop_action(*atom)),
        _ => DropActions::empty(),
    }
}

fn client_message(hooks: &HookManager, window: &PlatformWindow, message: ClientMessage) -> bool {
    let call_original = |message| {
        hooks
            .call_original(window, &PlatformWindow::HANDLE_CLIENT_MESSAGE, message)
            .unwrap_or_else(|e| {
                tracing::warn!(window = %window.header().id(), error = %e, "original client message handler failed");
                false
            })
    };
    if message.format != 32 {
        return call_original(message);
    }

    let connection = window.connection();
    let is_drop = message.message_type == connection.atom("XdndDrop");
    if is_drop || message.message_type == connection.atom("XdndPosition") {
        let drag = connection.drag();
        // Drags started by this process carry their own actions
        if drag.own_drag.is_none() {
            let actions = source_actions(connection, drag.source);
            if !actions.is_empty() {
                let Some(data) = drag.drop_data else {
                    tracing::debug!(window = %window.header().id(), "drag without drop data");
                    return false;
                };
                tracing::trace!(window = %window.header().id(), ?actions, "drag source actions");
                data.set_support_actions(actions);
            }
        }
    }

    if is_drop {
        drop_message(window, message)
    } else {
        call_original(message)
    }
}

fn drop_message(window: &PlatformWindow, message: ClientMessage) -> bool {
    let connection = window.connection();
    let drag = connection.drag();
    if drag.current_window == NONE {
        connection.update_drag(|d| d.source = NONE);
        return true;
    }

    let [source, _, time, _, own_actions] = message.data;
    if source != drag.source {
        tracing::debug!(window = %window.header().id(), source, expected = drag.source, "drop from unexpected source");
        return true;
    }
    if time != 0 {
        connection.update_drag(|d| d.target_time = time);
    }

    let (data, supported) = match (&drag.own_drag, &drag.drop_data) {
        (Some(own), _) => (Arc::clone(own), DropActions::from_bits_truncate(own_actions)),
        (None, Some(data)) => (Arc::clone(data), drag.accepted_action),
        (None, None) => return true,
    };

    let direct_save = data.has_format(DIRECT_SAVE_FORMAT);
    data.set_direct_save(direct_save);

    let event = DropEvent {
        kind: DropEventKind::Drop,
        data: Arc::clone(&data),
        position: drag.current_position,
        possible_actions: supported,
        proposed_action: preferred_action(supported),
    };
    let accepted = window.window_event(event).unwrap_or_else(|e| {
        tracing::warn!(window = %window.header().id(), error = %e, "drop delivery failed");
        DropActions::empty()
    });

    if direct_save && source != NONE {
        if let Some(url) = data.direct_save_url() {
            let atom = connection.atom(DIRECT_SAVE_FORMAT);
            let basename = match connection.server_property(source, atom) {
                Some(ServerProperty::Text(name)) => name,
                _ => String::new(),
            };
            tracing::debug!(window = %window.header().id(), %url, %basename, "direct save");
            connection.set_server_property(source, atom, ServerProperty::Text(format!("{url}/{basename}")));
        }
    }

    connection.finish_drop(accepted);
    true
}

fn focus_in(hooks: &HookManager, window: &PlatformWindow, event: FocusEvent) {
    // Sent only because the pointer is over the window
    if event.detail == NotifyDetail::Pointer {
        tracing::trace!(window = %window.header().id(), "ignoring pointer focus in");
        return;
    }
    if let Err(e) = hooks.call_original(window, &PlatformWindow::HANDLE_FOCUS_IN, event) {
        tracing::warn!(window = %window.header().id(), error = %e, "original focus in failed");
    }
}

fn focus_out(hooks: &HookManager, window: &PlatformWindow, event: FocusEvent) {
    if event.mode == NotifyMode::Grab || event.detail == NotifyDetail::Pointer {
        tracing::trace!(window = %window.header().id(), mode = %event.mode, detail = %event.detail, "ignoring focus out");
        return;
    }
    if let Err(e) = hooks.call_original(window, &PlatformWindow::HANDLE_FOCUS_OUT, event) {
        tracing::warn!(window = %window.header().id(), error = %e, "original focus out failed");
    }
}

fn property_notify(hooks: &HookManager, window: &PlatformWindow, notify: PropertyNotify) {
    let relevant = notify.window == window.native_id() && notify.atom == "_NET_WM_STATE";
    if let Err(e) = hooks.call_original(window, &PlatformWindow::HANDLE_PROPERTY_NOTIFY, notify) {
        tracing::warn!(window = %window.header().id(), error = %e, "original property notify failed");
    }
    if relevant {
        let states = window.net_wm_states();
        tracing::debug!(window = %window.header().id(), ?states, "window manager states changed");
        window.set_property(NET_WM_STATES_PROPERTY, PropertyValue::Int(i64::from(states.bits())));
    }
}

fn enter_leave(hooks: &HookManager, window: &PlatformWindow, crossing: Crossing) {
    let connection = window.connection();
    let id = window.header().id();

    // A leave still reaches the window under the pointer
    if let Some(grabber) = connection.mouse_grabber() {
        if grabber != id && (crossing.kind != CrossingKind::Leave || connection.mouse_window() != Some(id)) {
            tracing::trace!(window = %id, %grabber, kind = %crossing.kind, "pointer grabbed elsewhere");
            return;
        }
    }

    if let (CrossingKind::Enter, NotifyMode::Ungrab, Some(mask)) = (crossing.kind, crossing.mode, crossing.buttons) {
        let held = connection.button_state();
        for button in MouseButtons::all().iter() {
            let set = mask.contains(button);
            connection.set_button_state(button, set);
            // Presses are not replayed; the window manager may hold one while the pointer is grabbed
            if held.contains(button) && !set {
                window.handle_button_release(button, crossing.position);
            }
        }
    }

    if let Err(e) = hooks.call_original(window, &PlatformWindow::HANDLE_ENTER_LEAVE, crossing) {
        tracing::warn!(window = %id, error = %e, "original enter/leave failed");
    }
}

fn window_event(hooks: &HookManager, window: &PlatformWindow, mut event: DropEvent) -> DropActions {
    if matches!(event.kind, DropEventKind::DragEnter | DropEventKind::DragMove | DropEventKind::Drop) {
        let support_actions = event.data.support_actions();
        if !support_actions.is_empty() {
            event.possible_actions = support_actions;
        }
    }
    hooks
        .call_original(window, &PlatformWindow::WINDOW_EVENT, event)
        .unwrap_or_else(|e| {
            tracing::warn!(window = %window.header().id(), error = %e, "original window_event failed");
            DropActions::empty()
        })
}
