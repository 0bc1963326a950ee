//! Native platform windows.
//!
//! `PlatformWindow` combines two bases: the primary `PlatformSurface` and the secondary
//! `EventListener`, which the display connection uses to forward property notifications and
//! client messages. Methods of the listener base are reached through a this-adjustment.
//!
//! The built-in client message handler implements the target side of the XDND protocol:
//! `XdndEnter` opens a session for the source's type list, `XdndPosition` asks the toolkit
//! through `window_event` and answers with `XdndStatus`, `XdndDrop` delivers the drop and
//! sends `XdndFinished`, `XdndLeave` ends the session.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock, RwLock},
};

use bitflags::bitflags;

use crate::{
    dispatch::{dispatch, ClassLayout, Hookable, Method, MethodPtr, ObjectHeader, VTable, SLOT_SIZE},
    toolkit::{
        connection::{Atom, ClientMessage, Connection, DropActions, DropData, ServerProperty, NONE},
        event::MouseButtons,
        geometry::{Point, Rect, Size},
        native::{Crossing, CrossingKind, DropEvent, DropEventKind, FocusEvent, NativeEvent},
        shared_table,
        window::{PropertyValue, WindowType},
    },
    Result,
};

/// Payload bytes of a `PlatformSurface`
const SURFACE_FIELDS: usize = 2 * SLOT_SIZE;

/// Offset of the `EventListener` subobject inside a `PlatformWindow`
const LISTENER_OFFSET: isize = (SLOT_SIZE + SURFACE_FIELDS) as isize;

/// A property change reported by the display server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNotify {
    /// Native window whose property changed
    pub window: u32,
    /// Name of the changed property
    pub atom: String,
    /// True if the property was deleted
    pub deleted: bool,
}

impl PropertyNotify {
    /// A change of `atom` on `window`
    #[must_use]
    pub fn new(window: u32, atom: impl Into<String>) -> Self {
        PropertyNotify {
            window,
            atom: atom.into(),
            deleted: false,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Window manager states from `_NET_WM_STATE`
    pub struct NetWmStates: u32 {
        /// `_NET_WM_STATE_ABOVE`
        const ABOVE = 0x0001;
        /// `_NET_WM_STATE_BELOW`
        const BELOW = 0x0002;
        /// `_NET_WM_STATE_FULLSCREEN`
        const FULLSCREEN = 0x0004;
        /// `_NET_WM_STATE_MAXIMIZED_HORZ`
        const MAXIMIZED_HORZ = 0x0008;
        /// `_NET_WM_STATE_MAXIMIZED_VERT`
        const MAXIMIZED_VERT = 0x0010;
        /// `_NET_WM_STATE_MODAL`
        const MODAL = 0x0020;
        /// `_NET_WM_STATE_STAYS_ON_TOP`
        const STAYS_ON_TOP = 0x0040;
        /// `_NET_WM_STATE_DEMANDS_ATTENTION`
        const DEMANDS_ATTENTION = 0x0080;
    }
}

impl NetWmStates {
    fn from_atom_name(name: &str) -> NetWmStates {
        match name {
            "_NET_WM_STATE_ABOVE" => NetWmStates::ABOVE,
            "_NET_WM_STATE_BELOW" => NetWmStates::BELOW,
            "_NET_WM_STATE_FULLSCREEN" => NetWmStates::FULLSCREEN,
            "_NET_WM_STATE_MAXIMIZED_HORZ" => NetWmStates::MAXIMIZED_HORZ,
            "_NET_WM_STATE_MAXIMIZED_VERT" => NetWmStates::MAXIMIZED_VERT,
            "_NET_WM_STATE_MODAL" => NetWmStates::MODAL,
            "_NET_WM_STATE_STAYS_ON_TOP" => NetWmStates::STAYS_ON_TOP,
            "_NET_WM_STATE_DEMANDS_ATTENTION" => NetWmStates::DEMANDS_ATTENTION,
            _ => NetWmStates::empty(),
        }
    }
}

/// A native window of the platform integration.
pub struct PlatformWindow {
    header: ObjectHeader,
    native_id: u32,
    window_type: WindowType,
    connection: Arc<Connection>,
    geometry: RwLock<Rect>,
    properties: RwLock<HashMap<String, PropertyValue>>,
    notifications: Mutex<Vec<PropertyNotify>>,
    activations: Mutex<usize>,
    delivered: Mutex<Vec<NativeEvent>>,
    dirty_pixmaps: Mutex<Vec<Size>>,
}

impl PlatformWindow {
    /// `void PlatformSurface::set_geometry(Rect)`
    pub const SET_GEOMETRY: Method<PlatformWindow, Rect, ()> =
        Method::new("set_geometry", MethodPtr::virtual_slot("PlatformSurface", 0));
    /// `void PlatformWindow::request_activate()`
    pub const REQUEST_ACTIVATE: Method<PlatformWindow, (), ()> =
        Method::new("request_activate", MethodPtr::virtual_slot("PlatformWindow", 1));
    /// `void PlatformWindow::handle_map_notify()`
    pub const HANDLE_MAP_NOTIFY: Method<PlatformWindow, (), ()> =
        Method::new("handle_map_notify", MethodPtr::virtual_slot("PlatformWindow", 2));
    /// `void PlatformWindow::handle_configure_notify(Rect)`
    pub const HANDLE_CONFIGURE_NOTIFY: Method<PlatformWindow, Rect, ()> =
        Method::new("handle_configure_notify", MethodPtr::virtual_slot("PlatformWindow", 3));
    /// `void PlatformWindow::handle_focus_in(FocusEvent)`
    pub const HANDLE_FOCUS_IN: Method<PlatformWindow, FocusEvent, ()> =
        Method::new("handle_focus_in", MethodPtr::virtual_slot("PlatformWindow", 4));
    /// `void PlatformWindow::handle_focus_out(FocusEvent)`
    pub const HANDLE_FOCUS_OUT: Method<PlatformWindow, FocusEvent, ()> =
        Method::new("handle_focus_out", MethodPtr::virtual_slot("PlatformWindow", 5));
    /// `void PlatformWindow::handle_enter_leave(Crossing)`
    pub const HANDLE_ENTER_LEAVE: Method<PlatformWindow, Crossing, ()> =
        Method::new("handle_enter_leave", MethodPtr::virtual_slot("PlatformWindow", 6));
    /// `DropActions PlatformWindow::window_event(DropEvent)`
    pub const WINDOW_EVENT: Method<PlatformWindow, DropEvent, DropActions> =
        Method::new("window_event", MethodPtr::virtual_slot("PlatformWindow", 7));
    /// `void EventListener::handle_property_notify(PropertyNotify)`
    pub const HANDLE_PROPERTY_NOTIFY: Method<PlatformWindow, PropertyNotify, ()> = Method::new(
        "handle_property_notify",
        MethodPtr::virtual_slot("EventListener", 0).with_adjustment(LISTENER_OFFSET),
    );
    /// `bool EventListener::handle_client_message(ClientMessage)`
    pub const HANDLE_CLIENT_MESSAGE: Method<PlatformWindow, ClientMessage, bool> = Method::new(
        "handle_client_message",
        MethodPtr::virtual_slot("EventListener", 1).with_adjustment(LISTENER_OFFSET),
    );

    /// Layout of the `PlatformWindow` class
    pub fn layout() -> &'static Arc<ClassLayout> {
        static LAYOUT: OnceLock<Arc<ClassLayout>> = OnceLock::new();
        LAYOUT.get_or_init(|| {
            let surface = ClassLayout::builder("PlatformSurface")
                .virtual_method("set_geometry")
                .fields(SURFACE_FIELDS)
                .build();
            let listener = ClassLayout::builder("EventListener")
                .virtual_method("handle_property_notify")
                .virtual_method("handle_client_message")
                .build();
            ClassLayout::builder("PlatformWindow")
                .extends(&surface)
                .implements(&listener)
                .virtual_method("request_activate")
                .virtual_method("handle_map_notify")
                .virtual_method("handle_configure_notify")
                .virtual_method("handle_focus_in")
                .virtual_method("handle_focus_out")
                .virtual_method("handle_enter_leave")
                .virtual_method("window_event")
                .build()
        })
    }

    /// Class-shared table with the built-in implementations
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in table cannot be assembled.
    pub fn class_table() -> Result<&'static Arc<VTable>> {
        static TABLE: OnceLock<Arc<VTable>> = OnceLock::new();
        shared_table(&TABLE, || {
            VTable::builder(PlatformWindow::layout())
                .implement(&PlatformWindow::SET_GEOMETRY, |w: &PlatformWindow, rect: Rect| {
                    *write_lock!(w.geometry) = rect;
                })?
                .implement(&PlatformWindow::REQUEST_ACTIVATE, |w: &PlatformWindow, ()| {
                    *lock!(w.activations) += 1;
                })?
                .implement(&PlatformWindow::HANDLE_MAP_NOTIFY, |w: &PlatformWindow, ()| {
                    w.deliver(NativeEvent::MapNotify);
                })?
                .implement(&PlatformWindow::HANDLE_CONFIGURE_NOTIFY, |w: &PlatformWindow, rect: Rect| {
                    *write_lock!(w.geometry) = rect;
                    w.deliver(NativeEvent::Configure(rect));
                })?
                .implement(&PlatformWindow::HANDLE_FOCUS_IN, |w: &PlatformWindow, _: FocusEvent| {
                    w.deliver(NativeEvent::FocusIn);
                })?
                .implement(&PlatformWindow::HANDLE_FOCUS_OUT, |w: &PlatformWindow, _: FocusEvent| {
                    w.deliver(NativeEvent::FocusOut);
                })?
                .implement(&PlatformWindow::HANDLE_ENTER_LEAVE, PlatformWindow::enter_leave)?
                .implement(&PlatformWindow::WINDOW_EVENT, |w: &PlatformWindow, event: DropEvent| {
                    w.deliver(NativeEvent::Drag(event.kind, event.possible_actions));
                    if event.possible_actions.contains(event.proposed_action) {
                        event.proposed_action
                    } else {
                        DropActions::empty()
                    }
                })?
                .implement(
                    &PlatformWindow::HANDLE_PROPERTY_NOTIFY,
                    |w: &PlatformWindow, notify: PropertyNotify| {
                        lock!(w.notifications).push(notify);
                    },
                )?
                .implement(&PlatformWindow::HANDLE_CLIENT_MESSAGE, PlatformWindow::xdnd_message)?
                .build()
        })
    }

    /// Creates a regular native window on its own display connection
    ///
    /// # Errors
    ///
    /// Returns an error if the class table cannot be assembled.
    pub fn new(geometry: Rect) -> Result<PlatformWindow> {
        PlatformWindow::with_connection(geometry, WindowType::Window, Connection::new())
    }

    /// Creates a native window of `window_type` on `connection`, owned by the calling thread
    ///
    /// # Errors
    ///
    /// Returns an error if the class table cannot be assembled.
    pub fn with_connection(
        geometry: Rect,
        window_type: WindowType,
        connection: Arc<Connection>,
    ) -> Result<PlatformWindow> {
        Ok(PlatformWindow {
            header: ObjectHeader::new(PlatformWindow::class_table()?),
            native_id: connection.allocate_window(),
            window_type,
            connection,
            geometry: RwLock::new(geometry),
            properties: RwLock::new(HashMap::new()),
            notifications: Mutex::new(Vec::new()),
            activations: Mutex::new(0),
            delivered: Mutex::new(Vec::new()),
            dirty_pixmaps: Mutex::new(Vec::new()),
        })
    }

    /// Moves the native window
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn set_geometry(&self, rect: Rect) -> Result<()> {
        dispatch(self, &PlatformWindow::SET_GEOMETRY, rect)
    }

    /// Asks the window manager to activate the window
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn request_activate(&self) -> Result<()> {
        dispatch(self, &PlatformWindow::REQUEST_ACTIVATE, ())
    }

    /// Handles the server's map notification
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn handle_map_notify(&self) -> Result<()> {
        dispatch(self, &PlatformWindow::HANDLE_MAP_NOTIFY, ())
    }

    /// Handles a move or resize reported by the server
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn handle_configure_notify(&self, rect: Rect) -> Result<()> {
        dispatch(self, &PlatformWindow::HANDLE_CONFIGURE_NOTIFY, rect)
    }

    /// Handles a focus gain
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn handle_focus_in(&self, event: FocusEvent) -> Result<()> {
        dispatch(self, &PlatformWindow::HANDLE_FOCUS_IN, event)
    }

    /// Handles a focus loss
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn handle_focus_out(&self, event: FocusEvent) -> Result<()> {
        dispatch(self, &PlatformWindow::HANDLE_FOCUS_OUT, event)
    }

    /// Handles the pointer entering or leaving
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn handle_enter_leave(&self, crossing: Crossing) -> Result<()> {
        dispatch(self, &PlatformWindow::HANDLE_ENTER_LEAVE, crossing)
    }

    /// Delivers a drag event to the toolkit; returns the accepted action, empty if refused
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn window_event(&self, event: DropEvent) -> Result<DropActions> {
        dispatch(self, &PlatformWindow::WINDOW_EVENT, event)
    }

    /// Forwards a property notification from the display connection
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn handle_property_notify(&self, notify: PropertyNotify) -> Result<()> {
        dispatch(self, &PlatformWindow::HANDLE_PROPERTY_NOTIFY, notify)
    }

    /// Forwards a client message; returns true if it was consumed
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn handle_client_message(&self, message: ClientMessage) -> Result<bool> {
        dispatch(self, &PlatformWindow::HANDLE_CLIENT_MESSAGE, message)
    }

    /// Delivers a button release at `position` to the toolkit
    pub fn handle_button_release(&self, button: MouseButtons, position: Point) {
        tracing::trace!(window = %self.header.id(), ?button, ?position, "button release");
        self.deliver(NativeEvent::ButtonRelease(button));
    }

    /// Marks the redirected content pixmap stale; `None` keeps the current size
    pub fn mark_pixmap_dirty(&self, size: Option<Size>) {
        let size = size.unwrap_or_else(|| self.geometry().size());
        lock!(self.dirty_pixmaps).push(size);
    }

    /// Native window id
    #[must_use]
    pub fn native_id(&self) -> u32 {
        self.native_id
    }

    /// Role of the toolkit window this native window belongs to
    #[must_use]
    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    /// The display connection
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Interns `name` on the window's connection
    pub fn atom(&self, name: &str) -> Atom {
        self.connection.atom(name)
    }

    /// Current native geometry
    #[must_use]
    pub fn geometry(&self) -> Rect {
        *read_lock!(self.geometry)
    }

    /// Window manager states as stored on the server
    #[must_use]
    pub fn net_wm_states(&self) -> NetWmStates {
        let atom = self.atom("_NET_WM_STATE");
        let Some(ServerProperty::Atoms(atoms)) = self.connection.server_property(self.native_id, atom) else {
            return NetWmStates::empty();
        };
        atoms
            .iter()
            .filter_map(|a| self.connection.atom_name(*a))
            .fold(NetWmStates::empty(), |states, name| states | NetWmStates::from_atom_name(&name))
    }

    /// Dynamic property of the toolkit window
    #[must_use]
    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        read_lock!(self.properties).get(name).cloned()
    }

    /// Sets a dynamic property of the toolkit window
    pub fn set_property(&self, name: &str, value: PropertyValue) {
        write_lock!(self.properties).insert(name.to_string(), value);
    }

    /// Notifications the built-in listener recorded
    #[must_use]
    pub fn notifications(&self) -> Vec<PropertyNotify> {
        lock!(self.notifications).clone()
    }

    /// Number of activation requests the built-in implementation saw
    #[must_use]
    pub fn activations(&self) -> usize {
        *lock!(self.activations)
    }

    /// Events passed on to the toolkit, oldest first
    #[must_use]
    pub fn delivered(&self) -> Vec<NativeEvent> {
        lock!(self.delivered).clone()
    }

    /// Sizes passed to [`PlatformWindow::mark_pixmap_dirty`], oldest first
    #[must_use]
    pub fn dirty_pixmaps(&self) -> Vec<Size> {
        lock!(self.dirty_pixmaps).clone()
    }

    fn deliver(&self, event: NativeEvent) {
        lock!(self.delivered).push(event);
    }

    fn enter_leave(&self, crossing: Crossing) {
        let id = self.header.id();
        match crossing.kind {
            CrossingKind::Enter => {
                self.connection.set_mouse_window(Some(id));
                self.deliver(NativeEvent::Enter(crossing.position));
            }
            CrossingKind::Leave => {
                if self.connection.mouse_window() == Some(id) {
                    self.connection.set_mouse_window(None);
                }
                self.deliver(NativeEvent::Leave);
            }
        }
    }

    fn xdnd_message(&self, message: ClientMessage) -> bool {
        if message.format != 32 {
            return false;
        }
        let connection = &self.connection;
        let source = message.data[0];
        let kind = message.message_type;

        if kind == connection.atom("XdndEnter") {
            let type_list = connection.atom("XdndTypeList");
            let formats = match connection.server_property(source, type_list) {
                Some(ServerProperty::Atoms(atoms)) => {
                    atoms.iter().filter_map(|a| connection.atom_name(*a)).collect()
                }
                _ => Vec::new(),
            };
            let data = DropData::new(formats);
            let id = self.native_id;
            connection.update_drag(|drag| {
                drag.source = source;
                drag.proxy_target = source;
                drag.current_window = id;
                drag.drop_data = Some(data);
                drag.accepted_action = DropActions::empty();
            });
            tracing::debug!(window = id, source, "drag entered");
            true
        } else if kind == connection.atom("XdndPosition") {
            self.xdnd_position(message)
        } else if kind == connection.atom("XdndDrop") {
            self.xdnd_drop(message)
        } else if kind == connection.atom("XdndLeave") {
            let data = connection.update_drag(|drag| {
                if drag.source != source {
                    return None;
                }
                drag.source = NONE;
                drag.current_window = NONE;
                drag.drop_data.take()
            });
            if let Some(data) = data {
                self.deliver_drag(DropEventKind::DragLeave, data, Point::default(), DropActions::empty());
            }
            true
        } else {
            false
        }
    }

    fn xdnd_position(&self, message: ClientMessage) -> bool {
        let connection = &self.connection;
        let [source, _, root, time, action] = message.data;
        let origin = self.geometry().top_left();
        let position = Point::new(
            i32::from((root >> 16) as u16) - origin.x,
            i32::from((root & 0xffff) as u16) - origin.y,
        );

        let data = connection.update_drag(|drag| {
            if drag.source != source {
                return None;
            }
            drag.current_position = position;
            if time != 0 {
                drag.target_time = time;
            }
            drag.waiting_for_status = false;
            drag.drop_data.clone()
        });
        let Some(data) = data else {
            return true;
        };

        let accepted = self.deliver_drag(DropEventKind::DragMove, data, position, connection.drop_action(action));
        connection.update_drag(|drag| drag.accepted_action = accepted);

        let status = ClientMessage::new(
            source,
            connection.atom("XdndStatus"),
            [self.native_id, u32::from(!accepted.is_empty()), 0, 0, connection.xdnd_action(accepted)],
        );
        connection.send_event(source, status);
        true
    }

    fn xdnd_drop(&self, message: ClientMessage) -> bool {
        let connection = &self.connection;
        let drag = connection.drag();
        if drag.source != message.data[0] {
            return true;
        }
        let Some(data) = drag.drop_data else {
            return true;
        };
        let accepted = self.deliver_drag(DropEventKind::Drop, data, drag.current_position, drag.accepted_action);
        connection.finish_drop(accepted);
        true
    }

    fn deliver_drag(&self, kind: DropEventKind, data: Arc<DropData>, position: Point, actions: DropActions) -> DropActions {
        let event = DropEvent {
            kind,
            data,
            position,
            possible_actions: actions,
            proposed_action: preferred_action(actions),
        };
        self.window_event(event).unwrap_or_else(|e| {
            tracing::warn!(window = %self.header.id(), error = %e, "window_event failed");
            DropActions::empty()
        })
    }
}

/// The action a drag proposes out of `actions`: copy, then move, then link
#[must_use]
pub fn preferred_action(actions: DropActions) -> DropActions {
    actions.iter().next().unwrap_or_default()
}

impl Hookable for PlatformWindow {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{resolve_slot, SubobjectKind};

    #[test]
    fn test_listener_is_secondary_subobject() {
        let layout = PlatformWindow::layout();
        let listener = &layout.subobjects()[1];
        assert_eq!(listener.kind(), SubobjectKind::Secondary);
        assert_eq!(listener.offset(), LISTENER_OFFSET);
        assert_eq!(
            layout.method_ptr("EventListener", "handle_client_message"),
            Some(PlatformWindow::HANDLE_CLIENT_MESSAGE.ptr())
        );
        assert_eq!(
            layout.method_ptr("PlatformWindow", "request_activate"),
            Some(PlatformWindow::REQUEST_ACTIVATE.ptr())
        );
    }

    #[test]
    fn test_method_ptrs_match_layout() {
        let layout = PlatformWindow::layout();
        for (name, ptr) in [
            ("handle_map_notify", PlatformWindow::HANDLE_MAP_NOTIFY.ptr()),
            ("handle_configure_notify", PlatformWindow::HANDLE_CONFIGURE_NOTIFY.ptr()),
            ("handle_focus_in", PlatformWindow::HANDLE_FOCUS_IN.ptr()),
            ("handle_focus_out", PlatformWindow::HANDLE_FOCUS_OUT.ptr()),
            ("handle_enter_leave", PlatformWindow::HANDLE_ENTER_LEAVE.ptr()),
            ("window_event", PlatformWindow::WINDOW_EVENT.ptr()),
        ] {
            assert_eq!(layout.method_ptr("PlatformWindow", name), Some(ptr), "{name}");
        }
        assert!(PlatformWindow::class_table().is_ok());
    }

    #[test]
    fn test_adjusted_methods_resolve_to_listener_slots() {
        let layout = PlatformWindow::layout();
        let slot = resolve_slot(layout, PlatformWindow::HANDLE_PROPERTY_NOTIFY.ptr()).unwrap();
        assert_eq!(layout.slot(slot).unwrap().name, "handle_property_notify");
    }

    #[test]
    fn test_builtins() {
        let window = PlatformWindow::new(Rect::new(0, 0, 10, 10)).unwrap();
        window.set_geometry(Rect::new(5, 5, 20, 20)).unwrap();
        window.request_activate().unwrap();
        window
            .handle_property_notify(PropertyNotify::new(window.native_id(), "_NET_WM_STATE"))
            .unwrap();
        window.handle_map_notify().unwrap();
        window.handle_configure_notify(Rect::new(1, 2, 30, 40)).unwrap();
        window.handle_focus_in(FocusEvent::default()).unwrap();

        assert_eq!(window.geometry(), Rect::new(1, 2, 30, 40));
        assert_eq!(window.activations(), 1);
        assert_eq!(window.notifications().len(), 1);
        assert_eq!(
            window.delivered(),
            vec![NativeEvent::MapNotify, NativeEvent::Configure(Rect::new(1, 2, 30, 40)), NativeEvent::FocusIn]
        );

        let unknown = ClientMessage::new(window.native_id(), window.atom("WM_PROTOCOLS"), [0; 5]);
        assert!(!window.handle_client_message(unknown).unwrap());
    }

    #[test]
    fn test_enter_leave_tracks_mouse_window() {
        let window = PlatformWindow::new(Rect::new(0, 0, 10, 10)).unwrap();
        window.handle_enter_leave(Crossing::enter(Point::new(3, 4))).unwrap();
        assert_eq!(window.connection().mouse_window(), Some(window.header().id()));

        window.handle_enter_leave(Crossing::leave()).unwrap();
        assert_eq!(window.connection().mouse_window(), None);
        assert_eq!(window.delivered(), vec![NativeEvent::Enter(Point::new(3, 4)), NativeEvent::Leave]);
    }

    #[test]
    fn test_xdnd_session() {
        let connection = Connection::new();
        let window = PlatformWindow::with_connection(Rect::new(100, 100, 50, 50), WindowType::Window, Arc::clone(&connection))
            .unwrap();
        let source = connection.allocate_window();
        let uri_list = connection.atom("text/uri-list");
        connection.set_server_property(source, connection.atom("XdndTypeList"), ServerProperty::Atoms(vec![uri_list]));

        let id = window.native_id();
        let enter = ClientMessage::new(id, connection.atom("XdndEnter"), [source, 0, 0, 0, 0]);
        assert!(window.handle_client_message(enter).unwrap());
        assert!(connection.drag().drop_data.unwrap().has_format("text/uri-list"));

        let root = (110 << 16) | 120;
        let copy = connection.atom("XdndActionCopy");
        let position = ClientMessage::new(id, connection.atom("XdndPosition"), [source, 0, root, 5, copy]);
        assert!(window.handle_client_message(position).unwrap());
        assert_eq!(connection.drag().current_position, Point::new(10, 20));
        assert_eq!(connection.drag().accepted_action, DropActions::COPY);

        let drop = ClientMessage::new(id, connection.atom("XdndDrop"), [source, 0, 6, 0, 0]);
        assert!(window.handle_client_message(drop).unwrap());

        let sent = connection.sent_events();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].message.message_type, connection.atom("XdndStatus"));
        assert_eq!(sent[1].message.message_type, connection.atom("XdndFinished"));
        assert_eq!(sent[1].message.data[..3], [id, 1, copy]);
        assert_eq!(
            window.delivered(),
            vec![
                NativeEvent::Drag(DropEventKind::DragMove, DropActions::COPY),
                NativeEvent::Drag(DropEventKind::Drop, DropActions::COPY),
            ]
        );
        assert_eq!(connection.drag().source, NONE);
    }

    #[test]
    fn test_net_wm_states_read_from_server() {
        let window = PlatformWindow::new(Rect::new(0, 0, 10, 10)).unwrap();
        assert!(window.net_wm_states().is_empty());

        let connection = window.connection();
        let atoms = vec![
            connection.atom("_NET_WM_STATE_FULLSCREEN"),
            connection.atom("_NET_WM_STATE_ABOVE"),
            connection.atom("_NET_WM_STATE_SHADED"),
        ];
        connection.set_server_property(window.native_id(), window.atom("_NET_WM_STATE"), ServerProperty::Atoms(atoms));
        assert_eq!(window.net_wm_states(), NetWmStates::FULLSCREEN | NetWmStates::ABOVE);
    }

    #[test]
    fn test_preferred_action() {
        assert_eq!(preferred_action(DropActions::MOVE | DropActions::LINK), DropActions::MOVE);
        assert_eq!(preferred_action(DropActions::all()), DropActions::COPY);
        assert_eq!(preferred_action(DropActions::empty()), DropActions::empty());
    }
}
