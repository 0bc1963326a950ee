//! Display connection state.
//!
//! A [`Connection`] holds what the native windows of one display connection share: interned
//! atoms, properties stored on the server, the drag-and-drop session, the pointer grab and the
//! mouse button state. Native window events in [`crate::toolkit::PlatformWindow`] read and
//! update this state the way a display server round trip would.

use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc, Mutex, RwLock,
};

use bitflags::bitflags;
use dashmap::DashMap;

use crate::{
    dispatch::InstanceId,
    toolkit::{event::MouseButtons, geometry::Point},
};

/// An interned name on the display server
pub type Atom = u32;

/// The empty atom and the empty window
pub const NONE: u32 = 0;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Drop actions a drag source offers or a target accepts. Empty means ignore.
    pub struct DropActions: u32 {
        /// Copy the data
        const COPY = 0x1;
        /// Move the data
        const MOVE = 0x2;
        /// Link to the data
        const LINK = 0x4;
    }
}

/// A property value stored on the display server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerProperty {
    /// A list of atoms
    Atoms(Vec<Atom>),
    /// Text
    Text(String),
}

/// Data offered by a drag.
#[derive(Debug, Default)]
pub struct DropData {
    formats: Vec<String>,
    support_actions: RwLock<DropActions>,
    direct_save: AtomicBool,
    direct_save_url: RwLock<Option<String>>,
}

impl DropData {
    /// Data available in `formats`
    #[must_use]
    pub fn new<S: Into<String>>(formats: impl IntoIterator<Item = S>) -> Arc<DropData> {
        Arc::new(DropData {
            formats: formats.into_iter().map(Into::into).collect(),
            ..DropData::default()
        })
    }

    /// Returns true if the data is available as `format`
    #[must_use]
    pub fn has_format(&self, format: &str) -> bool {
        self.formats.iter().any(|f| f == format)
    }

    /// Formats the data is available in
    #[must_use]
    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// Actions the drag source supports, as read from its action list
    #[must_use]
    pub fn support_actions(&self) -> DropActions {
        *read_lock!(self.support_actions)
    }

    /// Records the actions the drag source supports
    pub fn set_support_actions(&self, actions: DropActions) {
        *write_lock!(self.support_actions) = actions;
    }

    /// Whether the drop saves a file directly into the target location
    #[must_use]
    pub fn is_direct_save(&self) -> bool {
        self.direct_save.load(Ordering::Acquire)
    }

    /// Marks the drop as a direct save
    pub fn set_direct_save(&self, on: bool) {
        self.direct_save.store(on, Ordering::Release);
    }

    /// Directory the drop target saves into
    #[must_use]
    pub fn direct_save_url(&self) -> Option<String> {
        read_lock!(self.direct_save_url).clone()
    }

    /// Sets the directory the drop target saves into
    pub fn set_direct_save_url(&self, url: impl Into<String>) {
        *write_lock!(self.direct_save_url) = Some(url.into());
    }
}

/// Drag-and-drop session of a connection
#[derive(Debug, Clone, Default)]
pub struct DragState {
    /// Data of a drag started by this process
    pub own_drag: Option<Arc<DropData>>,
    /// Native window of the drag source, [`NONE`] if there is no session
    pub source: u32,
    /// Data offered by a drag source of another process
    pub drop_data: Option<Arc<DropData>>,
    /// Native window under the drag, [`NONE`] if none
    pub current_window: u32,
    /// Drag position inside the current window
    pub current_position: Point,
    /// Action the target accepted during the last position update
    pub accepted_action: DropActions,
    /// Server time of the last drag message
    pub target_time: u32,
    /// Window the drag status messages go to
    pub proxy_target: u32,
    /// True while a status reply is outstanding
    pub waiting_for_status: bool,
}

/// A client message sent to another window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    /// Destination window
    pub destination: u32,
    /// The message
    pub message: ClientMessage,
}

/// A client message as delivered by the display server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMessage {
    /// Window the message is about
    pub window: u32,
    /// Message type
    pub message_type: Atom,
    /// Word size of `data` in bits
    pub format: u8,
    /// Payload
    pub data: [u32; 5],
}

impl ClientMessage {
    /// A 32-bit message of `message_type` about `window`
    #[must_use]
    pub fn new(window: u32, message_type: Atom, data: [u32; 5]) -> Self {
        ClientMessage {
            window,
            message_type,
            format: 32,
            data,
        }
    }
}

/// State shared by the windows of one display connection.
#[derive(Debug)]
pub struct Connection {
    atoms: DashMap<String, Atom>,
    next_atom: AtomicU32,
    next_window: AtomicU32,
    properties: DashMap<(u32, Atom), ServerProperty>,
    drag: Mutex<DragState>,
    mouse_grabber: RwLock<Option<InstanceId>>,
    mouse_window: RwLock<Option<InstanceId>>,
    buttons: RwLock<MouseButtons>,
    sent: Mutex<Vec<SentMessage>>,
}

impl Default for Connection {
    fn default() -> Self {
        Connection {
            atoms: DashMap::new(),
            next_atom: AtomicU32::new(1),
            next_window: AtomicU32::new(0x0040_0001),
            properties: DashMap::new(),
            drag: Mutex::new(DragState::default()),
            mouse_grabber: RwLock::new(None),
            mouse_window: RwLock::new(None),
            buttons: RwLock::new(MouseButtons::empty()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl Connection {
    /// A fresh connection
    #[must_use]
    pub fn new() -> Arc<Connection> {
        Arc::new(Connection::default())
    }

    /// Interns `name`
    pub fn atom(&self, name: &str) -> Atom {
        if let Some(atom) = self.atoms.get(name) {
            return *atom;
        }
        *self
            .atoms
            .entry(name.to_string())
            .or_insert_with(|| self.next_atom.fetch_add(1, Ordering::Relaxed))
    }

    /// Name of an interned atom
    #[must_use]
    pub fn atom_name(&self, atom: Atom) -> Option<String> {
        self.atoms
            .iter()
            .find(|entry| *entry.value() == atom)
            .map(|entry| entry.key().clone())
    }

    /// Allocates a native window id
    pub fn allocate_window(&self) -> u32 {
        self.next_window.fetch_add(1, Ordering::Relaxed)
    }

    /// Property `atom` of `window` as stored on the server
    #[must_use]
    pub fn server_property(&self, window: u32, atom: Atom) -> Option<ServerProperty> {
        self.properties.get(&(window, atom)).map(|p| p.value().clone())
    }

    /// Stores property `atom` of `window` on the server
    pub fn set_server_property(&self, window: u32, atom: Atom, value: ServerProperty) {
        self.properties.insert((window, atom), value);
    }

    /// Snapshot of the drag-and-drop session
    #[must_use]
    pub fn drag(&self) -> DragState {
        lock!(self.drag).clone()
    }

    /// Edits the drag-and-drop session.
    ///
    /// `f` runs under the session lock and must not dispatch into any window.
    pub fn update_drag<T>(&self, f: impl FnOnce(&mut DragState) -> T) -> T {
        f(&mut lock!(self.drag))
    }

    /// Maps an action atom to a drop action; unknown atoms count as copy
    pub fn drop_action(&self, atom: Atom) -> DropActions {
        if atom == NONE || atom == self.atom("XdndActionCopy") {
            DropActions::COPY
        } else if atom == self.atom("XdndActionLink") {
            DropActions::LINK
        } else if atom == self.atom("XdndActionMove") {
            DropActions::MOVE
        } else {
            DropActions::COPY
        }
    }

    /// Maps a drop action to its action atom
    pub fn xdnd_action(&self, action: DropActions) -> Atom {
        if action.is_empty() {
            NONE
        } else if action == DropActions::LINK {
            self.atom("XdndActionLink")
        } else if action == DropActions::MOVE {
            self.atom("XdndActionMove")
        } else {
            self.atom("XdndActionCopy")
        }
    }

    /// Tells the drag source the drop is done and ends the session.
    ///
    /// `action` is the action the target performed, empty if it refused the drop.
    pub fn finish_drop(&self, action: DropActions) {
        let finished = self.atom("XdndFinished");
        let xdnd_action = self.xdnd_action(action);
        let (destination, message) = self.update_drag(|drag| {
            let message = ClientMessage::new(
                drag.source,
                finished,
                [drag.current_window, u32::from(!action.is_empty()), xdnd_action, 0, 0],
            );
            let destination = drag.proxy_target;
            drag.source = NONE;
            drag.current_window = NONE;
            drag.waiting_for_status = false;
            drag.target_time = 0;
            (destination, message)
        });
        tracing::debug!(destination, accepted = !action.is_empty(), "drop finished");
        self.send_event(destination, message);
    }

    /// Sends `message` to `destination`
    pub fn send_event(&self, destination: u32, message: ClientMessage) {
        lock!(self.sent).push(SentMessage {
            destination,
            message,
        });
    }

    /// Messages sent so far, oldest first
    #[must_use]
    pub fn sent_events(&self) -> Vec<SentMessage> {
        lock!(self.sent).clone()
    }

    /// The window holding the pointer grab
    #[must_use]
    pub fn mouse_grabber(&self) -> Option<InstanceId> {
        *read_lock!(self.mouse_grabber)
    }

    /// Sets the window holding the pointer grab
    pub fn set_mouse_grabber(&self, window: Option<InstanceId>) {
        *write_lock!(self.mouse_grabber) = window;
    }

    /// The window under the pointer
    #[must_use]
    pub fn mouse_window(&self) -> Option<InstanceId> {
        *read_lock!(self.mouse_window)
    }

    /// Sets the window under the pointer
    pub fn set_mouse_window(&self, window: Option<InstanceId>) {
        *write_lock!(self.mouse_window) = window;
    }

    /// Buttons the connection believes are held
    #[must_use]
    pub fn button_state(&self) -> MouseButtons {
        *read_lock!(self.buttons)
    }

    /// Marks `button` as held or released
    pub fn set_button_state(&self, button: MouseButtons, held: bool) {
        with_write!(self.buttons, |b: &mut MouseButtons| b.set(button, held));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atoms_are_interned_once() {
        let connection = Connection::new();
        let drop = connection.atom("XdndDrop");
        assert_ne!(drop, NONE);
        assert_eq!(connection.atom("XdndDrop"), drop);
        assert_ne!(connection.atom("XdndPosition"), drop);
        assert_eq!(connection.atom_name(drop).as_deref(), Some("XdndDrop"));
    }

    #[test]
    fn test_action_atoms() {
        let connection = Connection::new();
        assert_eq!(connection.drop_action(NONE), DropActions::COPY);
        let link = connection.atom("XdndActionLink");
        assert_eq!(connection.drop_action(link), DropActions::LINK);
        assert_eq!(connection.xdnd_action(DropActions::LINK), link);
        assert_eq!(connection.xdnd_action(DropActions::empty()), NONE);
        assert_eq!(connection.drop_action(connection.atom("XdndActionAsk")), DropActions::COPY);
    }

    #[test]
    fn test_finish_drop_resets_session() {
        let connection = Connection::new();
        connection.update_drag(|drag| {
            drag.source = 7;
            drag.current_window = 9;
            drag.proxy_target = 7;
            drag.waiting_for_status = true;
        });

        connection.finish_drop(DropActions::MOVE);

        let sent = connection.sent_events();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, 7);
        assert_eq!(sent[0].message.message_type, connection.atom("XdndFinished"));
        assert_eq!(sent[0].message.data[..3], [9, 1, connection.atom("XdndActionMove")]);

        let drag = connection.drag();
        assert_eq!(drag.source, NONE);
        assert_eq!(drag.current_window, NONE);
        assert!(!drag.waiting_for_status);
    }
}
