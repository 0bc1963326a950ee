//! Top-level windows.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, OnceLock, RwLock,
    },
};

use bitflags::bitflags;
use strum::Display;

use crate::{
    dispatch::{dispatch, ClassLayout, Hookable, Method, MethodPtr, ObjectHeader, VTable},
    toolkit::{
        object_layout, shared_table,
        event::{EventKind, EventRef},
        geometry::{Point, Rect, Region, Size},
    },
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Window manager hints of a window
    pub struct WindowFlags: u32 {
        /// No decoration from the window manager
        const FRAMELESS = 0x0800;
        /// Keep above other windows
        const STAYS_ON_TOP = 0x4_0000;
        /// Let input pass through to windows below
        const TRANSPARENT_FOR_INPUT = 0x0800_0000;
    }
}

/// Role of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum WindowType {
    /// A regular top-level window
    #[default]
    Window,
    /// A dialog
    Dialog,
    /// A popup menu or tooltip
    Popup,
    /// A tool palette
    Tool,
}

/// A dynamic window property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A flag
    Bool(bool),
    /// An integer
    Int(i64),
    /// A floating point number
    Real(f64),
    /// Text
    Text(String),
    /// A list of 32-bit cardinals, as published to the display server
    Cardinals(Vec<u32>),
    /// A region, used for clip paths
    Region(Region),
}

impl PropertyValue {
    /// Interprets the value as a flag, the way the toolkit converts variants
    #[must_use]
    pub fn to_bool(&self) -> bool {
        match self {
            PropertyValue::Bool(b) => *b,
            PropertyValue::Int(i) => *i != 0,
            PropertyValue::Real(r) => *r != 0.0,
            PropertyValue::Text(t) => !t.is_empty() && t != "0" && !t.eq_ignore_ascii_case("false"),
            PropertyValue::Cardinals(c) => !c.is_empty(),
            PropertyValue::Region(r) => !r.is_empty(),
        }
    }
}

/// A top-level window.
///
/// Virtual methods: `event` (declared by `Object`), `resize` and `expose`.
pub struct Window {
    header: ObjectHeader,
    title: String,
    window_type: WindowType,
    flags: RwLock<WindowFlags>,
    geometry: RwLock<Rect>,
    properties: RwLock<HashMap<String, PropertyValue>>,
    accepts_mouse: AtomicBool,
    handled: Mutex<Vec<EventKind>>,
    exposed: Mutex<Vec<Region>>,
    system_moves: Mutex<Vec<Point>>,
}

impl Window {
    /// `bool Object::event(EventRef)`
    pub const EVENT: Method<Window, EventRef, bool> =
        Method::new("event", MethodPtr::virtual_slot("Object", 0));
    /// `void Window::resize(Size)`
    pub const RESIZE: Method<Window, Size, ()> =
        Method::new("resize", MethodPtr::virtual_slot("Window", 1));
    /// `void Window::expose(Region)`
    pub const EXPOSE: Method<Window, Region, ()> =
        Method::new("expose", MethodPtr::virtual_slot("Window", 2));
    /// `Rect Window::geometry()`, a non-virtual method
    pub const GEOMETRY: Method<Window, (), Rect> =
        Method::new("geometry", MethodPtr::non_virtual("Window", 0x1010));

    /// Default geometry of new windows
    pub const DEFAULT_GEOMETRY: Rect = Rect::new(0, 0, 640, 480);

    /// Layout of the `Window` class
    pub fn layout() -> &'static Arc<ClassLayout> {
        static LAYOUT: OnceLock<Arc<ClassLayout>> = OnceLock::new();
        LAYOUT.get_or_init(|| {
            ClassLayout::builder("Window")
                .extends(object_layout())
                .virtual_method("resize")
                .virtual_method("expose")
                .method("geometry")
                .fields(64)
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
            VTable::builder(Window::layout())
                .implement(&Window::EVENT, Window::builtin_event)?
                .implement(&Window::RESIZE, |w: &Window, size: Size| {
                    with_write!(w.geometry, |g: &mut Rect| {
                        g.width = size.width;
                        g.height = size.height;
                    });
                })?
                .implement(&Window::EXPOSE, |w: &Window, region: Region| {
                    lock!(w.exposed).push(region);
                })?
                .build()
        })
    }

    /// Creates a window owned by the calling thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the class table cannot be assembled.
    pub fn new(title: &str, window_type: WindowType) -> Result<Window> {
        Ok(Window {
            header: ObjectHeader::new(Window::class_table()?),
            title: title.to_string(),
            window_type,
            flags: RwLock::new(WindowFlags::empty()),
            geometry: RwLock::new(Window::DEFAULT_GEOMETRY),
            properties: RwLock::new(HashMap::new()),
            accepts_mouse: AtomicBool::new(false),
            handled: Mutex::new(Vec::new()),
            exposed: Mutex::new(Vec::new()),
            system_moves: Mutex::new(Vec::new()),
        })
    }

    fn builtin_event(&self, event: EventRef) -> bool {
        lock!(self.handled).push(event.kind());
        match event.kind() {
            kind if kind.is_mouse() => {
                if self.accepts_mouse.load(Ordering::Acquire) {
                    event.accept();
                } else {
                    event.ignore();
                }
                true
            }
            EventKind::Expose | EventKind::Close => true,
            EventKind::Other => false,
            _ => {
                event.ignore();
                true
            }
        }
    }

    /// Delivers `event` through the virtual `event` method
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn event(&self, event: &EventRef) -> Result<bool> {
        dispatch(self, &Window::EVENT, event.clone())
    }

    /// Resizes the window through the virtual `resize` method
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn resize(&self, size: Size) -> Result<()> {
        dispatch(self, &Window::RESIZE, size)
    }

    /// Requests a repaint of `region` through the virtual `expose` method
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn expose(&self, region: Region) -> Result<()> {
        dispatch(self, &Window::EXPOSE, region)
    }

    /// Title of the window
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Role of the window
    #[must_use]
    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    /// Current window manager hints
    #[must_use]
    pub fn flags(&self) -> WindowFlags {
        *read_lock!(self.flags)
    }

    /// Sets or clears a single hint
    pub fn set_flag(&self, flag: WindowFlags, on: bool) {
        with_write!(self.flags, |f: &mut WindowFlags| f.set(flag, on));
    }

    /// Geometry in screen coordinates
    #[must_use]
    pub fn geometry(&self) -> Rect {
        *read_lock!(self.geometry)
    }

    /// Moves and resizes the window without going through `resize`
    pub fn set_geometry(&self, rect: Rect) {
        *write_lock!(self.geometry) = rect;
    }

    /// Current size
    #[must_use]
    pub fn size(&self) -> Size {
        self.geometry().size()
    }

    /// Value of the dynamic property `name`
    #[must_use]
    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        read_lock!(self.properties).get(name).cloned()
    }

    /// Stores the dynamic property `name`
    pub fn set_property(&self, name: &str, value: PropertyValue) {
        write_lock!(self.properties).insert(name.to_string(), value);
    }

    /// Whether the window's content accepts mouse events
    pub fn set_accepts_mouse(&self, accepts: bool) {
        self.accepts_mouse.store(accepts, Ordering::Release);
    }

    /// Hands an interactive move over to the window manager
    pub fn start_system_move(&self, from: Point) {
        tracing::debug!(window = %self.header.id(), x = from.x, y = from.y, "starting system move");
        lock!(self.system_moves).push(from);
    }

    /// Positions at which system moves were started
    #[must_use]
    pub fn system_moves(&self) -> Vec<Point> {
        lock!(self.system_moves).clone()
    }

    /// Kinds of the events the built-in `event` implementation saw
    #[must_use]
    pub fn handled_events(&self) -> Vec<EventKind> {
        lock!(self.handled).clone()
    }

    /// Regions the built-in `expose` implementation saw
    #[must_use]
    pub fn exposed_regions(&self) -> Vec<Region> {
        lock!(self.exposed).clone()
    }
}

impl Hookable for Window {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.header.id())
            .field("title", &self.title)
            .field("type", &self.window_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatch::resolve_slot,
        toolkit::event::{Event, MouseButtons},
    };

    #[test]
    fn test_method_ptrs_match_layout() {
        let layout = Window::layout();
        assert_eq!(layout.method_ptr("Object", "event"), Some(Window::EVENT.ptr()));
        assert_eq!(layout.method_ptr("Window", "resize"), Some(Window::RESIZE.ptr()));
        assert_eq!(layout.method_ptr("Window", "expose"), Some(Window::EXPOSE.ptr()));
        assert_eq!(layout.method_ptr("Window", "geometry"), Some(Window::GEOMETRY.ptr()));
        assert!(resolve_slot(layout, Window::GEOMETRY.ptr()).is_err());
        assert!(Window::class_table().is_ok());
    }

    #[test]
    fn test_builtin_behaviour() {
        let window = Window::new("builtin", WindowType::Dialog).unwrap();
        assert_eq!(window.title(), "builtin");
        assert_eq!(window.window_type(), WindowType::Dialog);

        window.resize(Size::new(200, 100)).unwrap();
        assert_eq!(window.size(), Size::new(200, 100));

        let press = Event::mouse(EventKind::MouseButtonPress, Point::new(3, 3), MouseButtons::LEFT);
        assert!(window.event(&press).unwrap());
        assert!(!press.is_accepted());

        window.set_accepts_mouse(true);
        let press = Event::mouse(EventKind::MouseButtonPress, Point::new(3, 3), MouseButtons::LEFT);
        assert!(window.event(&press).unwrap());
        assert!(press.is_accepted());

        assert!(!window.event(&Event::new(EventKind::Other)).unwrap());
        assert_eq!(window.handled_events().len(), 3);
    }

    #[test]
    fn test_flags_and_properties() {
        let window = Window::new("flags", WindowType::Window).unwrap();
        window.set_flag(WindowFlags::FRAMELESS, true);
        assert!(window.flags().contains(WindowFlags::FRAMELESS));
        window.set_flag(WindowFlags::FRAMELESS, false);
        assert!(window.flags().is_empty());

        assert!(window.property("_d_radius").is_none());
        window.set_property("_d_radius", PropertyValue::Int(8));
        assert_eq!(window.property("_d_radius"), Some(PropertyValue::Int(8)));
        assert!(PropertyValue::Text("true".into()).to_bool());
        assert!(!PropertyValue::Text("false".into()).to_bool());
    }
}
