//! Binding layer for the hookable toolkit classes.
//!
//! Each class here pairs a Rust type with the [`ClassLayout`] of the toolkit class it stands
//! for, a set of typed [`crate::dispatch::Method`] constants naming its virtual methods, and
//! a class-shared table holding the built-in implementations. The public methods of the
//! types route through [`crate::dispatch::dispatch`], so overrides installed by the shims take
//! effect exactly like overridden virtual calls would.
//!
//! # Classes
//!
//! - [`Window`] - top-level window (`Object` → `Window`)
//! - [`PlatformWindow`] - native window with a secondary event-listener base
//! - [`GlContext`] - OpenGL context presenting into a window
//! - [`BackingStore`] - paint buffer of a window
//! - [`InputContext`] - input method bridge
//! - [`Application`] - event delivery (`Object` → `GuiApplication`)
//!
//! [`Connection`] holds the display connection state native windows share: atoms, server
//! properties, the drag-and-drop session and the pointer state.
//!
//! Dropping any of these objects is its "destroyed" notification; see
//! [`crate::dispatch::ObjectHeader::on_destroyed`].

use std::sync::{Arc, OnceLock};

use crate::{
    dispatch::{ClassLayout, VTable},
    Result,
};

mod application;
mod backingstore;
mod connection;
mod event;
mod geometry;
mod glcontext;
mod inputcontext;
mod native;
mod platformwindow;
mod window;

pub use application::Application;
pub use backingstore::{BackingStore, ImageFormat, PaintDevice, PaintOp, ShmSegment};
pub use connection::{
    Atom, ClientMessage, Connection, DragState, DropActions, DropData, SentMessage, ServerProperty, NONE,
};
pub use event::{DeviceKind, Event, EventKind, EventRef, MouseButtons, MouseSource};
pub use geometry::{Point, Rect, Region, Size};
pub use glcontext::{GlContext, GlOp};
pub use inputcontext::InputContext;
pub use native::{
    Crossing, CrossingKind, DropEvent, DropEventKind, FocusEvent, NativeEvent, NotifyDetail, NotifyMode,
};
pub use platformwindow::{preferred_action, NetWmStates, PlatformWindow, PropertyNotify};
pub use window::{PropertyValue, Window, WindowFlags, WindowType};

/// Layout of the `Object` root class shared by windows and the application
pub fn object_layout() -> &'static Arc<ClassLayout> {
    static LAYOUT: OnceLock<Arc<ClassLayout>> = OnceLock::new();
    LAYOUT.get_or_init(|| {
        ClassLayout::builder("Object")
            .virtual_method("event")
            .method("object_name")
            .fields(16)
            .build()
    })
}

/// Returns the table in `cell`, building it on first use.
fn shared_table(
    cell: &'static OnceLock<Arc<VTable>>,
    build: impl FnOnce() -> Result<Arc<VTable>>,
) -> Result<&'static Arc<VTable>> {
    if let Some(table) = cell.get() {
        return Ok(table);
    }
    let table = build()?;
    Ok(cell.get_or_init(|| table))
}
