//! Native window events as the display connection delivers them.

use std::sync::Arc;

use strum::Display;

use crate::toolkit::{
    connection::{DropActions, DropData},
    event::MouseButtons,
    geometry::{Point, Rect},
};

/// Where a focus or crossing event happened relative to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum NotifyDetail {
    /// The window is an ancestor of the other window
    #[default]
    Ancestor,
    /// The pointer passed through the window on the way between two others
    Virtual,
    /// The window is an inferior of the other window
    Inferior,
    /// The windows are unrelated
    Nonlinear,
    /// Unrelated, passed through on the way
    NonlinearVirtual,
    /// Generated for the window that contains the pointer
    Pointer,
    /// The focus moved to the pointer root
    PointerRoot,
    /// The focus moved to no window
    None,
}

/// Grab state under which a focus or crossing event happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum NotifyMode {
    /// Regular event
    #[default]
    Normal,
    /// Generated when a grab starts
    Grab,
    /// Generated when a grab ends
    Ungrab,
    /// Generated while a grab is active
    WhileGrabbed,
}

/// A focus change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusEvent {
    /// Relation to the other window
    pub detail: NotifyDetail,
    /// Grab state
    pub mode: NotifyMode,
}

/// Direction of a crossing event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CrossingKind {
    /// The pointer entered the window
    Enter,
    /// The pointer left the window
    Leave,
}

/// The pointer entered or left a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    /// Enter or leave
    pub kind: CrossingKind,
    /// Grab state
    pub mode: NotifyMode,
    /// Buttons the input device reports as held, `None` if it sent no button mask
    pub buttons: Option<MouseButtons>,
    /// Pointer position inside the window
    pub position: Point,
}

impl Crossing {
    /// An enter event at `position`
    #[must_use]
    pub fn enter(position: Point) -> Self {
        Crossing {
            kind: CrossingKind::Enter,
            mode: NotifyMode::Normal,
            buttons: None,
            position,
        }
    }

    /// A leave event
    #[must_use]
    pub fn leave() -> Self {
        Crossing {
            kind: CrossingKind::Leave,
            mode: NotifyMode::Normal,
            buttons: None,
            position: Point::default(),
        }
    }
}

/// Phase of a drag over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DropEventKind {
    /// The drag entered the window
    DragEnter,
    /// The drag moved inside the window
    DragMove,
    /// The drag left the window
    DragLeave,
    /// The data was dropped
    Drop,
}

/// A drag event delivered to the toolkit window.
#[derive(Debug, Clone)]
pub struct DropEvent {
    /// Phase of the drag
    pub kind: DropEventKind,
    /// The dragged data
    pub data: Arc<DropData>,
    /// Pointer position inside the window
    pub position: Point,
    /// Actions the source allows
    pub possible_actions: DropActions,
    /// Action the source proposes
    pub proposed_action: DropActions,
}

/// What a platform window passed on to the toolkit, in delivery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    /// The window was mapped
    MapNotify,
    /// The window moved or resized
    Configure(Rect),
    /// The window gained focus
    FocusIn,
    /// The window lost focus
    FocusOut,
    /// The pointer entered
    Enter(Point),
    /// The pointer left
    Leave,
    /// A button release, possibly synthesized
    ButtonRelease(MouseButtons),
    /// A drag event and the possible actions it carried
    Drag(DropEventKind, DropActions),
}
