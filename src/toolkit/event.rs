//! Input and window events.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use bitflags::bitflags;
use strum::{Display, EnumIter};

use crate::toolkit::geometry::Point;

/// Events are shared between the application, the window and any interceptor on the way.
pub type EventRef = Arc<Event>;

/// Kind of an [`Event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum EventKind {
    /// A mouse button went down
    MouseButtonPress,
    /// A mouse button went up
    MouseButtonRelease,
    /// A mouse button was double clicked
    MouseButtonDblClick,
    /// The pointer moved
    MouseMove,
    /// A stylus touched the tablet
    TabletPress,
    /// A stylus left the tablet
    TabletRelease,
    /// A stylus moved on the tablet
    TabletMove,
    /// A key went down
    KeyPress,
    /// A key went up
    KeyRelease,
    /// A touch sequence started
    TouchBegin,
    /// A touch point moved
    TouchUpdate,
    /// A touch sequence ended
    TouchEnd,
    /// A touch sequence was cancelled
    TouchCancel,
    /// Part of the window must be repainted
    Expose,
    /// The window is asked to close
    Close,
    /// Anything the toolkit does not model
    Other,
}

impl EventKind {
    /// Returns true for the mouse event kinds
    #[must_use]
    pub fn is_mouse(&self) -> bool {
        matches!(
            self,
            EventKind::MouseButtonPress
                | EventKind::MouseButtonRelease
                | EventKind::MouseButtonDblClick
                | EventKind::MouseMove
        )
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Mouse buttons held during an event
    pub struct MouseButtons: u32 {
        /// The left button
        const LEFT = 0x0001;
        /// The right button
        const RIGHT = 0x0002;
        /// The middle button
        const MIDDLE = 0x0004;
    }
}

/// Where a mouse event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum MouseSource {
    /// Generated by a real pointing device
    #[default]
    NotSynthesized,
    /// Synthesized by the windowing system, e.g. from touch input
    SynthesizedBySystem,
    /// Synthesized by the toolkit
    SynthesizedByToolkit,
}

/// Kind of device that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum DeviceKind {
    /// No particular device
    #[default]
    Unknown,
    /// A mouse
    Mouse,
    /// A touch screen
    TouchScreen,
    /// A touch pad
    TouchPad,
    /// A tablet stylus
    Stylus,
    /// A keyboard
    Keyboard,
}

/// An event delivered to a window.
#[derive(Debug)]
pub struct Event {
    kind: EventKind,
    global_pos: Point,
    buttons: MouseButtons,
    source: MouseSource,
    device: DeviceKind,
    accepted: AtomicBool,
}

impl Event {
    /// Creates an event without position or device information
    #[must_use]
    pub fn new(kind: EventKind) -> EventRef {
        Arc::new(Event {
            kind,
            global_pos: Point::default(),
            buttons: MouseButtons::empty(),
            source: MouseSource::NotSynthesized,
            device: DeviceKind::Unknown,
            accepted: AtomicBool::new(true),
        })
    }

    /// Creates a mouse event from a real pointing device
    #[must_use]
    pub fn mouse(kind: EventKind, global_pos: Point, buttons: MouseButtons) -> EventRef {
        Arc::new(Event {
            kind,
            global_pos,
            buttons,
            source: MouseSource::NotSynthesized,
            device: DeviceKind::Mouse,
            accepted: AtomicBool::new(true),
        })
    }

    /// Creates a mouse event synthesized by `source`
    #[must_use]
    pub fn synthesized_mouse(
        kind: EventKind,
        global_pos: Point,
        buttons: MouseButtons,
        source: MouseSource,
    ) -> EventRef {
        Arc::new(Event {
            kind,
            global_pos,
            buttons,
            source,
            device: DeviceKind::TouchScreen,
            accepted: AtomicBool::new(true),
        })
    }

    /// Creates a touch event from `device`
    #[must_use]
    pub fn touch(kind: EventKind, global_pos: Point, device: DeviceKind) -> EventRef {
        Arc::new(Event {
            kind,
            global_pos,
            buttons: MouseButtons::empty(),
            source: MouseSource::NotSynthesized,
            device,
            accepted: AtomicBool::new(true),
        })
    }

    /// Creates a keyboard event
    #[must_use]
    pub fn key(kind: EventKind) -> EventRef {
        Arc::new(Event {
            kind,
            global_pos: Point::default(),
            buttons: MouseButtons::empty(),
            source: MouseSource::NotSynthesized,
            device: DeviceKind::Keyboard,
            accepted: AtomicBool::new(true),
        })
    }

    /// Kind of the event
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Pointer position in screen coordinates
    #[must_use]
    pub fn global_pos(&self) -> Point {
        self.global_pos
    }

    /// Mouse buttons held
    #[must_use]
    pub fn buttons(&self) -> MouseButtons {
        self.buttons
    }

    /// Origin of a mouse event
    #[must_use]
    pub fn source(&self) -> MouseSource {
        self.source
    }

    /// The producing device
    #[must_use]
    pub fn device(&self) -> DeviceKind {
        self.device
    }

    /// Marks the event as handled
    pub fn accept(&self) {
        self.accepted.store(true, Ordering::Release);
    }

    /// Marks the event as not handled
    pub fn ignore(&self) {
        self.accepted.store(false, Ordering::Release);
    }

    /// Returns true if a receiver handled the event
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.accepted.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_accept_and_ignore() {
        let event = Event::mouse(EventKind::MouseMove, Point::new(1, 2), MouseButtons::LEFT);
        assert!(event.is_accepted());
        event.ignore();
        assert!(!event.is_accepted());
        event.accept();
        assert!(event.is_accepted());
    }

    #[test]
    fn test_mouse_kinds() {
        let mouse: Vec<_> = EventKind::iter().filter(EventKind::is_mouse).collect();
        assert_eq!(mouse.len(), 4);
        assert!(!EventKind::TouchBegin.is_mouse());
    }
}
