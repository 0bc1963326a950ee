//! Application-wide input device tracking.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc, Weak,
};

use strum::{Display, EnumIter, FromRepr};

use crate::{
    dispatch::Hookable,
    hook::HookManager,
    toolkit::{Application, DeviceKind, EventKind, EventRef, MouseSource, Window},
    Result,
};

/// Kind of device that produced the most recent input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, FromRepr)]
#[repr(u8)]
pub enum InputDeviceType {
    /// No input seen yet
    #[default]
    None,
    /// A real mouse
    Mouse,
    /// A tablet stylus
    Tablet,
    /// A keyboard
    Keyboard,
    /// A touch screen
    TouchScreen,
}

impl InputDeviceType {
    /// Classifies `event`; returns [`InputDeviceType::None`] for events that carry no device
    /// information, synthesized mouse events and touch events not coming from a touch screen.
    #[must_use]
    pub fn of(event: &EventRef) -> Self {
        match event.kind() {
            EventKind::MouseButtonPress
            | EventKind::MouseButtonRelease
            | EventKind::MouseMove
            | EventKind::MouseButtonDblClick => {
                if event.source() == MouseSource::NotSynthesized {
                    InputDeviceType::Mouse
                } else {
                    InputDeviceType::None
                }
            }
            EventKind::TabletPress | EventKind::TabletRelease | EventKind::TabletMove => {
                InputDeviceType::Tablet
            }
            EventKind::KeyPress | EventKind::KeyRelease => InputDeviceType::Keyboard,
            EventKind::TouchBegin
            | EventKind::TouchUpdate
            | EventKind::TouchEnd
            | EventKind::TouchCancel => {
                if event.device() == DeviceKind::TouchScreen {
                    InputDeviceType::TouchScreen
                } else {
                    InputDeviceType::None
                }
            }
            _ => InputDeviceType::None,
        }
    }
}

type ChangeListener = Box<dyn Fn(InputDeviceType) + Send + Sync>;

struct Monitor {
    last: AtomicU8,
    listeners: boxcar::Vec<ChangeListener>,
}

impl Monitor {
    fn observe(&self, event: &EventRef) {
        let current = InputDeviceType::of(event);
        if current == InputDeviceType::None {
            return;
        }
        let previous = self.last.swap(current as u8, Ordering::AcqRel);
        if previous == current as u8 {
            return;
        }

        let previous = InputDeviceType::from_repr(previous).unwrap_or_default();
        tracing::info!(from = %previous, to = %current, "input device type changed");
        for (_, listener) in self.listeners.iter() {
            listener(current);
        }
    }
}

/// Watches every event the application delivers and remembers the last input device.
///
/// The monitor intercepts [`Application::notify`] and always forwards to the original, so
/// delivery itself is unchanged.
pub struct InputDeviceMonitor {
    hooks: &'static HookManager,
    monitor: Arc<Monitor>,
}

impl InputDeviceMonitor {
    /// Starts monitoring `app` through the process-wide hook manager
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if `notify` cannot be intercepted.
    pub fn new(app: &Application) -> Result<Self> {
        InputDeviceMonitor::with_manager(HookManager::global(), app)
    }

    /// Starts monitoring `app`, installing the hook through `hooks`
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if `notify` cannot be intercepted.
    pub fn with_manager(hooks: &'static HookManager, app: &Application) -> Result<Self> {
        let monitor = Arc::new(Monitor {
            last: AtomicU8::new(InputDeviceType::None as u8),
            listeners: boxcar::Vec::new(),
        });

        let weak: Weak<Monitor> = Arc::downgrade(&monitor);
        hooks.override_method(
            app,
            &Application::NOTIFY,
            move |a: &Application, (window, event): (Arc<Window>, EventRef)| {
                if let Some(monitor) = weak.upgrade() {
                    monitor.observe(&event);
                }
                hooks
                    .call_original(a, &Application::NOTIFY, (window, event))
                    .unwrap_or_else(|e| {
                        tracing::warn!(app = %a.header().id(), error = %e, "original notify failed");
                        false
                    })
            },
        )?;

        Ok(InputDeviceMonitor { hooks, monitor })
    }

    /// The device type of the most recent classified input
    #[must_use]
    pub fn last_input_device_type(&self) -> InputDeviceType {
        InputDeviceType::from_repr(self.monitor.last.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Registers `listener`, called with the new type whenever the device type changes
    pub fn on_changed<F>(&self, listener: F)
    where
        F: Fn(InputDeviceType) + Send + Sync + 'static,
    {
        self.monitor.listeners.push(Box::new(listener));
    }

    /// Stops monitoring `app`
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if the hook cannot be reset.
    pub fn detach(&self, app: &Application) -> Result<()> {
        self.hooks.reset(app, &Application::NOTIFY)
    }
}

impl std::fmt::Debug for InputDeviceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputDeviceMonitor")
            .field("last", &self.last_input_device_type())
            .field("listeners", &self.monitor.listeners.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::toolkit::{Event, MouseButtons, Point, WindowType};

    #[test]
    fn test_classification() {
        let press = Event::mouse(EventKind::MouseButtonPress, Point::new(0, 0), MouseButtons::LEFT);
        assert_eq!(InputDeviceType::of(&press), InputDeviceType::Mouse);

        let synthesized = Event::synthesized_mouse(
            EventKind::MouseMove,
            Point::new(0, 0),
            MouseButtons::LEFT,
            MouseSource::SynthesizedBySystem,
        );
        assert_eq!(InputDeviceType::of(&synthesized), InputDeviceType::None);

        let pad = Event::touch(EventKind::TouchBegin, Point::new(0, 0), DeviceKind::TouchPad);
        assert_eq!(InputDeviceType::of(&pad), InputDeviceType::None);

        let screen = Event::touch(EventKind::TouchUpdate, Point::new(0, 0), DeviceKind::TouchScreen);
        assert_eq!(InputDeviceType::of(&screen), InputDeviceType::TouchScreen);

        assert_eq!(InputDeviceType::of(&Event::key(EventKind::KeyPress)), InputDeviceType::Keyboard);
        assert_eq!(InputDeviceType::of(&Event::new(EventKind::TabletMove)), InputDeviceType::Tablet);
        assert_eq!(InputDeviceType::of(&Event::new(EventKind::Close)), InputDeviceType::None);
    }

    #[test]
    fn test_tracks_changes_and_forwards() {
        let app = Application::new("monitored").unwrap();
        let window = Arc::new(Window::new("target", WindowType::Window).unwrap());
        let monitor = InputDeviceMonitor::new(&app).unwrap();

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        monitor.on_changed(move |t| sink.lock().unwrap().push(t));

        assert_eq!(monitor.last_input_device_type(), InputDeviceType::None);

        app.notify(&window, &Event::key(EventKind::KeyPress)).unwrap();
        app.notify(&window, &Event::key(EventKind::KeyRelease)).unwrap();
        app.notify(&window, &Event::new(EventKind::Close)).unwrap();
        let press = Event::mouse(EventKind::MouseButtonPress, Point::new(1, 1), MouseButtons::LEFT);
        app.notify(&window, &press).unwrap();

        assert_eq!(monitor.last_input_device_type(), InputDeviceType::Mouse);
        assert_eq!(
            *changes.lock().unwrap(),
            vec![InputDeviceType::Keyboard, InputDeviceType::Mouse]
        );
        assert_eq!(window.handled_events().len(), 4);

        monitor.detach(&app).unwrap();
        app.notify(&window, &Event::key(EventKind::KeyPress)).unwrap();
        assert_eq!(monitor.last_input_device_type(), InputDeviceType::Mouse);
    }
}
