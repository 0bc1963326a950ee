//! Event delivery.

use std::sync::{Arc, OnceLock};

use crate::{
    dispatch::{dispatch, ClassLayout, Hookable, Method, MethodPtr, ObjectHeader, VTable},
    toolkit::{event::EventRef, object_layout, shared_table, window::Window},
    Result,
};

/// The GUI application object.
///
/// Every event a window receives passes through [`Application::notify`] first, which makes it
/// the interception point for application-wide input monitoring.
pub struct Application {
    header: ObjectHeader,
    name: String,
}

impl Application {
    /// `bool Object::event(EventRef)`, events addressed to the application itself
    pub const EVENT: Method<Application, EventRef, bool> =
        Method::new("event", MethodPtr::virtual_slot("Object", 0));
    /// `bool GuiApplication::notify(Window, EventRef)`
    pub const NOTIFY: Method<Application, (Arc<Window>, EventRef), bool> =
        Method::new("notify", MethodPtr::virtual_slot("GuiApplication", 1));

    /// Layout of the `GuiApplication` class
    pub fn layout() -> &'static Arc<ClassLayout> {
        static LAYOUT: OnceLock<Arc<ClassLayout>> = OnceLock::new();
        LAYOUT.get_or_init(|| {
            ClassLayout::builder("GuiApplication")
                .extends(object_layout())
                .virtual_method("notify")
                .fields(32)
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
            VTable::builder(Application::layout())
                .implement(&Application::EVENT, |_: &Application, _: EventRef| false)?
                .implement(
                    &Application::NOTIFY,
                    |_: &Application, (window, event): (Arc<Window>, EventRef)| match window.event(&event) {
                        Ok(handled) => handled,
                        Err(e) => {
                            tracing::warn!(window = %window.header().id(), error = %e, "event delivery failed");
                            false
                        }
                    },
                )?
                .build()
        })
    }

    /// Creates the application object, owned by the calling thread
    ///
    /// # Errors
    ///
    /// Returns an error if the class table cannot be assembled.
    pub fn new(name: &str) -> Result<Application> {
        Ok(Application {
            header: ObjectHeader::new(Application::class_table()?),
            name: name.to_string(),
        })
    }

    /// Name of the application
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivers `event` to `window`; returns true if a receiver handled it
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn notify(&self, window: &Arc<Window>, event: &EventRef) -> Result<bool> {
        dispatch(self, &Application::NOTIFY, (Arc::clone(window), event.clone()))
    }

    /// Delivers `event` to the application itself
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn event(&self, event: &EventRef) -> Result<bool> {
        dispatch(self, &Application::EVENT, event.clone())
    }
}

impl Hookable for Application {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::{
        event::{Event, EventKind},
        window::WindowType,
    };

    #[test]
    fn test_method_ptrs_match_layout() {
        let layout = Application::layout();
        assert_eq!(layout.method_ptr("Object", "event"), Some(Application::EVENT.ptr()));
        assert_eq!(
            layout.method_ptr("GuiApplication", "notify"),
            Some(Application::NOTIFY.ptr())
        );
        assert!(Application::class_table().is_ok());
    }

    #[test]
    fn test_notify_delivers_to_window() {
        let app = Application::new("app").unwrap();
        let window = Arc::new(Window::new("target", WindowType::Window).unwrap());

        assert!(app.notify(&window, &Event::new(EventKind::Close)).unwrap());
        assert!(!app.notify(&window, &Event::new(EventKind::Other)).unwrap());
        assert_eq!(window.handled_events(), vec![EventKind::Close, EventKind::Other]);
        assert!(!app.event(&Event::new(EventKind::Other)).unwrap());
    }

    #[test]
    fn test_event_and_notify_use_distinct_slots() {
        let layout = Application::layout();
        assert_eq!(layout.method_ptr("Object", "event"), Some(Application::EVENT.ptr()));
        assert_eq!(layout.method_ptr("GuiApplication", "notify"), Some(Application::NOTIFY.ptr()));
        assert_eq!(layout.len(), 2);
    }
}
