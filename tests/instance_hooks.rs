//! End-to-end behaviour of the instance hook manager on a class defined through the public API.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, OnceLock,
};

use shimhook::{
    config::{HookConfig, RehookPolicy},
    dispatch::{dispatch, ClassLayout, Entry, Hookable, Method, MethodPtr, ObjectHeader, VTable},
    toolkit::{ClientMessage, PlatformWindow, PropertyNotify, Rect, Window, WindowType},
    Error, HookManager,
};

/// Records which implementation ran
#[derive(Default)]
struct Log(Mutex<Vec<String>>);

impl Log {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

struct Canvas {
    header: ObjectHeader,
    name: &'static str,
    log: Arc<Log>,
}

impl Hookable for Canvas {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
}

const PAINT: Method<Canvas, u32, u32> = Method::new("paint", MethodPtr::virtual_slot("Canvas", 0));
const RESIZE: Method<Canvas, (u32, u32), ()> =
    Method::new("resize", MethodPtr::virtual_slot("Canvas", 1));
const NAME: Method<Canvas, (), &'static str> =
    Method::new("name", MethodPtr::non_virtual("Canvas", 0x1000));

fn canvas_layout() -> Arc<ClassLayout> {
    ClassLayout::builder("Canvas")
        .virtual_method("paint")
        .virtual_method("resize")
        .method("name")
        .fields(16)
        .build()
}

fn canvas_table() -> &'static Arc<VTable> {
    static TABLE: OnceLock<Arc<VTable>> = OnceLock::new();
    TABLE.get_or_init(|| {
        VTable::builder(&canvas_layout())
            .implement(&PAINT, |c: &Canvas, layer: u32| {
                c.log.push(format!("{}: original paint {layer}", c.name));
                layer
            })
            .unwrap()
            .implement(&RESIZE, |c: &Canvas, (w, h): (u32, u32)| {
                c.log.push(format!("{}: original resize {w}x{h}", c.name));
            })
            .unwrap()
            .build()
            .unwrap()
    })
}

impl Canvas {
    fn new(name: &'static str, log: &Arc<Log>) -> Self {
        Canvas {
            header: ObjectHeader::new(canvas_table()),
            name,
            log: log.clone(),
        }
    }

    fn paint(&self, layer: u32) -> u32 {
        dispatch(self, &PAINT, layer).unwrap()
    }

    fn resize(&self, w: u32, h: u32) {
        dispatch(self, &RESIZE, (w, h)).unwrap()
    }
}

#[test]
fn test_paint_override_scenario() {
    let hooks = HookManager::global();
    let log = Arc::new(Log::default());
    let x = Canvas::new("x", &log);

    hooks
        .override_method(&x, &PAINT, |c: &Canvas, layer: u32| {
            c.log.push(format!("{}: interceptor", c.name));
            HookManager::global().call_original(c, &PAINT, layer).unwrap() + 100
        })
        .unwrap();

    assert_eq!(x.paint(1), 101);
    assert_eq!(log.take(), vec!["x: interceptor", "x: original paint 1"]);

    x.resize(3, 4);
    assert_eq!(log.take(), vec!["x: original resize 3x4"]);

    hooks.reset(&x, &PAINT).unwrap();
    assert_eq!(x.paint(2), 2);
    assert_eq!(log.take(), vec!["x: original paint 2"]);
    assert!(!hooks.has_ghost_table(&x));
}

#[test]
fn test_override_does_not_leak_to_other_instances() {
    let hooks = HookManager::global();
    let log = Arc::new(Log::default());
    let x = Canvas::new("x", &log);
    let y = Canvas::new("y", &log);

    hooks
        .override_method(&x, &PAINT, |_: &Canvas, _: u32| 0)
        .unwrap();

    assert_eq!(x.paint(5), 0);
    assert_eq!(y.paint(5), 5);
    assert_eq!(log.take(), vec!["y: original paint 5"]);
    assert!(hooks.has_ghost_table(&x));
    assert!(!hooks.has_ghost_table(&y));
}

#[test]
fn test_second_override_keeps_first_original() {
    let hooks = HookManager::global();
    let log = Arc::new(Log::default());
    let x = Canvas::new("x", &log);

    hooks
        .override_method(&x, &PAINT, |_: &Canvas, _: u32| 1)
        .unwrap();
    hooks
        .override_method(&x, &PAINT, |_: &Canvas, _: u32| 2)
        .unwrap();

    assert_eq!(x.paint(7), 2);
    assert_eq!(hooks.call_original(&x, &PAINT, 7).unwrap(), 7);
    assert_eq!(hooks.override_count(&x), 1);

    hooks.reset(&x, &PAINT).unwrap();
    assert_eq!(x.paint(7), 7);
}

#[test]
fn test_reject_policy_keeps_first_interceptor() {
    let hooks = HookManager::new(HookConfig::default().with_rehook(RehookPolicy::Reject));
    let log = Arc::new(Log::default());
    let x = Canvas::new("x", &log);

    hooks
        .override_method(&x, &PAINT, |_: &Canvas, _: u32| 1)
        .unwrap();
    let second = hooks.override_method(&x, &PAINT, |_: &Canvas, _: u32| 2);

    assert!(matches!(second, Err(Error::RehookRejected { class: "Canvas", .. })));
    assert_eq!(x.paint(0), 1);
}

#[test]
fn test_clear_ghost_table_is_idempotent() {
    let hooks = HookManager::global();
    let log = Arc::new(Log::default());
    let x = Canvas::new("x", &log);

    // Unhooked
    hooks.clear_ghost_table(&x).unwrap();
    hooks.clear_ghost_table(&x).unwrap();
    assert!(!hooks.has_ghost_table(&x));

    hooks
        .override_method(&x, &PAINT, |_: &Canvas, _: u32| 0)
        .unwrap();
    hooks
        .override_method(&x, &RESIZE, |_: &Canvas, _: (u32, u32)| {})
        .unwrap();
    assert_eq!(hooks.override_count(&x), 2);

    hooks.clear_ghost_table(&x).unwrap();
    hooks.clear_ghost_table(&x).unwrap();
    assert!(!hooks.has_ghost_table(&x));
    assert_eq!(hooks.override_count(&x), 0);
    assert_eq!(x.paint(9), 9);
    assert!(x.header().uses_class_table());
}

#[test]
fn test_reset_restores_pre_override_behaviour() {
    let hooks = HookManager::global();
    let log = Arc::new(Log::default());
    let x = Canvas::new("x", &log);

    let before = x.paint(4);
    hooks
        .override_method(&x, &PAINT, |_: &Canvas, layer: u32| layer * 10)
        .unwrap();
    hooks.reset(&x, &PAINT).unwrap();
    hooks.reset(&x, &PAINT).unwrap();
    assert_eq!(x.paint(4), before);
}

#[test]
fn test_non_virtual_method_is_rejected() {
    let hooks = HookManager::global();
    let log = Arc::new(Log::default());
    let x = Canvas::new("x", &log);

    let result = hooks.override_method(&x, &NAME, |_: &Canvas, ()| "hooked");
    match result {
        Err(Error::NotVirtual { class, method }) => {
            assert_eq!(class, "Canvas");
            assert_eq!(method, "name");
        }
        other => panic!("expected NotVirtual, got {other:?}"),
    }
    assert!(!hooks.has_ghost_table(&x));
    assert!(hooks.hooked_instances().iter().all(|id| *id != x.header().id()));
}

#[test]
fn test_dropping_instance_releases_ghost_table() {
    let hooks = HookManager::global();
    let log = Arc::new(Log::default());
    let x = Canvas::new("x", &log);
    let id = x.header().id();

    let destroyed = Arc::new(AtomicUsize::new(0));
    let seen = destroyed.clone();
    x.header().on_destroyed(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    hooks
        .override_method(&x, &PAINT, |_: &Canvas, _: u32| 0)
        .unwrap();
    assert!(hooks.registry().contains(id));

    drop(x);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert!(!hooks.registry().contains(id));
}

#[test]
fn test_unknown_original_after_class_patch() {
    let hooks = HookManager::global();
    let log = Arc::new(Log::default());

    // A private class so the patch stays local to this test
    let table = VTable::builder(&canvas_layout())
        .inherit(canvas_table())
        .build()
        .unwrap();
    let x = Canvas {
        header: ObjectHeader::new(&table),
        name: "x",
        log: log.clone(),
    };

    hooks
        .override_method(&x, &PAINT, |_: &Canvas, _: u32| 0)
        .unwrap();
    let slot = shimhook::dispatch::resolve_slot(table.layout(), RESIZE.ptr()).unwrap();
    table.patch(slot, Entry::new(|_: &Canvas, _: (u32, u32)| {}));

    assert!(matches!(
        hooks.call_original(&x, &RESIZE, (1, 1)),
        Err(Error::UnknownOriginal { class: "Canvas", .. })
    ));
    assert_eq!(hooks.call_original(&x, &PAINT, 3).unwrap(), 3);
}

#[test]
fn test_foreign_thread_mutation_rejected() {
    let hooks = HookManager::global();
    let window = Window::new("owned", WindowType::Window).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let result = hooks.override_method(&window, &Window::EXPOSE, |_, _| {});
            assert!(matches!(result, Err(Error::ForeignThread { .. })));
            // Dispatch from a foreign thread is allowed
            window.expose(Rect::new(0, 0, 1, 1).into()).unwrap();
        });
    });
    assert!(!hooks.has_ghost_table(&window));
    assert_eq!(window.exposed_regions().len(), 1);
}

#[test]
fn test_secondary_base_method_hooked_through_adjustment() {
    let hooks = HookManager::global();
    let first = PlatformWindow::new(Rect::new(0, 0, 10, 10)).unwrap();
    let second = PlatformWindow::new(Rect::new(0, 0, 10, 10)).unwrap();
    let ping = |window: &PlatformWindow| ClientMessage::new(window.native_id(), window.atom("_NET_WM_PING"), [0; 5]);
    let other = |window: &PlatformWindow| ClientMessage::new(window.native_id(), window.atom("WM_TAKE_FOCUS"), [0; 5]);

    hooks
        .override_method(
            &first,
            &PlatformWindow::HANDLE_CLIENT_MESSAGE,
            |w: &PlatformWindow, msg: ClientMessage| {
                msg.message_type == w.atom("_NET_WM_PING")
                    || HookManager::global()
                        .call_original(w, &PlatformWindow::HANDLE_CLIENT_MESSAGE, msg)
                        .unwrap()
            },
        )
        .unwrap();

    assert!(first.handle_client_message(ping(&first)).unwrap());
    assert!(!first.handle_client_message(other(&first)).unwrap());
    assert!(!second.handle_client_message(ping(&second)).unwrap());

    // The neighbouring listener slot is untouched
    first
        .handle_property_notify(PropertyNotify::new(first.native_id(), "WM_NAME"))
        .unwrap();
    assert_eq!(first.notifications().len(), 1);
    assert_eq!(hooks.override_count(&first), 1);
}

#[test]
fn test_scoped_override() {
    let hooks = HookManager::global();
    let log = Arc::new(Log::default());
    let x = Canvas::new("x", &log);
    {
        let _guard = hooks
            .scoped_override(&x, &PAINT, |_: &Canvas, _: u32| 0)
            .unwrap();
        assert_eq!(x.paint(3), 0);
    }
    assert_eq!(x.paint(3), 3);
    assert!(!hooks.has_ghost_table(&x));
}
