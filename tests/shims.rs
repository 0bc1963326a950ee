//! The shims working together on one application.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use shimhook::{
    dispatch::Hookable,
    shims::{
        BackingStoreHelper, Decoration, InputDeviceMonitor, InputDeviceType, NoTitlebarHelper,
        WindowEventHook, ENABLE_SYSTEM_MOVE_PROPERTY,
    },
    toolkit::{
        Application, BackingStore, ClientMessage, Connection, DeviceKind, DropActions, DropEventKind,
        Event, EventKind, GlContext, GlOp, ImageFormat, MouseButtons, NativeEvent, PaintOp,
        PlatformWindow, Point, PropertyValue, Rect, Region, ServerProperty, Size, Window, WindowType,
    },
    HookManager,
};

#[test]
fn test_window_with_helper_and_monitor() {
    let hooks = HookManager::global();
    let app = Application::new("desktop").unwrap();
    let window = Arc::new(Window::new("main", WindowType::Window).unwrap());

    let monitor = InputDeviceMonitor::new(&app).unwrap();
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = changes.clone();
    monitor.on_changed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let helper = NoTitlebarHelper::new(window.clone()).unwrap();

    // The application-level hook and the window-level hook stack
    let drag = Event::mouse(EventKind::MouseMove, Point::new(300, 200), MouseButtons::LEFT);
    assert!(app.notify(&window, &drag).unwrap());
    assert_eq!(window.system_moves(), vec![Point::new(300, 200)]);
    assert_eq!(monitor.last_input_device_type(), InputDeviceType::Mouse);

    let touch = Event::touch(EventKind::TouchBegin, Point::new(1, 1), DeviceKind::TouchScreen);
    app.notify(&window, &touch).unwrap();
    assert_eq!(monitor.last_input_device_type(), InputDeviceType::TouchScreen);
    assert_eq!(changes.load(Ordering::SeqCst), 2);

    helper
        .set_window_property(ENABLE_SYSTEM_MOVE_PROPERTY, PropertyValue::Bool(false))
        .unwrap();
    assert!(!hooks.has_ghost_table(&*window));
    assert!(hooks.has_ghost_table(&app));

    drop(helper);
    monitor.detach(&app).unwrap();
    assert!(!hooks.has_ghost_table(&app));
}

#[test]
fn test_backing_store_lifecycle() {
    let hooks = HookManager::global();
    let helper = BackingStoreHelper::default();
    let window = Arc::new(Window::new("decorated", WindowType::Window).unwrap());
    let store = BackingStore::new(&window, ImageFormat::Argb32Premultiplied, None).unwrap();

    helper.add_backing_store(&store).unwrap();
    helper.set_decoration(
        &window,
        Decoration {
            radius: 8.0,
            ..Decoration::default()
        },
    );
    store.resize(Size::new(64, 64), Region::new()).unwrap();

    store.begin_paint(Region::from(Rect::new(0, 0, 64, 64))).unwrap();
    store.flush(Region::from(Rect::new(0, 0, 64, 64)), Point::new(0, 0)).unwrap();
    let ops = store.take_ops();
    assert!(matches!(
        &ops[..],
        [PaintOp::Clear { .. }, PaintOp::Shadow { .. }, PaintOp::Flush { .. }]
    ));

    // No translucency support: only the plain flush remains
    helper.set_window_alpha(false);
    store.flush(Region::from(Rect::new(0, 0, 8, 8)), Point::new(0, 0)).unwrap();
    assert!(matches!(&store.take_ops()[..], [PaintOp::Flush { .. }]));

    drop(window);
    assert!(!hooks.has_ghost_table(&store));
    assert!(store.window().is_none());
}

#[test]
fn test_decoration_shared_by_backing_store_and_gl_context() {
    let helper = BackingStoreHelper::default();
    let window = Arc::new(Window::new("gl", WindowType::Window).unwrap());
    window.set_geometry(Rect::new(0, 0, 64, 64));
    let store = BackingStore::new(&window, ImageFormat::Argb32Premultiplied, None).unwrap();
    store.resize(Size::new(64, 64), Region::new()).unwrap();
    let context = GlContext::new().unwrap();

    helper.add_backing_store(&store).unwrap();
    helper.gl_context_helper().add_gl_context(&context).unwrap();
    helper.set_decoration(
        &window,
        Decoration {
            radius: 2.0,
            ..Decoration::default()
        },
    );

    store.flush(Region::from(Rect::new(0, 0, 64, 64)), Point::new(0, 0)).unwrap();
    assert!(matches!(store.take_ops()[0], PaintOp::Shadow { .. }));

    context.swap_buffers(&window).unwrap();
    let ops = context.take_ops();
    assert!(matches!(&ops[0], GlOp::Corners { region } if region.area() == 16));
    assert_eq!(ops[1], GlOp::Swap { size: Size::new(64, 64) });
}

#[test]
fn test_drag_between_processes_with_window_event_hook() {
    let hooks = HookManager::global();
    let connection = Connection::new();
    let window =
        PlatformWindow::with_connection(Rect::new(0, 0, 200, 100), WindowType::Window, Arc::clone(&connection))
            .unwrap();
    WindowEventHook::install(&window, false).unwrap();

    let source = connection.allocate_window();
    let uri_list = connection.atom("text/uri-list");
    connection.set_server_property(source, connection.atom("XdndTypeList"), ServerProperty::Atoms(vec![uri_list]));
    let link = connection.atom("XdndActionLink");
    connection.set_server_property(source, connection.atom("XdndActionList"), ServerProperty::Atoms(vec![link]));

    let id = window.native_id();
    let send = |kind: &str, data: [u32; 5]| {
        window
            .handle_client_message(ClientMessage::new(id, connection.atom(kind), data))
            .unwrap()
    };
    assert!(send("XdndEnter", [source, 0, 0, 0, 0]));
    assert!(send("XdndPosition", [source, 0, (20 << 16) | 30, 1, link]));
    assert!(send("XdndDrop", [source, 0, 2, 0, 0]));

    assert_eq!(
        window.delivered().last(),
        Some(&NativeEvent::Drag(DropEventKind::Drop, DropActions::LINK))
    );
    let finished = connection.sent_events().pop().unwrap();
    assert_eq!(finished.message.data[..3], [id, 1, link]);

    // The hooks die with the window
    let instance = window.header().id();
    drop(window);
    assert!(!hooks.hooked_instances().contains(&instance));
}
