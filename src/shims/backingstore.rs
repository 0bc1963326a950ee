//! Decorated paint buffers.
//!
//! [`BackingStoreHelper`] hooks `begin_paint`, `paint_device`, `resize` and `flush` of the
//! backing stores handed to it:
//!
//! - While an opaque window begins painting, nested `paint_device` calls get a 1x1 scratch
//!   device, so the clear that `begin_paint` performs does not touch the real image.
//! - Before a flush, the window shadow and border are painted into the part of the flushed
//!   region that lies outside the window's clip path.
//! - After a resize of a shared-memory image, the image description is published as the
//!   [`SHM_INFO_PROPERTY`] window property.
//!
//! The hooks are released when the store's window is destroyed.

use std::{
    cell::Cell,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use dashmap::DashMap;

use super::glcontext::GlContextHelper;
use crate::{
    dispatch::{Hookable, InstanceId},
    hook::HookManager,
    toolkit::{
        BackingStore, ImageFormat, PaintDevice, PaintOp, Point, PropertyValue, Region,
        ShmSegment, Size, Window,
    },
    Result,
};

/// Window property that keeps the real paint device during `begin_paint`
pub const TRANSPARENT_BACKGROUND_PROPERTY: &str = "_d_dxcb_TransparentBackground";

/// Window property carrying the shared-memory image description
pub const SHM_INFO_PROPERTY: &str = "_DEEPIN_DXCB_SHM_INFO";

thread_local! {
    static SCRATCH_PAINT_DEVICE: Cell<bool> = const { Cell::new(false) };
}

/// How the helper decorates one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoration {
    /// Corner radius in logical pixels
    pub radius: f64,
    /// Clip path set by the application, in logical pixels
    pub clip_path: Option<Region>,
    /// Border width in device pixels
    pub border_width: i32,
    /// Border colour as ARGB; a zero alpha disables the border
    pub border_color: u32,
    /// Device pixel ratio of the window's screen
    pub device_pixel_ratio: f64,
}

impl Default for Decoration {
    fn default() -> Self {
        Decoration {
            radius: 0.0,
            clip_path: None,
            border_width: 0,
            border_color: 0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl Decoration {
    /// Corner radius in device pixels
    #[must_use]
    pub fn scaled_radius(&self) -> i32 {
        (self.radius * self.device_pixel_ratio).round() as i32
    }

    /// Clip path in device pixels, empty if none is set
    #[must_use]
    pub fn scaled_clip_path(&self) -> Region {
        self.clip_path
            .as_ref()
            .map(|path| path.scaled(self.device_pixel_ratio))
            .unwrap_or_default()
    }
}

/// The 9-word shared memory descriptor `[shmid, w, h, bytes_per_line, format, x, y, w, h]`.
///
/// Returns `None` if a dimension does not fit an unsigned word.
fn shm_info(shm: ShmSegment, image: &PaintDevice) -> Option<Vec<u32>> {
    let width = u32::try_from(image.size.width).ok()?;
    let height = u32::try_from(image.size.height).ok()?;
    let bytes_per_line = u32::try_from(image.bytes_per_line).ok()?;
    Some(vec![
        shm.shmid,
        width,
        height,
        bytes_per_line,
        image.format as u32,
        0,
        0,
        width,
        height,
    ])
}

#[derive(Debug)]
pub(super) struct Shared {
    pub(super) hooks: &'static HookManager,
    pub(super) decorations: DashMap<InstanceId, Decoration>,
    pub(super) window_alpha: AtomicBool,
}

impl Shared {
    /// Decoration of `window`, if it has one worth painting
    pub(super) fn painted_decoration(&self, window: &Window) -> Option<Decoration> {
        let decoration = self
            .decorations
            .get(&window.header().id())
            .map(|d| d.value().clone())?;
        (decoration.clip_path.is_some() || decoration.scaled_radius() > 0).then_some(decoration)
    }

    fn begin_paint(&self, store: &BackingStore, region: Region) {
        let has_alpha = store
            .window()
            .and_then(|w| w.property(TRANSPARENT_BACKGROUND_PROPERTY))
            .is_some_and(|v| v.to_bool());

        if !has_alpha {
            SCRATCH_PAINT_DEVICE.with(|flag| flag.set(true));
        }
        if let Err(e) = self.hooks.call_original(store, &BackingStore::BEGIN_PAINT, region) {
            tracing::warn!(store = %store.header().id(), error = %e, "original begin_paint failed");
        }
        SCRATCH_PAINT_DEVICE.with(|flag| flag.set(false));
    }

    fn paint_device(&self, store: &BackingStore) -> Option<PaintDevice> {
        if SCRATCH_PAINT_DEVICE.with(Cell::get) {
            tracing::trace!(store = %store.header().id(), "using scratch paint device");
            return Some(PaintDevice::new(Size::new(1, 1), ImageFormat::Alpha8));
        }
        self.hooks
            .call_original(store, &BackingStore::PAINT_DEVICE, ())
            .unwrap_or_else(|e| {
                tracing::warn!(store = %store.header().id(), error = %e, "original paint_device failed");
                None
            })
    }

    fn resize(&self, store: &BackingStore, size: Size, static_contents: Region) {
        if let Err(e) = self
            .hooks
            .call_original(store, &BackingStore::RESIZE, (size, static_contents))
        {
            tracing::warn!(store = %store.header().id(), error = %e, "original resize failed");
            return;
        }

        let (Some(shm), Some(image), Some(window)) = (store.shm(), store.image(), store.window()) else {
            return;
        };
        let Some(info) = shm_info(shm, &image) else {
            tracing::warn!(store = %store.header().id(), ?image, "image geometry not publishable");
            return;
        };
        tracing::debug!(window = %window.header().id(), shmid = shm.shmid, %size, "publishing shared memory image");
        window.set_property(SHM_INFO_PROPERTY, PropertyValue::Cardinals(info));
    }

    fn flush(&self, store: &BackingStore, region: Region, offset: Point) {
        let device = match store.paint_device() {
            Ok(Some(device)) => device,
            Ok(None) => {
                tracing::debug!(store = %store.header().id(), "no paint device, nothing to flush");
                return;
            }
            Err(e) => {
                tracing::warn!(store = %store.header().id(), error = %e, "paint_device failed");
                return;
            }
        };

        if self.window_alpha.load(Ordering::Acquire) {
            if let Some(window) = store.window() {
                self.paint_decoration(store, &window, &region, device);
            }
        }

        if let Err(e) = self.hooks.call_original(store, &BackingStore::FLUSH, (region, offset)) {
            tracing::warn!(store = %store.header().id(), error = %e, "original flush failed");
        }
    }

    fn paint_decoration(&self, store: &BackingStore, window: &Window, region: &Region, device: PaintDevice) {
        let Some(decoration) = self.painted_decoration(window) else {
            return;
        };
        let radius = decoration.scaled_radius();
        let path = region.subtracted(&decoration.scaled_clip_path());
        if path.is_empty() {
            tracing::trace!(window = %window.header().id(), "flushed region lies inside the clip path");
            return;
        }

        tracing::trace!(window = %window.header().id(), format = %device.format, radius, "painting shadow");
        store.record(PaintOp::Shadow { region: path.clone() });
        if decoration.border_width > 0 && decoration.border_color >> 24 != 0 {
            store.record(PaintOp::Border {
                clip: path,
                width: decoration.border_width,
                color: decoration.border_color,
            });
        }
    }
}

/// Installs the decoration hooks on backing stores.
#[derive(Debug, Clone)]
pub struct BackingStoreHelper {
    shared: Arc<Shared>,
}

impl Default for BackingStoreHelper {
    fn default() -> Self {
        BackingStoreHelper::new(HookManager::global())
    }
}

impl BackingStoreHelper {
    /// Creates a helper installing its hooks through `hooks`
    #[must_use]
    pub fn new(hooks: &'static HookManager) -> Self {
        BackingStoreHelper {
            shared: Arc::new(Shared {
                hooks,
                decorations: DashMap::new(),
                window_alpha: AtomicBool::new(true),
            }),
        }
    }

    /// Hooks the paint methods of `store`.
    ///
    /// The hooks are cleared when the store's window is destroyed.
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if one of the overrides cannot be installed. Hooks
    /// installed before the failing one stay in place.
    pub fn add_backing_store(&self, store: &BackingStore) -> Result<()> {
        let hooks = self.shared.hooks;

        let shared = Arc::clone(&self.shared);
        hooks.override_method(store, &BackingStore::BEGIN_PAINT, move |s: &BackingStore, region: Region| {
            shared.begin_paint(s, region);
        })?;
        let shared = Arc::clone(&self.shared);
        hooks.override_method(store, &BackingStore::PAINT_DEVICE, move |s: &BackingStore, ()| {
            shared.paint_device(s)
        })?;
        let shared = Arc::clone(&self.shared);
        hooks.override_method(
            store,
            &BackingStore::RESIZE,
            move |s: &BackingStore, (size, static_contents): (Size, Region)| {
                shared.resize(s, size, static_contents);
            },
        )?;
        let shared = Arc::clone(&self.shared);
        hooks.override_method(
            store,
            &BackingStore::FLUSH,
            move |s: &BackingStore, (region, offset): (Region, Point)| {
                shared.flush(s, region, offset);
            },
        )?;

        if let Some(window) = store.window() {
            let store_id = store.header().id();
            let shared: Weak<Shared> = Arc::downgrade(&self.shared);
            window.header().on_destroyed(move |window_id| {
                hooks.clear_ghost_table_by_id(store_id);
                if let Some(shared) = shared.upgrade() {
                    shared.decorations.remove(&window_id);
                }
            });
        }

        tracing::debug!(store = %store.header().id(), "backing store hooked");
        Ok(())
    }

    /// Sets how the window is decorated on flush
    pub fn set_decoration(&self, window: &Window, decoration: Decoration) {
        self.shared.decorations.insert(window.header().id(), decoration);
    }

    /// The decoration of `window`, if one was set
    #[must_use]
    pub fn decoration(&self, window: &Window) -> Option<Decoration> {
        self.shared
            .decorations
            .get(&window.header().id())
            .map(|d| d.value().clone())
    }

    /// A helper decorating OpenGL swaps of the windows this helper decorates
    #[must_use]
    pub fn gl_context_helper(&self) -> GlContextHelper {
        GlContextHelper::new(Arc::clone(&self.shared))
    }

    /// Whether the compositor supports translucent windows; decorations are only painted if so
    pub fn set_window_alpha(&self, supported: bool) {
        self.shared.window_alpha.store(supported, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::init_tracing,
        toolkit::{Rect, WindowType},
    };

    fn store_for(window: &Arc<Window>, shm: Option<ShmSegment>) -> BackingStore {
        let store = BackingStore::new(window, ImageFormat::Argb32Premultiplied, shm).unwrap();
        store.resize(Size::new(100, 80), Region::new()).unwrap();
        store
    }

    #[test]
    fn test_begin_paint_uses_scratch_device_for_opaque_windows() {
        let helper = BackingStoreHelper::default();
        let window = Arc::new(Window::new("opaque", WindowType::Window).unwrap());
        let store = store_for(&window, None);
        helper.add_backing_store(&store).unwrap();

        store.begin_paint(Region::from(Rect::new(0, 0, 10, 10))).unwrap();
        let ops = store.take_ops();
        assert!(
            matches!(&ops[..], [PaintOp::Clear { device, .. }] if device.format == ImageFormat::Alpha8)
        );

        // Outside begin_paint the real image is visible again
        assert_eq!(store.paint_device().unwrap().unwrap().size, Size::new(100, 80));

        window.set_property(TRANSPARENT_BACKGROUND_PROPERTY, PropertyValue::Bool(true));
        store.begin_paint(Region::from(Rect::new(0, 0, 10, 10))).unwrap();
        let ops = store.take_ops();
        assert!(
            matches!(&ops[..], [PaintOp::Clear { device, .. }] if device.size == Size::new(100, 80))
        );
    }

    #[test]
    fn test_flush_paints_outside_clip_path() {
        init_tracing();
        let helper = BackingStoreHelper::default();
        let window = Arc::new(Window::new("decorated", WindowType::Window).unwrap());
        let store = store_for(&window, None);
        helper.add_backing_store(&store).unwrap();
        helper.set_decoration(
            &window,
            Decoration {
                radius: 4.0,
                clip_path: Some(Region::from(Rect::new(0, 0, 50, 80))),
                border_width: 1,
                border_color: 0xff00_0000,
                device_pixel_ratio: 1.0,
            },
        );

        let damage = Region::from(Rect::new(0, 0, 100, 80));
        store.flush(damage.clone(), Point::new(0, 0)).unwrap();

        let ops = store.take_ops();
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0], PaintOp::Shadow { region } if region.area() == 50 * 80));
        assert!(matches!(&ops[1], PaintOp::Border { width: 1, .. }));
        assert!(matches!(&ops[2], PaintOp::Flush { region, .. } if *region == damage));
    }

    #[test]
    fn test_flush_without_decoration_only_flushes() {
        let helper = BackingStoreHelper::default();
        let window = Arc::new(Window::new("plain", WindowType::Window).unwrap());
        let store = store_for(&window, None);
        helper.add_backing_store(&store).unwrap();
        helper.set_decoration(
            &window,
            Decoration {
                border_width: 2,
                border_color: 0xffff_ffff,
                ..Decoration::default()
            },
        );

        store.flush(Region::from(Rect::new(0, 0, 5, 5)), Point::new(0, 0)).unwrap();
        let ops = store.take_ops();
        assert!(matches!(&ops[..], [PaintOp::Flush { .. }]));
    }

    #[test]
    fn test_resize_publishes_shm_info() {
        let helper = BackingStoreHelper::default();
        let window = Arc::new(Window::new("shm", WindowType::Window).unwrap());
        let store = BackingStore::new(&window, ImageFormat::Argb32Premultiplied, Some(ShmSegment { shmid: 7 })).unwrap();
        helper.add_backing_store(&store).unwrap();

        store.resize(Size::new(20, 10), Region::new()).unwrap();
        assert_eq!(
            window.property(SHM_INFO_PROPERTY),
            Some(PropertyValue::Cardinals(vec![7, 20, 10, 80, 6, 0, 0, 20, 10]))
        );
    }

    #[test]
    fn test_window_destruction_clears_store_hooks() {
        let hooks = HookManager::global();
        let helper = BackingStoreHelper::default();
        let window = Arc::new(Window::new("short-lived", WindowType::Window).unwrap());
        let store = store_for(&window, None);
        helper.add_backing_store(&store).unwrap();
        helper.set_decoration(&window, Decoration::default());
        assert_eq!(hooks.override_count(&store), 4);

        drop(window);
        assert!(!hooks.has_ghost_table(&store));
        assert!(helper.shared.decorations.is_empty());
    }

    #[test]
    fn test_shm_info_skips_unrepresentable_geometry() {
        let shm = ShmSegment { shmid: 3 };
        let image = PaintDevice::new(Size::new(4, 2), ImageFormat::Rgb32);
        assert_eq!(shm_info(shm, &image), Some(vec![3, 4, 2, 16, 4, 0, 0, 4, 2]));

        let negative_width = PaintDevice {
            size: Size::new(-4, 2),
            ..image
        };
        assert_eq!(shm_info(shm, &negative_width), None);

        let negative_stride = PaintDevice {
            bytes_per_line: -16,
            ..image
        };
        assert_eq!(shm_info(shm, &negative_stride), None);
    }
}
