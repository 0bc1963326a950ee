//! Window backing stores.
//!
//! A [`BackingStore`] owns the image a window paints into and pushes damaged regions to the
//! screen on `flush`. Paint operations are not rasterized; they are recorded as [`PaintOp`]s so
//! the effect of interceptors stays observable.

use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

use strum::Display;

use crate::{
    dispatch::{dispatch, ClassLayout, Hookable, Method, MethodPtr, ObjectHeader, VTable},
    toolkit::{
        geometry::{Point, Region, Size},
        shared_table,
        window::Window,
    },
    Result,
};

/// Pixel format of a paint device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[repr(u32)]
pub enum ImageFormat {
    /// 8-bit alpha only
    Alpha8 = 24,
    /// 32-bit RGB without alpha
    Rgb32 = 4,
    /// 32-bit premultiplied ARGB
    Argb32Premultiplied = 6,
}

impl ImageFormat {
    /// Bytes per pixel
    #[must_use]
    pub fn depth_bytes(&self) -> i32 {
        match self {
            ImageFormat::Alpha8 => 1,
            ImageFormat::Rgb32 | ImageFormat::Argb32Premultiplied => 4,
        }
    }
}

/// The image a paint operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintDevice {
    /// Size in pixels
    pub size: Size,
    /// Length of one scan line in bytes
    pub bytes_per_line: i32,
    /// Pixel format
    pub format: ImageFormat,
}

impl PaintDevice {
    /// An image of `size` in `format` with tightly packed scan lines.
    ///
    /// The scan line length saturates for widths beyond the addressable range.
    #[must_use]
    pub fn new(size: Size, format: ImageFormat) -> Self {
        PaintDevice {
            size,
            bytes_per_line: size.width.saturating_mul(format.depth_bytes()),
            format,
        }
    }
}

/// Shared memory segment backing the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmSegment {
    /// Segment id
    pub shmid: u32,
}

/// A recorded paint operation
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOp {
    /// `begin_paint` cleared `region` on `device`
    Clear {
        /// Region being repainted
        region: Region,
        /// The device it was cleared on
        device: PaintDevice,
    },
    /// The window shadow was filled into `region`
    Shadow {
        /// Filled region
        region: Region,
    },
    /// The window border was stroked inside `clip`
    Border {
        /// Region the stroke was clipped to
        clip: Region,
        /// Stroke width in pixels
        width: i32,
        /// Stroke colour as ARGB
        color: u32,
    },
    /// `region` was pushed to the screen at `offset`
    Flush {
        /// Flushed region
        region: Region,
        /// Offset of the window content
        offset: Point,
    },
}

/// The paint buffer of one window.
pub struct BackingStore {
    header: ObjectHeader,
    window: Weak<Window>,
    image: RwLock<Option<PaintDevice>>,
    format: ImageFormat,
    shm: Option<ShmSegment>,
    ops: Mutex<Vec<PaintOp>>,
}

impl BackingStore {
    /// `void BackingStore::begin_paint(Region)`
    pub const BEGIN_PAINT: Method<BackingStore, Region, ()> =
        Method::new("begin_paint", MethodPtr::virtual_slot("BackingStore", 0));
    /// `Option<PaintDevice> BackingStore::paint_device()`
    pub const PAINT_DEVICE: Method<BackingStore, (), Option<PaintDevice>> =
        Method::new("paint_device", MethodPtr::virtual_slot("BackingStore", 1));
    /// `void BackingStore::resize(Size, Region)`
    pub const RESIZE: Method<BackingStore, (Size, Region), ()> =
        Method::new("resize", MethodPtr::virtual_slot("BackingStore", 2));
    /// `void BackingStore::flush(Region, Point)`
    pub const FLUSH: Method<BackingStore, (Region, Point), ()> =
        Method::new("flush", MethodPtr::virtual_slot("BackingStore", 3));

    /// Layout of the `BackingStore` class
    pub fn layout() -> &'static Arc<ClassLayout> {
        static LAYOUT: OnceLock<Arc<ClassLayout>> = OnceLock::new();
        LAYOUT.get_or_init(|| {
            ClassLayout::builder("BackingStore")
                .virtual_method("begin_paint")
                .virtual_method("paint_device")
                .virtual_method("resize")
                .virtual_method("flush")
                .method("window")
                .fields(24)
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
            VTable::builder(BackingStore::layout())
                .implement(&BackingStore::BEGIN_PAINT, |store: &BackingStore, region: Region| {
                    // Clears through the virtual paint_device, so overrides of it apply
                    if let Ok(Some(device)) = store.paint_device() {
                        store.record(PaintOp::Clear { region, device });
                    }
                })?
                .implement(&BackingStore::PAINT_DEVICE, |store: &BackingStore, ()| {
                    *read_lock!(store.image)
                })?
                .implement(
                    &BackingStore::RESIZE,
                    |store: &BackingStore, (size, _static_contents): (Size, Region)| {
                        let image = (!size.is_empty()).then(|| PaintDevice::new(size, store.format));
                        *write_lock!(store.image) = image;
                    },
                )?
                .implement(
                    &BackingStore::FLUSH,
                    |store: &BackingStore, (region, offset): (Region, Point)| {
                        store.record(PaintOp::Flush { region, offset });
                    },
                )?
                .build()
        })
    }

    /// Creates the backing store of `window`, owned by the calling thread.
    ///
    /// `shm` is the shared memory segment the image lives in, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the class table cannot be assembled.
    pub fn new(window: &Arc<Window>, format: ImageFormat, shm: Option<ShmSegment>) -> Result<BackingStore> {
        Ok(BackingStore {
            header: ObjectHeader::new(BackingStore::class_table()?),
            window: Arc::downgrade(window),
            image: RwLock::new(None),
            format,
            shm,
            ops: Mutex::new(Vec::new()),
        })
    }

    /// Prepares `region` for painting
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn begin_paint(&self, region: Region) -> Result<()> {
        dispatch(self, &BackingStore::BEGIN_PAINT, region)
    }

    /// The device paint operations currently target
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn paint_device(&self) -> Result<Option<PaintDevice>> {
        dispatch(self, &BackingStore::PAINT_DEVICE, ())
    }

    /// Reallocates the image for `size`
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn resize(&self, size: Size, static_contents: Region) -> Result<()> {
        dispatch(self, &BackingStore::RESIZE, (size, static_contents))
    }

    /// Pushes `region` to the screen
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn flush(&self, region: Region, offset: Point) -> Result<()> {
        dispatch(self, &BackingStore::FLUSH, (region, offset))
    }

    /// The window this store paints for, while it is alive
    #[must_use]
    pub fn window(&self) -> Option<Arc<Window>> {
        self.window.upgrade()
    }

    /// The image as currently allocated
    #[must_use]
    pub fn image(&self) -> Option<PaintDevice> {
        *read_lock!(self.image)
    }

    /// The shared memory segment of the image
    #[must_use]
    pub fn shm(&self) -> Option<ShmSegment> {
        self.shm
    }

    /// Appends a paint operation to the log
    pub fn record(&self, op: PaintOp) {
        lock!(self.ops).push(op);
    }

    /// Recorded paint operations, oldest first
    #[must_use]
    pub fn ops(&self) -> Vec<PaintOp> {
        lock!(self.ops).clone()
    }

    /// Removes and returns the recorded paint operations
    pub fn take_ops(&self) -> Vec<PaintOp> {
        std::mem::take(&mut *lock!(self.ops))
    }
}

impl Hookable for BackingStore {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
}
