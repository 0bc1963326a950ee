//! OpenGL contexts.
//!
//! A [`GlContext`] presents rendered frames into a [`Window`]. Like the backing store it does
//! not render; drawing and swaps are recorded as [`GlOp`]s.

use std::sync::{Arc, Mutex, OnceLock};

use crate::{
    dispatch::{dispatch, ClassLayout, Hookable, InstanceId, Method, MethodPtr, ObjectHeader, VTable},
    toolkit::{
        geometry::{Region, Size},
        shared_table,
        window::Window,
    },
    Result,
};

/// A recorded OpenGL operation
#[derive(Debug, Clone, PartialEq)]
pub enum GlOp {
    /// `region` was filled with the window frame image
    FrameFill {
        /// Filled region
        region: Region,
    },
    /// The window corners in `region` were redrawn from the frame image
    Corners {
        /// Redrawn region
        region: Region,
    },
    /// The back buffer of a surface of `size` was presented
    Swap {
        /// Surface size in device pixels
        size: Size,
    },
}

/// An OpenGL context of the platform integration.
pub struct GlContext {
    header: ObjectHeader,
    current: Mutex<Option<InstanceId>>,
    ops: Mutex<Vec<GlOp>>,
}

impl GlContext {
    /// `bool GlContext::make_current(Window)`
    pub const MAKE_CURRENT: Method<GlContext, Arc<Window>, bool> =
        Method::new("make_current", MethodPtr::virtual_slot("GlContext", 0));
    /// `void GlContext::swap_buffers(Window)`
    pub const SWAP_BUFFERS: Method<GlContext, Arc<Window>, ()> =
        Method::new("swap_buffers", MethodPtr::virtual_slot("GlContext", 1));

    /// Layout of the `GlContext` class
    pub fn layout() -> &'static Arc<ClassLayout> {
        static LAYOUT: OnceLock<Arc<ClassLayout>> = OnceLock::new();
        LAYOUT.get_or_init(|| {
            ClassLayout::builder("GlContext")
                .virtual_method("make_current")
                .virtual_method("swap_buffers")
                .fields(16)
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
            VTable::builder(GlContext::layout())
                .implement(&GlContext::MAKE_CURRENT, |ctx: &GlContext, window: Arc<Window>| {
                    *lock!(ctx.current) = Some(window.header().id());
                    true
                })?
                .implement(&GlContext::SWAP_BUFFERS, |ctx: &GlContext, window: Arc<Window>| {
                    ctx.record(GlOp::Swap { size: window.size() });
                })?
                .build()
        })
    }

    /// Creates a context owned by the calling thread
    ///
    /// # Errors
    ///
    /// Returns an error if the class table cannot be assembled.
    pub fn new() -> Result<GlContext> {
        Ok(GlContext {
            header: ObjectHeader::new(GlContext::class_table()?),
            current: Mutex::new(None),
            ops: Mutex::new(Vec::new()),
        })
    }

    /// Binds the context to `window`; returns false if that failed
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn make_current(&self, window: &Arc<Window>) -> Result<bool> {
        dispatch(self, &GlContext::MAKE_CURRENT, Arc::clone(window))
    }

    /// Presents the back buffer of `window`
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn swap_buffers(&self, window: &Arc<Window>) -> Result<()> {
        dispatch(self, &GlContext::SWAP_BUFFERS, Arc::clone(window))
    }

    /// The window the context was last made current on
    #[must_use]
    pub fn current(&self) -> Option<InstanceId> {
        *lock!(self.current)
    }

    /// Appends an operation to the log
    pub fn record(&self, op: GlOp) {
        lock!(self.ops).push(op);
    }

    /// Takes the recorded operations, oldest first
    pub fn take_ops(&self) -> Vec<GlOp> {
        std::mem::take(&mut *lock!(self.ops))
    }
}

impl Hookable for GlContext {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
}
