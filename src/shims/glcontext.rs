//! Decorated OpenGL swaps.
//!
//! OpenGL windows bypass the backing store, so the decoration painted on flush never reaches
//! them. [`GlContextHelper`] hooks `swap_buffers` instead: before the original swap it redraws
//! the part of the window outside its clip path, either from the frame image when the
//! application set a clip path or as the four rounded corners otherwise.

use std::sync::{atomic::Ordering, Arc};

use super::backingstore::Shared;
use crate::{
    dispatch::Hookable,
    toolkit::{GlContext, GlOp, Point, Rect, Region, Window},
    Result,
};

/// Installs the decoration hook on OpenGL contexts.
///
/// Created by [`super::BackingStoreHelper::gl_context_helper`]; both helpers see the same
/// decorations and window alpha setting.
#[derive(Debug, Clone)]
pub struct GlContextHelper {
    shared: Arc<Shared>,
}

impl GlContextHelper {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        GlContextHelper { shared }
    }

    /// Hooks `swap_buffers` of `context`.
    ///
    /// # Errors
    ///
    /// Returns the hook manager's error if the override cannot be installed.
    pub fn add_gl_context(&self, context: &GlContext) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        self.shared.hooks.override_method(
            context,
            &GlContext::SWAP_BUFFERS,
            move |ctx: &GlContext, window: Arc<Window>| swap_buffers(&shared, ctx, window),
        )?;
        tracing::debug!(context = %context.header().id(), "gl context hooked");
        Ok(())
    }
}

/// The `r`x`r` squares in the corners of a `width`x`height` surface
fn corners(width: i32, height: i32, r: i32) -> Region {
    Region::from(Rect::new(0, 0, r, r))
        .united(Rect::new(width - r, 0, r, r))
        .united(Rect::new(0, height - r, r, r))
        .united(Rect::new(width - r, height - r, r, r))
}

fn swap_buffers(shared: &Shared, context: &GlContext, window: Arc<Window>) {
    if shared.window_alpha.load(Ordering::Acquire) {
        if let Some(decoration) = shared.painted_decoration(&window) {
            let size = window.geometry().size();
            let clip_path = decoration.scaled_clip_path();
            let path = Region::from(Rect::from_size(Point::new(0, 0), size)).subtracted(&clip_path);

            if path.is_empty() {
                tracing::trace!(window = %window.header().id(), "window lies inside the clip path");
            } else if decoration.clip_path.is_some() {
                context.record(GlOp::FrameFill { region: path });
            } else {
                let radius = decoration.scaled_radius();
                let region = corners(size.width, size.height, radius).subtracted(&clip_path);
                tracing::trace!(window = %window.header().id(), radius, "redrawing corners");
                context.record(GlOp::Corners { region });
            }
        }
    }

    if let Err(e) = shared
        .hooks
        .call_original(context, &GlContext::SWAP_BUFFERS, window)
    {
        tracing::warn!(context = %context.header().id(), error = %e, "original swap_buffers failed");
    }
}
