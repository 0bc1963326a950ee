//! Input method bridge.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

use crate::{
    dispatch::{dispatch, ClassLayout, Hookable, Method, MethodPtr, ObjectHeader, VTable},
    toolkit::{geometry::Rect, shared_table},
    Result,
};

/// The platform input context of an application.
///
/// The built-in implementation has no input panel of its own; it only tracks the requested
/// visibility and reports an empty keyboard rectangle.
pub struct InputContext {
    header: ObjectHeader,
    panel_visible: AtomicBool,
}

impl InputContext {
    /// `void InputContext::show_input_panel()`
    pub const SHOW_INPUT_PANEL: Method<InputContext, (), ()> =
        Method::new("show_input_panel", MethodPtr::virtual_slot("InputContext", 0));
    /// `void InputContext::hide_input_panel()`
    pub const HIDE_INPUT_PANEL: Method<InputContext, (), ()> =
        Method::new("hide_input_panel", MethodPtr::virtual_slot("InputContext", 1));
    /// `bool InputContext::is_input_panel_visible()`
    pub const IS_INPUT_PANEL_VISIBLE: Method<InputContext, (), bool> =
        Method::new("is_input_panel_visible", MethodPtr::virtual_slot("InputContext", 2));
    /// `Rect InputContext::keyboard_rect()`
    pub const KEYBOARD_RECT: Method<InputContext, (), Rect> =
        Method::new("keyboard_rect", MethodPtr::virtual_slot("InputContext", 3));

    /// Layout of the `InputContext` class
    pub fn layout() -> &'static Arc<ClassLayout> {
        static LAYOUT: OnceLock<Arc<ClassLayout>> = OnceLock::new();
        LAYOUT.get_or_init(|| {
            ClassLayout::builder("InputContext")
                .virtual_method("show_input_panel")
                .virtual_method("hide_input_panel")
                .virtual_method("is_input_panel_visible")
                .virtual_method("keyboard_rect")
                .fields(8)
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
            VTable::builder(InputContext::layout())
                .implement(&InputContext::SHOW_INPUT_PANEL, |ctx: &InputContext, ()| {
                    ctx.panel_visible.store(true, Ordering::Release);
                })?
                .implement(&InputContext::HIDE_INPUT_PANEL, |ctx: &InputContext, ()| {
                    ctx.panel_visible.store(false, Ordering::Release);
                })?
                .implement(&InputContext::IS_INPUT_PANEL_VISIBLE, |ctx: &InputContext, ()| {
                    ctx.panel_visible.load(Ordering::Acquire)
                })?
                .implement(&InputContext::KEYBOARD_RECT, |_: &InputContext, ()| Rect::default())?
                .build()
        })
    }

    /// Creates an input context owned by the calling thread
    ///
    /// # Errors
    ///
    /// Returns an error if the class table cannot be assembled.
    pub fn new() -> Result<InputContext> {
        Ok(InputContext {
            header: ObjectHeader::new(InputContext::class_table()?),
            panel_visible: AtomicBool::new(false),
        })
    }

    /// Asks for the on-screen keyboard
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn show_input_panel(&self) -> Result<()> {
        dispatch(self, &InputContext::SHOW_INPUT_PANEL, ())
    }

    /// Dismisses the on-screen keyboard
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn hide_input_panel(&self) -> Result<()> {
        dispatch(self, &InputContext::HIDE_INPUT_PANEL, ())
    }

    /// Whether the on-screen keyboard is shown
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn is_input_panel_visible(&self) -> Result<bool> {
        dispatch(self, &InputContext::IS_INPUT_PANEL_VISIBLE, ())
    }

    /// Screen area covered by the on-screen keyboard
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the installed entry does not match the signature.
    pub fn keyboard_rect(&self) -> Result<Rect> {
        dispatch(self, &InputContext::KEYBOARD_RECT, ())
    }
}

impl Hookable for InputContext {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_panel_state() {
        let ctx = InputContext::new().unwrap();
        assert!(!ctx.is_input_panel_visible().unwrap());
        ctx.show_input_panel().unwrap();
        assert!(ctx.is_input_panel_visible().unwrap());
        ctx.hide_input_panel().unwrap();
        assert!(!ctx.is_input_panel_visible().unwrap());
        assert!(ctx.keyboard_rect().unwrap().is_empty());
    }
}
