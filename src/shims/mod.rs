//! Client shims built on the instance hook manager.
//!
//! Each shim adjusts the behaviour of one toolkit object without subclassing it: it installs
//! interceptors on the instance through [`crate::HookManager`], calls the original
//! implementation where the toolkit behaviour must be kept, and removes its hooks again when
//! the shim or the hooked object goes away.
//!
//! # Shims
//!
//! - [`BackingStoreHelper`] - window decoration and shared-memory publishing on paint buffers
//! - [`GlContextHelper`] - the same decoration on OpenGL buffer swaps
//! - [`WindowEventHook`] - native event filtering and drag-and-drop actions on platform windows
//! - [`NoTitlebarHelper`] - system moves for windows without a title bar
//! - [`InputDeviceMonitor`] - tracks the last input device type across the application
//! - [`InputContextHook`] - routes the input panel to an external input method service

mod backingstore;
mod glcontext;
mod inputcontext;
mod inputmonitor;
mod notitlebar;
mod windowevent;

pub use backingstore::{BackingStoreHelper, Decoration, SHM_INFO_PROPERTY, TRANSPARENT_BACKGROUND_PROPERTY};
pub use glcontext::GlContextHelper;
pub use inputcontext::{InputContextHook, InputMethodService};
pub use inputmonitor::{InputDeviceMonitor, InputDeviceType};
pub use notitlebar::{NoTitlebarHelper, DEFAULT_DRAG_DISTANCE, ENABLE_SYSTEM_MOVE_PROPERTY};
pub use windowevent::{WindowEventHook, DIRECT_SAVE_FORMAT, NET_WM_STATES_PROPERTY};
