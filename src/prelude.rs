//! # shimhook Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the shimhook library. Import this module to get quick access to the hook manager,
//! the dispatch vocabulary and the toolkit classes.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all shimhook operations
pub use crate::Error;

/// The result type used throughout shimhook
pub use crate::Result;

/// Hook manager configuration
pub use crate::config::{HookConfig, RehookPolicy};

// ================================================================================================
// Hooking
// ================================================================================================

/// Instance hook manager, its registry and scoped overrides
pub use crate::hook::{GhostTable, HookGuard, HookManager, OverrideEntry, Registry};

/// Owner-thread queue for hook mutations from background threads
pub use crate::marshal::OwnerQueue;

// ================================================================================================
// Dispatch
// ================================================================================================

/// Dispatch vocabulary: layouts, method identifiers, handles and tables
pub use crate::dispatch::{
    dispatch, resolve_slot, ClassLayout, Hookable, InstanceId, Method, MethodPtr, ObjectHeader,
    SlotIndex, VTable,
};

// ================================================================================================
// Toolkit
// ================================================================================================

/// Hookable toolkit classes
pub use crate::toolkit::{
    Application, BackingStore, GlContext, InputContext, PlatformWindow, Window, WindowFlags, WindowType,
};

/// Display connection and native events
pub use crate::toolkit::{ClientMessage, Connection, Crossing, DropActions, DropData, DropEvent, FocusEvent};

/// Events and geometry
pub use crate::toolkit::{Event, EventKind, EventRef, MouseButtons, Point, Rect, Region, Size};

// ================================================================================================
// Shims
// ================================================================================================

/// Desktop-shell shims
pub use crate::shims::{
    BackingStoreHelper, GlContextHelper, InputContextHook, InputDeviceMonitor, NoTitlebarHelper, WindowEventHook,
};
