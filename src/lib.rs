// Copyright 2025 The shimhook Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # shimhook
//!
//! Per-instance virtual dispatch interception for windowing-toolkit shims.
//!
//! Desktop integration layers often need to change how *one* window, backing store or
//! application object behaves without subclassing it and without affecting any other instance
//! of the same class. `shimhook` makes the dispatch table of every hookable object explicit and
//! swappable: on the first override an instance gets a private copy of its class table (the
//! *ghost table*), the chosen slot is redirected to an interceptor, and the interceptor can
//! still reach the toolkit behaviour through `call_original`.
//!
//! ## Features
//!
//! - **Per-instance overrides** - other instances and other methods keep dispatching normally
//! - **Typed method identifiers** - a [`dispatch::Method`] carries its signature, so an
//!   interceptor of the wrong shape does not compile
//! - **Multiple and virtual inheritance** - methods of secondary and virtual bases are resolved
//!   through their encoded this-adjustment
//! - **Handles, not addresses** - instances are keyed by [`dispatch::InstanceId`]; hooks are
//!   released when the instance is dropped
//! - **Concurrent registry** - hooking different instances from different threads never
//!   contends on a global lock
//!
//! ## Quick Start
//!
//! ```rust
//! use shimhook::prelude::*;
//!
//! let hooks = HookManager::global();
//! let first = Window::new("first", WindowType::Window)?;
//! let second = Window::new("second", WindowType::Window)?;
//!
//! // Refuse to shrink the first window below 100x100
//! hooks.override_method(&first, &Window::RESIZE, |w: &Window, size: Size| {
//!     let size = Size::new(size.width.max(100), size.height.max(100));
//!     let _ = HookManager::global().call_original(w, &Window::RESIZE, size);
//! })?;
//!
//! first.resize(Size::new(10, 10))?;
//! second.resize(Size::new(10, 10))?;
//! assert_eq!(first.size(), Size::new(100, 100));
//! assert_eq!(second.size(), Size::new(10, 10));
//!
//! hooks.clear_ghost_table(&first)?;
//! assert!(!hooks.has_ghost_table(&first));
//! # Ok::<(), shimhook::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`dispatch`] - class layouts, method pointer encoding, slot resolution and dispatch tables
//! - [`hook`] - the instance hook manager, its registry and ghost tables
//! - [`toolkit`] - the hookable toolkit classes (windows, native windows, backing stores, OpenGL
//!   contexts, input contexts, the application) and the display connection state
//! - [`shims`] - desktop-shell shims built on the hook manager
//! - [`marshal`] - posting hook mutations to an object's owner thread
//! - [`config`] - hook manager configuration
//!
//! ## Threading
//!
//! Hookable objects belong to the thread that created them. With the default
//! [`HookConfig`] the manager rejects hook mutations from other threads with
//! [`Error::ForeignThread`]; background event sources post the mutation to the owner thread
//! through a [`marshal::OwnerQueue`] instead. Dispatch itself may happen on any thread, and no
//! lock is held while an interceptor or original implementation runs.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`]. A failing hook operation leaves the instance
//! exactly as it was, so a shim that cannot install its override simply falls back to the
//! toolkit behaviour. See [`Error`] for the failure categories.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: hook installation and removal at `debug`, fallbacks a
//! client should know about at `warn`, and per-call detail at `trace` when
//! [`HookConfig::trace_dispatch`] is set. Installing a subscriber is left to the application.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use shimhook::prelude::*;
///
/// let window = Window::new("prelude", WindowType::Dialog)?;
/// assert!(!HookManager::global().has_ghost_table(&window));
/// # Ok::<(), shimhook::Error>(())
/// ```
pub mod prelude;

/// Hook manager configuration
pub mod config;

/// Class layouts, method identifiers, slot resolution and dispatch tables
pub mod dispatch;

/// The instance hook manager
///
/// Overrides one virtual method on one instance, invokes the original implementation from an
/// interceptor, and removes overrides again. See [`hook::HookManager`].
pub mod hook;

/// Owner-thread marshalling of deferred calls
pub mod marshal;

/// Desktop-shell shims built on the hook manager
pub mod shims;

/// The hookable toolkit classes
pub mod toolkit;

/// `shimhook` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `shimhook` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use shimhook::{Error, HookManager};
/// use shimhook::toolkit::{Window, WindowType};
///
/// let window = Window::new("errors", WindowType::Window)?;
/// match HookManager::global().call_original(&window, &Window::GEOMETRY, ()) {
///     Err(Error::NotVirtual { method, .. }) => assert_eq!(method, "geometry"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// # Ok::<(), shimhook::Error>(())
/// ```
pub use error::Error;

/// The process-wide instance hook manager and its configuration
pub use config::HookConfig;
pub use hook::HookManager;
