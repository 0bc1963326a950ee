//! Per-instance method interception.
//!
//! This module redirects a virtual method of one object instance to caller-supplied logic
//! while keeping the original implementation callable and every other instance untouched.
//!
//! # Key Components
//!
//! - [`HookManager`] - The public contract: override, call original, reset, query and clear
//! - [`GhostTable`] - The private table copy installed for one hooked instance
//! - [`OverrideEntry`] - Interceptor and captured original of one redirected slot
//! - [`Registry`] - Process-wide mapping from instance handles to ghost tables
//! - [`HookGuard`] - Scoped override that resets itself on drop
//!
//! # Lifecycle
//!
//! ```text
//!   Unhooked ── override ──▶ Hooked(1) ── override(other slot) ──▶ Hooked(n)
//!      ▲                        │                                    │
//!      └── reset(last) / clear_ghost_table / instance dropped ◀──────┘
//! ```
//!
//! Teardown is deterministic: dropping an object's header releases its ghost table, so no
//! ghost table ever outlives its instance.

mod ghost;
mod guard;
mod manager;
mod registry;

pub use ghost::{GhostTable, OverrideEntry};
pub use guard::HookGuard;
pub use manager::HookManager;
pub use registry::Registry;
