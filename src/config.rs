//! Hook manager configuration
//!
//! This module provides the knobs that decide how the [`crate::HookManager`] treats
//! re-installation on an already overridden slot, whether hook mutations are confined
//! to the owner thread of an instance, and how chatty dispatch logging is.

use strum::{Display, EnumIter, EnumString};

/// What to do when an interceptor is installed into a slot that already carries one.
///
/// In both cases the original captured at the first install is kept, so
/// `call_original` never chains through an earlier interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum RehookPolicy {
    /// Swap in the new interceptor and keep the first captured original
    Replace,
    /// Refuse the second install with [`crate::Error::RehookRejected`]
    Reject,
}

/// Configuration for the instance hook manager
///
/// The defaults mirror how UI objects are used by the shims: one owner thread per object,
/// re-hooking allowed (a shim re-applies its hooks when a window property changes), and no
/// per-call tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookConfig {
    /// Policy for overriding a slot that is already overridden on the same instance
    pub rehook: RehookPolicy,

    /// Reject hook mutations (override, reset, clear) from threads other than the owner
    /// Background event sources must use [`crate::marshal::OwnerQueue`] instead
    pub enforce_owner_thread: bool,

    /// Emit a `trace` event for every dispatch routed through [`crate::HookManager::call_original`]
    pub trace_dispatch: bool,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            rehook: RehookPolicy::Replace,
            enforce_owner_thread: true,
            trace_dispatch: false,
        }
    }
}

impl HookConfig {
    /// Creates a strict configuration
    ///
    /// Rejects re-hooking, enforces owner threads and traces every original call.
    /// Useful while developing a new shim.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            rehook: RehookPolicy::Reject,
            enforce_owner_thread: true,
            trace_dispatch: true,
        }
    }

    /// Creates a permissive configuration
    ///
    /// **Warning**: Without owner-thread enforcement the caller is responsible for
    /// serializing all hook mutations of a given instance.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            rehook: RehookPolicy::Replace,
            enforce_owner_thread: false,
            trace_dispatch: false,
        }
    }

    /// Returns a copy with the given re-hook policy
    #[must_use]
    pub fn with_rehook(mut self, rehook: RehookPolicy) -> Self {
        self.rehook = rehook;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_hook_config_presets() {
        let default = HookConfig::default();
        assert_eq!(default.rehook, RehookPolicy::Replace);
        assert!(default.enforce_owner_thread);
        assert!(!default.trace_dispatch);

        let strict = HookConfig::strict();
        assert_eq!(strict.rehook, RehookPolicy::Reject);
        assert!(strict.enforce_owner_thread);
        assert!(strict.trace_dispatch);

        let permissive = HookConfig::permissive();
        assert_eq!(permissive.rehook, RehookPolicy::Replace);
        assert!(!permissive.enforce_owner_thread);
    }

    #[test]
    fn test_with_rehook() {
        let config = HookConfig::default().with_rehook(RehookPolicy::Reject);
        assert_eq!(config.rehook, RehookPolicy::Reject);
        assert!(config.enforce_owner_thread);
    }

    #[test]
    fn test_rehook_policy_names() {
        for policy in RehookPolicy::iter() {
            let name = policy.to_string();
            assert_eq!(RehookPolicy::from_str(&name).unwrap(), policy);
        }
        assert_eq!(RehookPolicy::Replace.to_string(), "replace");
    }
}
