use std::collections::TryReserveError;

use thiserror::Error;

use crate::dispatch::{InstanceId, SlotIndex};

macro_rules! unsupported_layout {
    // Single string version
    ($msg:expr) => {
        crate::Error::UnsupportedLayout {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::UnsupportedLayout {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every failure this library can report.
///
/// Resolution errors ([`Error::NotVirtual`], [`Error::UnsupportedLayout`]) are permanent: the
/// same method pointer will never resolve against the same class layout, so callers must not
/// retry. Everything else concerns a single hook attempt or a single call and leaves the
/// affected instance exactly as it was before the failing operation.
///
/// # Error Categories
///
/// ## Slot Resolution
/// - [`Error::NotVirtual`] - The method pointer denotes a direct (non-virtual) entry
/// - [`Error::UnsupportedLayout`] - The encoding cannot be mapped onto the class layout
///
/// ## Dispatch
/// - [`Error::UnknownOriginal`] - No unambiguous original exists for a slot
/// - [`Error::SignatureMismatch`] - A slot holds an implementation of another signature
/// - [`Error::Unimplemented`] - A class table was built with an empty slot
///
/// ## Hook Installation
/// - [`Error::RehookRejected`] - The slot is already overridden and the policy forbids replacing
/// - [`Error::ForeignThread`] - A hook was mutated from a thread that does not own the instance
/// - [`Error::Allocation`] - The ghost table could not be allocated
///
/// ## Marshalling
/// - [`Error::QueueClosed`] - The owner thread's queue is gone
/// - [`Error::EventLoop`] - The owner event loop rejected the queue source
///
/// # Examples
///
/// ```rust
/// use shimhook::{Error, HookManager};
/// use shimhook::toolkit::{Window, WindowType};
///
/// let window = Window::new("demo", WindowType::Window)?;
/// match HookManager::global().override_method(&window, &Window::RESIZE, |_, _| {}) {
///     Ok(()) => println!("hook installed"),
///     Err(Error::NotVirtual { method, .. }) => eprintln!("{method} is not virtual"),
///     Err(e) => eprintln!("hook not installed: {e}"),
/// }
/// # Ok::<(), shimhook::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Slot resolution
    /// The method pointer denotes a direct code entry, not a dispatch-table offset.
    ///
    /// Non-virtual methods are never routed through a dispatch table, so there is nothing
    /// to intercept on a per-instance basis.
    #[error("{class}::{method} is not a virtual method")]
    NotVirtual {
        /// The class that declared the method
        class: &'static str,
        /// Name of the method, as far as it is known
        method: &'static str,
    },

    /// The method pointer could not be mapped deterministically onto the class layout.
    ///
    /// This happens for misaligned table offsets, this-adjustments that match no subobject,
    /// ambiguous bases, or offsets past the end of the declaring class's table. It signals a
    /// binding gap, not a usage error. The error includes the source location where the
    /// mismatch was detected.
    #[error("Unsupported layout - {file}:{line}: {message}")]
    UnsupportedLayout {
        /// The message to be printed for the UnsupportedLayout error
        message: String,
        /// The source file in which this error occurred
        file: &'static str,
        /// The source line in which this error occurred
        line: u32,
    },

    // Dispatch
    /// `call_original` was requested for a slot that has no recorded original and whose
    /// class-shared entry is no longer the one the ghost table was copied from.
    ///
    /// Callers should treat this like invoking the unmodified method, or skip the call.
    #[error("No original implementation recorded for {class} slot {slot}")]
    UnknownOriginal {
        /// Class of the instance
        class: &'static str,
        /// The slot that was requested
        slot: SlotIndex,
    },

    /// The entry stored in a slot was built for a different method signature.
    #[error("Slot {slot} does not hold an implementation with the signature of {method}")]
    SignatureMismatch {
        /// Name of the method the caller dispatched through
        method: &'static str,
        /// The slot that was read
        slot: SlotIndex,
    },

    /// A class dispatch table was built while a virtual method had no implementation.
    #[error("{class}::{method} has no implementation")]
    Unimplemented {
        /// The class whose table is incomplete
        class: &'static str,
        /// The virtual method without an implementation
        method: &'static str,
    },

    // Hook installation
    /// The slot already carries an interceptor and the active policy rejects replacing it.
    #[error("{class} slot {slot} is already overridden on this instance")]
    RehookRejected {
        /// Class of the instance
        class: &'static str,
        /// The overridden slot
        slot: SlotIndex,
    },

    /// A hook on an instance was mutated from a thread other than its owner thread.
    ///
    /// Background threads must post to the owner thread through
    /// [`crate::marshal::OwnerQueue`] instead.
    #[error("Instance {instance} is owned by another thread")]
    ForeignThread {
        /// The instance that was touched
        instance: InstanceId,
    },

    /// Allocating the private dispatch table failed; the hook was not installed.
    #[error("{0}")]
    Allocation(#[from] TryReserveError),

    // Marshalling
    /// The owner thread's deferred-call queue has been dropped.
    #[error("The owner thread queue is closed")]
    QueueClosed,

    /// The owner event loop could not register the deferred-call queue.
    #[error("{0}")]
    EventLoop(String),
}
