//! Member-function pointer encoding.
//!
//! A [`MethodPtr`] is the opaque value the binding layer hands to the hook manager to name a
//! method. It follows the familiar two-word layout of a pointer-to-member-function:
//!
//! - `word`: for virtual methods `table_offset + 1` (the low bit is the virtual tag), for
//!   non-virtual methods the code entry shifted left by one so the tag stays clear
//! - `adjustment`: the this-adjustment in bytes, non-zero for methods reached through a
//!   secondary base
//!
//! The declaring class travels alongside, which lets the resolver find the right subobject
//! when the adjustment alone is ambiguous (virtual bases, base-relative pointers).

use std::fmt;

/// Width of one dispatch-table entry in bytes.
pub const SLOT_SIZE: usize = std::mem::size_of::<usize>();

/// Encoded pointer to a member function of a hookable class.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodPtr {
    declaring: &'static str,
    word: usize,
    adjustment: isize,
}

/// The two shapes a [`MethodPtr`] can decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A virtual method, reached through the dispatch table
    Virtual {
        /// Byte offset of the entry within the declaring subobject's table
        table_offset: usize,
        /// This-adjustment in bytes
        adjustment: isize,
    },
    /// A non-virtual method with a fixed code entry
    Direct {
        /// The code entry of the method
        entry: usize,
        /// This-adjustment in bytes
        adjustment: isize,
    },
}

impl MethodPtr {
    /// Pointer to the virtual method at `index` of the table holding the declaring class,
    /// counted from the start of that table (inherited slots included).
    #[must_use]
    pub const fn virtual_slot(declaring: &'static str, index: usize) -> Self {
        MethodPtr {
            declaring,
            word: index * SLOT_SIZE + 1,
            adjustment: 0,
        }
    }

    /// Pointer to a non-virtual method with the given code entry.
    #[must_use]
    pub const fn non_virtual(declaring: &'static str, entry: usize) -> Self {
        MethodPtr {
            declaring,
            word: entry << 1,
            adjustment: 0,
        }
    }

    /// Builds a pointer from its raw words, as produced by foreign binding code.
    #[must_use]
    pub const fn from_raw(declaring: &'static str, word: usize, adjustment: isize) -> Self {
        MethodPtr {
            declaring,
            word,
            adjustment,
        }
    }

    /// Returns a copy carrying the given this-adjustment.
    #[must_use]
    pub const fn with_adjustment(self, adjustment: isize) -> Self {
        MethodPtr {
            declaring: self.declaring,
            word: self.word,
            adjustment,
        }
    }

    /// The class that declared the method.
    #[must_use]
    pub const fn declaring(&self) -> &'static str {
        self.declaring
    }

    /// The raw first word.
    #[must_use]
    pub const fn word(&self) -> usize {
        self.word
    }

    /// The this-adjustment in bytes.
    #[must_use]
    pub const fn adjustment(&self) -> isize {
        self.adjustment
    }

    /// Returns true if the virtual tag is set.
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        self.word & 1 == 1
    }

    /// Splits the pointer into its table offset or code entry plus the adjustment.
    #[must_use]
    pub fn decode(&self) -> Decoded {
        if self.is_virtual() {
            Decoded::Virtual {
                table_offset: self.word - 1,
                adjustment: self.adjustment,
            }
        } else {
            Decoded::Direct {
                entry: self.word >> 1,
                adjustment: self.adjustment,
            }
        }
    }
}

impl fmt::Debug for MethodPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MethodPtr({}, word: 0x{:x}, adj: {})",
            self.declaring, self.word, self.adjustment
        )
    }
}

impl fmt::Display for MethodPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Decoded::Virtual {
                table_offset,
                adjustment,
            } => write!(
                f,
                "{}::[vt+{}]{:+}",
                self.declaring, table_offset, adjustment
            ),
            Decoded::Direct { entry, adjustment } => {
                write!(f, "{}::[0x{:x}]{:+}", self.declaring, entry, adjustment)
            }
        }
    }
}
