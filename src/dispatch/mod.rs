//! Virtual dispatch model: class layouts, method pointers, slot resolution and dispatch tables.
//!
//! This module is the leaf of the crate. It describes how hookable classes lay out their
//! dispatch tables ([`ClassLayout`]), how the binding layer names virtual methods
//! ([`MethodPtr`], [`Method`]), how a method maps onto a slot ([`resolve_slot`]) and how objects
//! dispatch through a per-instance, swappable table ([`VTable`], [`ObjectHeader`],
//! [`dispatch`]).
//!
//! # Architecture
//!
//! - [`layout`] - Type descriptors with primary, secondary and virtual subobjects
//! - [`methodptr`] - The two-word member-function pointer encoding
//! - [`resolver`] - Pure mapping from a method pointer onto a flat slot index
//! - [`table`] - Type-erased entries, typed method ids, class and ghost tables
//! - [`object`] - Instance handles, object headers and the dispatch entry point
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use shimhook::dispatch::{dispatch, ClassLayout, Hookable, Method, MethodPtr, ObjectHeader, VTable};
//!
//! struct Label {
//!     header: ObjectHeader,
//!     text: String,
//! }
//!
//! impl Hookable for Label {
//!     fn header(&self) -> &ObjectHeader {
//!         &self.header
//!     }
//! }
//!
//! const TEXT: Method<Label, (), String> = Method::new("text", MethodPtr::virtual_slot("Label", 0));
//!
//! let layout = ClassLayout::builder("Label").virtual_method("text").build();
//! let table = VTable::builder(&layout)
//!     .implement(&TEXT, |label: &Label, ()| label.text.clone())?
//!     .build()?;
//!
//! let label = Label { header: ObjectHeader::new(&table), text: "hello".into() };
//! assert_eq!(dispatch(&label, &TEXT, ())?, "hello");
//! # Ok::<(), shimhook::Error>(())
//! ```

pub mod layout;
pub mod methodptr;
pub mod object;
pub mod resolver;
pub mod table;

pub use layout::{ClassLayout, ClassLayoutBuilder, SlotDecl, SlotIndex, Subobject, SubobjectKind};
pub use methodptr::{Decoded, MethodPtr, SLOT_SIZE};
pub use object::{dispatch, Hookable, InstanceId, ObjectHeader, TableCell};
pub use resolver::resolve_slot;
pub use table::{Entry, EntryLocation, Implementation, Method, TableId, VTable, VTableBuilder};
