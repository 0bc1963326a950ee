//! Class layouts: the type descriptors dispatch tables are shaped after.
//!
//! A [`ClassLayout`] describes the dispatch table of one class as a flat list of slots,
//! partitioned into [`Subobject`]s. Every subobject corresponds to one table pointer of a
//! compiled object:
//!
//! - the **primary** subobject at this-offset 0, shared by the class and its chain of primary
//!   bases
//! - one **secondary** subobject per additional (multiple-inheritance) base, at the byte offset
//!   where that base lives inside the object
//! - one **virtual** subobject per virtual base, placed after all non-virtual parts and shared
//!   between every path that inherits it
//!
//! # Examples
//!
//! ```rust
//! use shimhook::dispatch::ClassLayout;
//!
//! let object = ClassLayout::builder("Object").virtual_method("event").build();
//! let listener = ClassLayout::builder("EventListener")
//!     .virtual_method("handle_property_notify")
//!     .build();
//! let window = ClassLayout::builder("PlatformWindow")
//!     .extends(&object)
//!     .implements(&listener)
//!     .virtual_method("set_geometry")
//!     .build();
//!
//! assert_eq!(window.len(), 3);
//! assert_eq!(window.subobjects().len(), 2);
//! ```

use std::{fmt, sync::Arc};

use crate::dispatch::methodptr::{MethodPtr, SLOT_SIZE};

/// Zero-based index of an entry in a flattened dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(usize);

impl SlotIndex {
    /// Creates a slot index
    #[must_use]
    pub const fn new(index: usize) -> Self {
        SlotIndex(index)
    }

    /// Returns the raw index
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declaration of one virtual slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDecl {
    /// The class that introduced the virtual method
    pub declaring: &'static str,
    /// Name of the method
    pub name: &'static str,
}

/// How a subobject is embedded in the complete object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubobjectKind {
    /// The subobject at offset 0, sharing the class's own table pointer
    Primary,
    /// A non-virtual base reached through a this-adjustment
    Secondary,
    /// A virtual base, shared by all inheritance paths
    Virtual,
}

/// A contiguous range of slots served by one table pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subobject {
    kind: SubobjectKind,
    offset: isize,
    first_slot: usize,
    slot_count: usize,
    chain: Vec<&'static str>,
}

impl Subobject {
    /// How this subobject is embedded
    #[must_use]
    pub fn kind(&self) -> SubobjectKind {
        self.kind
    }

    /// Byte offset of the subobject inside the complete object
    #[must_use]
    pub fn offset(&self) -> isize {
        self.offset
    }

    /// First slot of this subobject in the flattened table
    #[must_use]
    pub fn first_slot(&self) -> usize {
        self.first_slot
    }

    /// Number of slots served by this subobject
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Classes sharing this table pointer, most-base first
    #[must_use]
    pub fn chain(&self) -> &[&'static str] {
        &self.chain
    }

    /// Position of `class` in the chain, if it shares this table pointer
    #[must_use]
    pub fn position(&self, class: &str) -> Option<usize> {
        self.chain.iter().position(|c| *c == class)
    }

    /// Returns true if `class` shares this table pointer
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.position(class).is_some()
    }

    fn shifted(&self, kind: SubobjectKind, offset: isize, first_slot: usize) -> Subobject {
        Subobject {
            kind,
            offset,
            first_slot,
            slot_count: self.slot_count,
            chain: self.chain.clone(),
        }
    }
}

/// Dispatch-table layout of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLayout {
    name: &'static str,
    base_size: usize,
    size: usize,
    slots: Vec<SlotDecl>,
    subobjects: Vec<Subobject>,
    virtual_bases: Vec<Arc<ClassLayout>>,
    methods: Vec<SlotDecl>,
}

impl ClassLayout {
    /// Starts describing a class called `name`
    #[must_use]
    pub fn builder(name: &'static str) -> ClassLayoutBuilder {
        ClassLayoutBuilder {
            name,
            primary: None,
            secondary: Vec::new(),
            virtual_bases: Vec::new(),
            virtuals: Vec::new(),
            methods: Vec::new(),
            field_bytes: 0,
        }
    }

    /// Name of the class
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Size of the complete object in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Size of the object without its virtual bases
    #[must_use]
    pub fn base_size(&self) -> usize {
        self.base_size
    }

    /// Number of slots in the flattened table
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the class has no virtual methods at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Declaration of the slot at `slot`
    #[must_use]
    pub fn slot(&self, slot: SlotIndex) -> Option<&SlotDecl> {
        self.slots.get(slot.index())
    }

    /// All slot declarations in table order
    #[must_use]
    pub fn slots(&self) -> &[SlotDecl] {
        &self.slots
    }

    /// All subobjects, primary first, virtual bases last
    #[must_use]
    pub fn subobjects(&self) -> &[Subobject] {
        &self.subobjects
    }

    /// The primary subobject
    #[must_use]
    pub fn primary(&self) -> &Subobject {
        &self.subobjects[0]
    }

    /// Returns true if `class` is a virtual base of this class
    #[must_use]
    pub fn is_virtual_base(&self, class: &str) -> bool {
        self.virtual_bases.iter().any(|b| b.name == class)
    }

    /// Returns true if `class` is this class or one of its bases
    #[must_use]
    pub fn derives_from(&self, class: &str) -> bool {
        self.subobjects.iter().any(|s| s.contains(class))
    }

    /// First slot declared as `declaring::name`, preferring the primary subobject
    #[must_use]
    pub fn find_slot(&self, declaring: &str, name: &str) -> Option<SlotIndex> {
        self.slots
            .iter()
            .position(|s| s.declaring == declaring && s.name == name)
            .map(SlotIndex::new)
    }

    /// Non-virtual method declared at `index`, in the order [`ClassLayout::method_ptr`] encodes
    #[must_use]
    pub fn method_at(&self, index: usize) -> Option<&SlotDecl> {
        self.methods.get(index)
    }

    /// Subobject serving `slot`
    #[must_use]
    pub fn subobject_of(&self, slot: SlotIndex) -> Option<&Subobject> {
        self.subobjects.iter().find(|s| {
            slot.index() >= s.first_slot && slot.index() < s.first_slot + s.slot_count
        })
    }

    /// Encodes `declaring::name` as a method pointer, as seen from this class.
    ///
    /// Virtual methods yield a table offset relative to the declaring subobject, with the
    /// this-adjustment of that subobject (zero for virtual bases, whose offsets are only known
    /// per complete object). Non-virtual methods yield a direct entry. Returns `None` if this
    /// class has no such method.
    #[must_use]
    pub fn method_ptr(&self, declaring: &'static str, name: &str) -> Option<MethodPtr> {
        if let Some(slot) = self.find_slot(declaring, name) {
            let subobject = self.subobject_of(slot)?;
            let index = slot.index() - subobject.first_slot;
            let adjustment = match subobject.kind {
                SubobjectKind::Virtual => 0,
                _ => subobject.offset,
            };
            return Some(MethodPtr::virtual_slot(declaring, index).with_adjustment(adjustment));
        }

        self.methods
            .iter()
            .position(|m| m.declaring == declaring && m.name == name)
            .map(|i| MethodPtr::non_virtual(declaring, 0x1000 + i * 0x10))
    }
}

/// Builder for [`ClassLayout`].
pub struct ClassLayoutBuilder {
    name: &'static str,
    primary: Option<Arc<ClassLayout>>,
    secondary: Vec<Arc<ClassLayout>>,
    virtual_bases: Vec<Arc<ClassLayout>>,
    virtuals: Vec<&'static str>,
    methods: Vec<&'static str>,
    field_bytes: usize,
}

impl ClassLayoutBuilder {
    /// Sets the primary base; its table is shared with this class
    #[must_use]
    pub fn extends(mut self, base: &Arc<ClassLayout>) -> Self {
        self.primary = Some(base.clone());
        self
    }

    /// Adds a secondary (multiple-inheritance) base
    #[must_use]
    pub fn implements(mut self, base: &Arc<ClassLayout>) -> Self {
        self.secondary.push(base.clone());
        self
    }

    /// Adds a virtual base
    #[must_use]
    pub fn virtually_extends(mut self, base: &Arc<ClassLayout>) -> Self {
        self.virtual_bases.push(base.clone());
        self
    }

    /// Declares a new virtual method, appended to the primary table
    #[must_use]
    pub fn virtual_method(mut self, name: &'static str) -> Self {
        self.virtuals.push(name);
        self
    }

    /// Declares a non-virtual method
    #[must_use]
    pub fn method(mut self, name: &'static str) -> Self {
        self.methods.push(name);
        self
    }

    /// Adds payload bytes to the object
    #[must_use]
    pub fn fields(mut self, bytes: usize) -> Self {
        self.field_bytes += bytes;
        self
    }

    /// Lays out the class
    #[must_use]
    pub fn build(self) -> Arc<ClassLayout> {
        let mut slots = Vec::new();
        let mut subobjects = Vec::new();
        let mut methods = Vec::new();
        let mut virtual_groups: Vec<Arc<ClassLayout>> = Vec::new();

        // Primary table: the primary base's primary slots, then our own virtuals
        let (mut chain, mut size) = match &self.primary {
            Some(base) => {
                let primary = base.primary();
                slots.extend_from_slice(
                    &base.slots[primary.first_slot..primary.first_slot + primary.slot_count],
                );
                methods.extend_from_slice(&base.methods);
                (primary.chain.clone(), base.base_size)
            }
            None => (Vec::new(), SLOT_SIZE),
        };
        chain.push(self.name);
        slots.extend(self.virtuals.iter().map(|name| SlotDecl {
            declaring: self.name,
            name,
        }));
        subobjects.push(Subobject {
            kind: SubobjectKind::Primary,
            offset: 0,
            first_slot: 0,
            slot_count: slots.len(),
            chain,
        });

        if let Some(base) = &self.primary {
            for sub in base.subobjects.iter().skip(1) {
                if sub.kind == SubobjectKind::Secondary {
                    let first = slots.len();
                    slots.extend_from_slice(
                        &base.slots[sub.first_slot..sub.first_slot + sub.slot_count],
                    );
                    subobjects.push(sub.shifted(SubobjectKind::Secondary, sub.offset, first));
                }
            }
            collect_virtual_groups(base, &mut virtual_groups);
        }

        for base in &self.secondary {
            let offset = size as isize;
            for sub in base.subobjects.iter() {
                if sub.kind == SubobjectKind::Virtual {
                    continue;
                }
                let first = slots.len();
                slots.extend_from_slice(
                    &base.slots[sub.first_slot..sub.first_slot + sub.slot_count],
                );
                subobjects.push(sub.shifted(SubobjectKind::Secondary, offset + sub.offset, first));
            }
            methods.extend_from_slice(&base.methods);
            collect_virtual_groups(base, &mut virtual_groups);
            size += base.base_size;
        }

        size += self.field_bytes.div_ceil(SLOT_SIZE) * SLOT_SIZE;
        let base_size = size;

        for base in &self.virtual_bases {
            collect_virtual_groups(base, &mut virtual_groups);
            if !virtual_groups.iter().any(|g| g.name == base.name) {
                virtual_groups.push(base.clone());
            }
        }

        let mut virtual_bases = Vec::new();
        for group in &virtual_groups {
            let offset = size as isize;
            for sub in group.subobjects.iter() {
                if sub.kind == SubobjectKind::Virtual {
                    continue;
                }
                let first = slots.len();
                slots.extend_from_slice(
                    &group.slots[sub.first_slot..sub.first_slot + sub.slot_count],
                );
                subobjects.push(sub.shifted(SubobjectKind::Virtual, offset + sub.offset, first));
            }
            methods.extend_from_slice(&group.methods);
            virtual_bases.push(group.clone());
            size += group.base_size;
        }

        methods.extend(self.methods.iter().map(|name| SlotDecl {
            declaring: self.name,
            name,
        }));

        Arc::new(ClassLayout {
            name: self.name,
            base_size,
            size,
            slots,
            subobjects,
            virtual_bases,
            methods,
        })
    }
}

/// Gathers the virtual bases of `base` (by name, once each) into `groups`.
fn collect_virtual_groups(base: &ClassLayout, groups: &mut Vec<Arc<ClassLayout>>) {
    for vbase in &base.virtual_bases {
        if !groups.iter().any(|g| g.name == vbase.name) {
            groups.push(vbase.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::methodptr::Decoded;

    fn object() -> Arc<ClassLayout> {
        ClassLayout::builder("Object")
            .virtual_method("event")
            .virtual_method("timer_event")
            .method("object_name")
            .fields(16)
            .build()
    }

    #[test]
    fn test_single_inheritance_shares_primary_table() {
        let object = object();
        let window = ClassLayout::builder("Window")
            .extends(&object)
            .virtual_method("resize")
            .virtual_method("paint")
            .build();

        assert_eq!(window.len(), 4);
        assert_eq!(window.subobjects().len(), 1);
        assert_eq!(window.primary().chain(), &["Object", "Window"]);
        assert_eq!(window.find_slot("Object", "event"), Some(SlotIndex::new(0)));
        assert_eq!(window.find_slot("Window", "paint"), Some(SlotIndex::new(3)));
        assert!(window.derives_from("Object"));
        assert!(!window.derives_from("Application"));
        assert_eq!(window.size(), SLOT_SIZE + 16);
    }

    #[test]
    fn test_multiple_inheritance_offsets() {
        let object = object();
        let listener = ClassLayout::builder("EventListener")
            .virtual_method("handle_property_notify")
            .virtual_method("handle_client_message")
            .build();
        let window = ClassLayout::builder("PlatformWindow")
            .extends(&object)
            .implements(&listener)
            .virtual_method("set_geometry")
            .build();

        assert_eq!(window.len(), 5);
        let secondary = &window.subobjects()[1];
        assert_eq!(secondary.kind(), SubobjectKind::Secondary);
        assert_eq!(secondary.offset(), (SLOT_SIZE + 16) as isize);
        assert_eq!(secondary.first_slot(), 3);
        assert_eq!(secondary.slot_count(), 2);

        let ptr = window
            .method_ptr("EventListener", "handle_client_message")
            .unwrap();
        assert_eq!(ptr.adjustment(), (SLOT_SIZE + 16) as isize);
        assert_eq!(
            ptr.decode(),
            Decoded::Virtual {
                table_offset: SLOT_SIZE,
                adjustment: (SLOT_SIZE + 16) as isize
            }
        );
    }

    #[test]
    fn test_derived_keeps_base_secondary_subobjects() {
        let object = object();
        let listener = ClassLayout::builder("EventListener")
            .virtual_method("handle_property_notify")
            .build();
        let platform = ClassLayout::builder("PlatformWindow")
            .extends(&object)
            .implements(&listener)
            .build();
        let xcb = ClassLayout::builder("XcbWindow")
            .extends(&platform)
            .virtual_method("handle_map_notify")
            .build();

        assert_eq!(xcb.subobjects().len(), 2);
        assert_eq!(xcb.primary().chain(), &["Object", "PlatformWindow", "XcbWindow"]);
        assert_eq!(xcb.subobjects()[1].offset(), platform.subobjects()[1].offset());
        assert_eq!(
            xcb.method_ptr("EventListener", "handle_property_notify"),
            platform.method_ptr("EventListener", "handle_property_notify")
        );
    }

    #[test]
    fn test_virtual_base_is_shared() {
        let object = object();
        let left = ClassLayout::builder("Left")
            .virtually_extends(&object)
            .virtual_method("left")
            .build();
        let right = ClassLayout::builder("Right")
            .virtually_extends(&object)
            .virtual_method("right")
            .build();
        let diamond = ClassLayout::builder("Diamond")
            .extends(&left)
            .implements(&right)
            .build();

        let virtuals: Vec<_> = diamond
            .subobjects()
            .iter()
            .filter(|s| s.kind() == SubobjectKind::Virtual)
            .collect();
        assert_eq!(virtuals.len(), 1);
        assert!(diamond.is_virtual_base("Object"));
        assert_eq!(diamond.len(), 2 + 2);

        let ptr = diamond.method_ptr("Object", "timer_event").unwrap();
        assert_eq!(ptr.adjustment(), 0);
    }

    #[test]
    fn test_non_virtual_method_ptr() {
        let object = object();
        let ptr = object.method_ptr("Object", "object_name").unwrap();
        assert!(!ptr.is_virtual());
        assert!(object.method_ptr("Object", "missing").is_none());
    }
}
