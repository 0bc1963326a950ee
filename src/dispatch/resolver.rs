//! Slot resolution.
//!
//! Maps a [`MethodPtr`] onto the flattened slot index it dispatches through for a given
//! [`ClassLayout`]. Resolution is pure: the same layout and pointer always produce the same
//! slot, so callers are free to resolve on every call.
//!
//! # Algorithm
//!
//! 1. A direct (non-virtual) encoding is rejected with [`Error::NotVirtual`]
//! 2. The table offset must be a whole number of slots
//! 3. The subobject is chosen by the this-adjustment, by the declaring class for virtual
//!    bases, or by the unique subobject that contains the declaring class
//! 4. The index must lie inside the part of that subobject's table the declaring class knows
//!    about
//!
//! Everything that does not fit yields [`Error::UnsupportedLayout`].

use crate::{
    dispatch::{
        layout::{ClassLayout, SlotIndex, Subobject, SubobjectKind},
        methodptr::{Decoded, MethodPtr, SLOT_SIZE},
    },
    Error, Result,
};

/// Resolves `method` to a slot of `layout`'s dispatch table.
///
/// # Errors
///
/// - [`Error::NotVirtual`] if `method` encodes a direct code entry
/// - [`Error::UnsupportedLayout`] if the encoding does not fit the layout
///
/// # Examples
///
/// ```rust
/// use shimhook::dispatch::{resolve_slot, ClassLayout, MethodPtr, SlotIndex};
///
/// let object = ClassLayout::builder("Object").virtual_method("event").build();
/// let window = ClassLayout::builder("Window")
///     .extends(&object)
///     .virtual_method("resize")
///     .build();
///
/// let resize = MethodPtr::virtual_slot("Window", 1);
/// assert_eq!(resolve_slot(&window, resize)?, SlotIndex::new(1));
/// # Ok::<(), shimhook::Error>(())
/// ```
pub fn resolve_slot(layout: &ClassLayout, method: MethodPtr) -> Result<SlotIndex> {
    let (table_offset, adjustment) = match method.decode() {
        Decoded::Virtual {
            table_offset,
            adjustment,
        } => (table_offset, adjustment),
        Decoded::Direct { .. } => {
            return Err(Error::NotVirtual {
                class: method.declaring(),
                method: direct_method_name(layout, method),
            })
        }
    };

    if table_offset % SLOT_SIZE != 0 {
        return Err(unsupported_layout!(
            "table offset {} of {} is not a multiple of the slot size",
            table_offset,
            method
        ));
    }

    let subobject = select_subobject(layout, method.declaring(), adjustment)?;
    let index = table_offset / SLOT_SIZE;
    if index >= subobject.slot_count() {
        return Err(unsupported_layout!(
            "{} points past the {} slots of {}",
            method,
            subobject.slot_count(),
            layout.name()
        ));
    }

    let slot = SlotIndex::new(subobject.first_slot() + index);
    let Some(decl) = layout.slot(slot) else {
        return Err(unsupported_layout!(
            "slot {} is outside the table of {}",
            slot,
            layout.name()
        ));
    };

    // The entry must belong to the declaring class or one of its bases in the chain
    match (
        subobject.position(decl.declaring),
        subobject.position(method.declaring()),
    ) {
        (Some(owner), Some(declaring)) if owner <= declaring => Ok(slot),
        _ => Err(unsupported_layout!(
            "{} resolves to {}::{}, which {} does not inherit",
            method,
            decl.declaring,
            decl.name,
            method.declaring()
        )),
    }
}

fn select_subobject<'a>(
    layout: &'a ClassLayout,
    declaring: &str,
    adjustment: isize,
) -> Result<&'a Subobject> {
    if layout.is_virtual_base(declaring) {
        if let Some(sub) = layout
            .subobjects()
            .iter()
            .find(|s| s.kind() == SubobjectKind::Virtual && s.contains(declaring))
        {
            return Ok(sub);
        }
    }

    if let Some(sub) = layout.subobjects().iter().find(|s| {
        s.kind() != SubobjectKind::Virtual && s.offset() == adjustment && s.contains(declaring)
    }) {
        return Ok(sub);
    }

    let mut candidates = layout
        .subobjects()
        .iter()
        .filter(|s| s.contains(declaring));
    match (candidates.next(), candidates.next()) {
        (Some(sub), None) => Ok(sub),
        (None, _) => Err(unsupported_layout!(
            "{} is not a base of {}",
            declaring,
            layout.name()
        )),
        (Some(_), Some(_)) => Err(unsupported_layout!(
            "{} is an ambiguous base of {} and adjustment {} selects none of its copies",
            declaring,
            layout.name(),
            adjustment
        )),
    }
}

fn direct_method_name(layout: &ClassLayout, method: MethodPtr) -> &'static str {
    let Decoded::Direct { entry, .. } = method.decode() else {
        return "<virtual>";
    };
    // Non-virtual entries are laid out at 0x1000 + 0x10 * index by the layout builder
    entry
        .checked_sub(0x1000)
        .filter(|offset| offset % 0x10 == 0)
        .and_then(|offset| layout.method_at(offset / 0x10))
        .filter(|decl| decl.declaring == method.declaring())
        .map_or("<direct>", |decl| decl.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::layouts;

    #[test]
    fn test_resolve_primary_chain() {
        let window = layouts::window();
        let event = MethodPtr::virtual_slot("Object", 0);
        let paint = MethodPtr::virtual_slot("Widget", 2);

        assert_eq!(resolve_slot(&window, event).unwrap(), SlotIndex::new(0));
        assert_eq!(resolve_slot(&window, paint).unwrap(), SlotIndex::new(2));
    }

    #[test]
    fn test_resolve_is_pure() {
        let window = layouts::window();
        let paint = MethodPtr::virtual_slot("Widget", 2);
        let first = resolve_slot(&window, paint).unwrap();
        for _ in 0..8 {
            assert_eq!(resolve_slot(&window, paint).unwrap(), first);
        }
    }

    #[test]
    fn test_non_virtual_rejected() {
        let window = layouts::window();
        let ptr = window.method_ptr("Widget", "geometry").unwrap();
        match resolve_slot(&window, ptr) {
            Err(Error::NotVirtual { class, method }) => {
                assert_eq!(class, "Widget");
                assert_eq!(method, "geometry");
            }
            other => panic!("expected NotVirtual, got {other:?}"),
        }
    }

    #[test]
    fn test_misaligned_offset_rejected() {
        let window = layouts::window();
        let ptr = MethodPtr::from_raw("Object", SLOT_SIZE / 2 + 1, 0);
        assert!(matches!(
            resolve_slot(&window, ptr),
            Err(Error::UnsupportedLayout { .. })
        ));
    }

    #[test]
    fn test_offset_past_declaring_table_rejected() {
        let window = layouts::window();
        // Object only knows its first two slots; slot 2 belongs to Widget
        let ptr = MethodPtr::virtual_slot("Object", 2);
        assert!(matches!(
            resolve_slot(&window, ptr),
            Err(Error::UnsupportedLayout { .. })
        ));

        let ptr = MethodPtr::virtual_slot("Object", 64);
        assert!(matches!(
            resolve_slot(&window, ptr),
            Err(Error::UnsupportedLayout { .. })
        ));
    }

    #[test]
    fn test_unrelated_class_rejected() {
        let window = layouts::window();
        let ptr = MethodPtr::virtual_slot("Application", 0);
        assert!(matches!(
            resolve_slot(&window, ptr),
            Err(Error::UnsupportedLayout { .. })
        ));
    }

    #[test]
    fn test_secondary_base_uses_adjustment() {
        let platform = layouts::platform_window();
        let ptr = platform
            .method_ptr("EventListener", "handle_client_message")
            .unwrap();
        assert_ne!(ptr.adjustment(), 0);

        let slot = resolve_slot(&platform, ptr).unwrap();
        let decl = platform.slot(slot).unwrap();
        assert_eq!(decl.declaring, "EventListener");
        assert_eq!(decl.name, "handle_client_message");
    }

    #[test]
    fn test_base_relative_pointer_is_converted() {
        let platform = layouts::platform_window();
        let listener = layouts::event_listener();
        // A pointer taken from the base class itself carries no adjustment
        let base_ptr = listener
            .method_ptr("EventListener", "handle_client_message")
            .unwrap();
        assert_eq!(base_ptr.adjustment(), 0);

        let derived_ptr = platform
            .method_ptr("EventListener", "handle_client_message")
            .unwrap();
        assert_eq!(
            resolve_slot(&platform, base_ptr).unwrap(),
            resolve_slot(&platform, derived_ptr).unwrap()
        );
    }

    #[test]
    fn test_virtual_base_ignores_adjustment() {
        let diamond = layouts::diamond();
        let ptr = diamond.method_ptr("Object", "timer_event").unwrap();
        let expected = resolve_slot(&diamond, ptr).unwrap();

        let skewed = ptr.with_adjustment(48);
        assert_eq!(resolve_slot(&diamond, skewed).unwrap(), expected);
        assert_eq!(diamond.slot(expected).unwrap().name, "timer_event");
    }

    #[test]
    fn test_ambiguous_non_virtual_base_rejected() {
        let twice = layouts::repeated_base();
        let ptr = MethodPtr::virtual_slot("Object", 0).with_adjustment(4096);
        assert!(matches!(
            resolve_slot(&twice, ptr),
            Err(Error::UnsupportedLayout { .. })
        ));

        // The primary copy is still reachable through its exact adjustment
        let ptr = MethodPtr::virtual_slot("Object", 0);
        assert_eq!(resolve_slot(&twice, ptr).unwrap(), SlotIndex::new(0));
    }
}
