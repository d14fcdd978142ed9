//! GC-pointer containment classification.
//!
//! A type contains GC pointers if it is itself a reference kind, or if any instance
//! field - including inherited ones and fields of inlined value-typed fields,
//! recursively - is a reference kind or a value type for which the same query holds.
//! Raw pointers and by-refs are untracked interior/unmanaged references and do not
//! count. The answer short-circuits on the first positive hit and, once computed,
//! is stable for the lifetime of the type's identity.

use crate::{
    metadata::{
        layout::LayoutEngine,
        typesystem::{CilFlavor, CilTypeRc},
    },
    Result,
};

/// Inheritance chains longer than this indicate a malformed (cyclic) base edge.
const MAX_INHERITANCE_DEPTH: usize = 256;

pub(crate) fn compute(engine: &LayoutEngine, ty: &CilTypeRc) -> Result<bool> {
    if ty.flavor.is_reference_kind() {
        return Ok(true);
    }

    match ty.flavor {
        CilFlavor::Pointer | CilFlavor::ByRef | CilFlavor::FnPtr => return Ok(false),
        // Unresolved substitutions must be assumed collectable so the scanner
        // never misses a reference.
        CilFlavor::GenericParameter | CilFlavor::Unknown => return Ok(true),
        _ => {}
    }

    // Value types (and primitives, which have no fields): scan declared instance
    // fields plus anything inherited along the base chain.
    let mut current = Some(ty.clone());
    let mut depth = 0usize;
    while let Some(scanned) = current {
        depth += 1;
        if depth > MAX_INHERITANCE_DEPTH {
            return Err(crate::Error::RecursionLimit(MAX_INHERITANCE_DEPTH));
        }

        for (_, field) in scanned.fields.iter() {
            if !field.is_instance() {
                continue;
            }
            let field_type = field.resolved_type()?;
            if field_type.flavor.is_reference_kind() {
                return Ok(true);
            }
            match field_type.flavor {
                CilFlavor::GenericParameter | CilFlavor::Unknown => return Ok(true),
                CilFlavor::ValueType => {
                    if engine.contains_gc_pointers(&field_type)? {
                        return Ok(true);
                    }
                }
                _ => {}
            }
        }

        current = scanned.base()?;
    }

    Ok(false)
}
