//! Instance field layout computation.
//!
//! Offsets are assigned in declaration order starting from the base type's
//! already-computed instance size: each field's effective alignment (natural
//! alignment, clamped by the type's packing directive) advances the running cursor
//! to the next aligned boundary, padding as needed. Explicit-layout types take
//! offsets directly from field declarations instead; overlap is permitted by design
//! there, and the engine only validates that no field extends beyond a declared
//! class size. A field of indeterminate size makes the whole instance size
//! indeterminate while alignment stays known.

use crate::{
    metadata::{
        layout::{
            ComputedInstanceLayout, FieldPlacement, InstanceLayoutDepth, LayoutEngine,
            LayoutWidth,
        },
        typesystem::{CilFlavor, CilTypeRc},
    },
    Result,
};

/// Representation size and alignment of a field of the given declared type, as it
/// is embedded in its owner.
///
/// Reference kinds, pointers and by-refs occupy one native word. Value types
/// (including primitives) inline their own instance layout, recursively computed
/// through the engine at sizes depth. Unresolved generic parameters have an
/// indeterminate size.
pub(crate) fn field_size_and_alignment(
    engine: &LayoutEngine,
    field_type: &CilTypeRc,
) -> Result<(LayoutWidth, u32)> {
    let pointer = engine.target().pointer_bytes();

    if field_type.flavor.is_reference_kind() {
        return Ok((LayoutWidth::Known(pointer), pointer));
    }

    match field_type.flavor {
        CilFlavor::Pointer | CilFlavor::ByRef | CilFlavor::FnPtr => {
            Ok((LayoutWidth::Known(pointer), pointer))
        }
        CilFlavor::GenericParameter | CilFlavor::Unknown => Ok((LayoutWidth::Indeterminate, 1)),
        CilFlavor::Void => Err(malformed_error!(
            "Field declared with type void ({})",
            field_type.token
        )),
        _ => {
            let inline = engine.instance_layout(field_type, InstanceLayoutDepth::Sizes)?;
            Ok((inline.aligned_size, inline.alignment))
        }
    }
}

/// Natural alignment clamped by the type's packing directive
fn effective_alignment(natural: u32, packing: u16) -> u32 {
    let clamped = if packing == 0 {
        natural
    } else {
        natural.min(u32::from(packing))
    };
    clamped.max(1)
}

/// Compute the instance layout of `ty` at the requested depth.
///
/// The base type's layout is forced to the same depth first, so deeper requests
/// refine root-first along the inheritance chain.
pub(crate) fn compute(
    engine: &LayoutEngine,
    ty: &CilTypeRc,
    depth: InstanceLayoutDepth,
) -> Result<ComputedInstanceLayout> {
    let token = ty.token;
    let target = engine.target();
    let wants_offsets = depth == InstanceLayoutDepth::SizesAndOffsets;

    // Fixed-size primitives are their own layout.
    if let Some(size) = ty.flavor.primitive_size(target.pointer_size) {
        let alignment = size.max(target.minimum_alignment);
        return Ok(ComputedInstanceLayout {
            packing: 0,
            size: LayoutWidth::Known(size),
            aligned_size: LayoutWidth::Known(size),
            alignment,
            offsets: wants_offsets.then(Vec::new),
        });
    }

    let packing = ty.packing();
    if packing != 0 && (!packing.is_power_of_two() || packing > 128) {
        return Err(crate::Error::UnsupportedPacking { token, packing });
    }

    let (base_size, base_alignment) = match ty.base()? {
        Some(base) => {
            let base_layout = engine.instance_layout(&base, depth)?;
            (base_layout.size, base_layout.alignment)
        }
        None => (LayoutWidth::Known(0), target.minimum_alignment),
    };

    let mut alignment = base_alignment.max(target.minimum_alignment);
    let declared = ty.declared_size();
    let mut placements: Vec<FieldPlacement> = Vec::new();

    let unaligned = if ty.is_explicit_layout() {
        let mut extent = base_size;
        for (_, field) in ty.fields.iter() {
            if !field.is_instance() {
                continue;
            }
            let field_type = field.resolved_type()?;
            let (size, natural) = field_size_and_alignment(engine, &field_type)?;
            let offset = field.explicit_offset().ok_or_else(|| {
                crate::Error::InvalidExplicitLayout {
                    token,
                    message: format!("field '{}' has no declared offset", field.name),
                }
            })?;

            let field_extent = LayoutWidth::Known(offset).add(size);
            if let (Some(end), Some(bound)) = (field_extent.known(), declared) {
                if end > bound {
                    return Err(crate::Error::InvalidExplicitLayout {
                        token,
                        message: format!(
                            "field '{}' extends to byte {} beyond the declared size {}",
                            field.name, end, bound
                        ),
                    });
                }
            }

            extent = extent.max_width(field_extent);
            alignment = alignment.max(effective_alignment(natural, packing));
            if wants_offsets {
                placements.push(FieldPlacement {
                    field: field.clone(),
                    offset,
                });
            }
        }
        match declared {
            Some(bound) => extent.max_width(LayoutWidth::Known(bound)),
            None => extent,
        }
    } else {
        let mut cursor = base_size;
        for (_, field) in ty.fields.iter() {
            if !field.is_instance() {
                continue;
            }
            let field_type = field.resolved_type()?;
            let (size, natural) = field_size_and_alignment(engine, &field_type)?;
            let effective = effective_alignment(natural, packing);

            cursor = cursor.align_up(effective);
            if wants_offsets {
                placements.push(FieldPlacement {
                    field: field.clone(),
                    offset: cursor.require_known(token)?,
                });
            }
            cursor = cursor.add(size);
            alignment = alignment.max(effective);
        }
        match declared {
            Some(bound) => cursor.max_width(LayoutWidth::Known(bound)),
            None => cursor,
        }
    };

    Ok(ComputedInstanceLayout {
        packing,
        size: unaligned,
        aligned_size: unaligned.align_up(alignment),
        alignment,
        offsets: wants_offsets.then_some(placements),
    })
}
