//! Value-type ABI shape classification.
//!
//! Two independent classifications, both meaningful only for value types:
//!
//! - **Homogeneous float aggregate (HFA)**: every leaf element (recursing through
//!   value-typed fields) is a floating-point primitive of one single width, and the
//!   total leaf count stays within the target's ABI budget. Explicit-layout types
//!   never qualify - overlapping floats do not form an aggregate of distinct
//!   elements.
//! - **By-ref-like**: the type is explicitly marked stack-only, or any instance
//!   field is a raw by-ref or a by-ref-like value type. The engine only reports the
//!   classification; rejecting such types as array elements or boxed instances is
//!   the consumers' business.

use crate::{
    metadata::{
        layout::{FloatElement, LayoutEngine, ShapeCharacteristics},
        typesystem::{CilFlavor, CilTypeRc},
    },
    Result,
};

pub(crate) fn classify(engine: &LayoutEngine, ty: &CilTypeRc) -> Result<ShapeCharacteristics> {
    if ty.flavor != CilFlavor::ValueType || ty.is_explicit_layout() {
        return Ok(ShapeCharacteristics::none());
    }

    let mut element: Option<FloatElement> = None;
    let mut leaves: u32 = 0;

    for (_, field) in ty.fields.iter() {
        if !field.is_instance() {
            continue;
        }
        let field_type = field.resolved_type()?;

        // Nested aggregates contribute their own field-derived leaf count, so a
        // declared class size padding the nested type never inflates the tally.
        let (field_element, field_leaves) = match field_type.flavor {
            CilFlavor::R4 => (FloatElement::F32, 1),
            CilFlavor::R8 => (FloatElement::F64, 1),
            CilFlavor::ValueType => {
                let nested = engine.shape_characteristics(&field_type)?;
                let Some(nested_element) = nested.hfa_element() else {
                    return Ok(ShapeCharacteristics::none());
                };
                (nested_element, nested.hfa_leaf_count())
            }
            _ => return Ok(ShapeCharacteristics::none()),
        };

        match element {
            None => element = Some(field_element),
            Some(seen) if seen == field_element => {}
            Some(_) => return Ok(ShapeCharacteristics::none()),
        }
        leaves += field_leaves;
    }

    match element {
        Some(uniform) if leaves > 0 && leaves <= engine.target().max_hfa_elements => {
            Ok(ShapeCharacteristics::hfa(uniform, leaves))
        }
        _ => Ok(ShapeCharacteristics::none()),
    }
}

pub(crate) fn classify_byref_like(engine: &LayoutEngine, ty: &CilTypeRc) -> Result<bool> {
    if !ty.flavor.is_value_type() {
        return Ok(false);
    }
    if ty.is_marked_byref_like() {
        return Ok(true);
    }
    if ty.flavor.is_primitive() {
        return Ok(false);
    }

    for (_, field) in ty.fields.iter() {
        if !field.is_instance() {
            continue;
        }
        let field_type = field.resolved_type()?;
        match field_type.flavor {
            CilFlavor::ByRef => return Ok(true),
            CilFlavor::ValueType => {
                if engine.is_byref_like(&field_type)? {
                    return Ok(true);
                }
            }
            _ => {}
        }
    }

    Ok(false)
}
