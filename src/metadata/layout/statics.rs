//! Static field layout computation.
//!
//! The same offset-advancement algorithm as instance layout, applied independently
//! to three disjoint partitions of the static field set: thread-local statics, then
//! GC-tracked statics, then ordinary statics. Each region keeps its own cursor and
//! alignment accumulator; regions never share space and static storage is never
//! inherited from a base type. Literal (constant) fields declare no storage and are
//! skipped. Explicit offsets apply to instance layout only; static regions are
//! always packed sequentially.

use crate::{
    metadata::{
        layout::{
            instance::field_size_and_alignment, ComputedStaticLayout, LayoutEngine, LayoutWidth,
            StaticFieldPlacement, StaticLayoutDepth, StaticRegion, StaticsBlock,
        },
        typesystem::CilTypeRc,
    },
    Result,
};

struct RegionCursor {
    cursor: LayoutWidth,
    alignment: u32,
}

impl RegionCursor {
    fn new() -> Self {
        RegionCursor {
            cursor: LayoutWidth::Known(0),
            alignment: 1,
        }
    }

    fn block(&self) -> StaticsBlock {
        StaticsBlock {
            size: self.cursor.align_up(self.alignment),
            alignment: self.alignment,
        }
    }
}

/// A static layout with no occupied regions
pub(crate) fn empty(depth: StaticLayoutDepth) -> ComputedStaticLayout {
    ComputedStaticLayout {
        non_gc: StaticsBlock::empty(),
        gc: StaticsBlock::empty(),
        thread_local: StaticsBlock::empty(),
        offsets: (depth == StaticLayoutDepth::RegionSizesAndOffsets).then(Vec::new),
    }
}

/// Compute the static layout of `ty` at the requested depth.
///
/// Never reads fields of any other type; the only cross-type queries are the
/// field-type size and the GC classification of the field's own declared type.
pub(crate) fn compute(
    engine: &LayoutEngine,
    ty: &CilTypeRc,
    depth: StaticLayoutDepth,
) -> Result<ComputedStaticLayout> {
    let wants_offsets = depth == StaticLayoutDepth::RegionSizesAndOffsets;

    let mut non_gc = RegionCursor::new();
    let mut gc = RegionCursor::new();
    let mut thread_local = RegionCursor::new();
    let mut placements: Vec<StaticFieldPlacement> = Vec::new();

    for (_, field) in ty.fields.iter() {
        if !field.is_static() || field.is_literal() {
            continue;
        }

        let field_type = field.resolved_type()?;
        let (size, alignment) = field_size_and_alignment(engine, &field_type)?;

        let region = if field.is_thread_static() {
            StaticRegion::ThreadLocal
        } else if engine.contains_gc_pointers(&field_type)? {
            StaticRegion::Gc
        } else {
            StaticRegion::NonGc
        };

        let cursor = match region {
            StaticRegion::NonGc => &mut non_gc,
            StaticRegion::Gc => &mut gc,
            StaticRegion::ThreadLocal => &mut thread_local,
        };

        cursor.cursor = cursor.cursor.align_up(alignment);
        if wants_offsets {
            placements.push(StaticFieldPlacement {
                field: field.clone(),
                region,
                offset: cursor.cursor.require_known(ty.token)?,
            });
        }
        cursor.cursor = cursor.cursor.add(size);
        cursor.alignment = cursor.alignment.max(alignment);
    }

    Ok(ComputedStaticLayout {
        non_gc: non_gc.block(),
        gc: gc.block(),
        thread_local: thread_local.block(),
        offsets: wants_offsets.then_some(placements),
    })
}
