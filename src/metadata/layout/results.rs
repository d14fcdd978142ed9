//! Immutable layout result records.
//!
//! These are the value objects handed back to consumers: computed instance layout,
//! computed static layout, per-region descriptors and ABI shape characteristics.
//! Pure data, no behavior beyond accessors. A result's `offsets` list is present
//! only when the layout was computed to offsets depth; its absence is a meaningful
//! partial-result state and must never be conflated with "this type has no fields".

use bitflags::bitflags;

use crate::metadata::{layout::LayoutWidth, typesystem::FieldRc};

/// How deep an instance layout request goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstanceLayoutDepth {
    /// Sizes and alignment only - no per-field offsets
    Sizes,
    /// Sizes, alignment and the ordered field offset list
    SizesAndOffsets,
}

/// How deep a static layout request goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StaticLayoutDepth {
    /// Region sizes and alignments only
    RegionSizes,
    /// Region sizes plus the per-field offset list
    RegionSizesAndOffsets,
}

/// The static storage region a field was routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticRegion {
    /// Ordinary statics the collector never scans
    NonGc,
    /// Statics the collector must be able to find and trace
    Gc,
    /// Statics with one slot per thread
    ThreadLocal,
}

/// Placement of a single instance field
#[derive(Debug, Clone)]
pub struct FieldPlacement {
    /// The placed field
    pub field: FieldRc,
    /// Byte offset from the start of the instance data
    pub offset: u32,
}

/// Placement of a single static field within its region
#[derive(Debug, Clone)]
pub struct StaticFieldPlacement {
    /// The placed field
    pub field: FieldRc,
    /// The region the field was routed to
    pub region: StaticRegion,
    /// Byte offset from the start of that region
    pub offset: u32,
}

/// Computed instance layout of one type.
///
/// Created lazily on first request, cached on the type, never mutated. A deeper
/// recomputation produces a new object that refines (never contradicts) this one.
#[derive(Debug, Clone)]
pub struct ComputedInstanceLayout {
    /// The packing clamp that was in effect (0 = none)
    pub packing: u16,
    /// Unaligned byte count of the instance data
    pub size: LayoutWidth,
    /// Byte count rounded up to the overall alignment
    pub aligned_size: LayoutWidth,
    /// Overall alignment of the type
    pub alignment: u32,
    /// Ordered field placements; `None` means the layout was only computed to
    /// sizes depth, not that the type has no fields
    pub offsets: Option<Vec<FieldPlacement>>,
}

impl ComputedInstanceLayout {
    /// True if per-field offsets are available
    #[must_use]
    pub fn has_offsets(&self) -> bool {
        self.offsets.is_some()
    }

    /// The depth this result was computed to
    #[must_use]
    pub fn depth(&self) -> InstanceLayoutDepth {
        if self.has_offsets() {
            InstanceLayoutDepth::SizesAndOffsets
        } else {
            InstanceLayoutDepth::Sizes
        }
    }

    /// True if `self` is a consistent refinement of an earlier, shallower result
    /// for the same type (sizes and alignment unchanged).
    #[must_use]
    pub(crate) fn refines(&self, earlier: &ComputedInstanceLayout) -> bool {
        self.packing == earlier.packing
            && self.size == earlier.size
            && self.aligned_size == earlier.aligned_size
            && self.alignment == earlier.alignment
    }
}

/// Size and largest-required-alignment of one static region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticsBlock {
    /// Byte count of the region, rounded up to the region's alignment
    pub size: LayoutWidth,
    /// Largest alignment any field in the region requires
    pub alignment: u32,
}

impl StaticsBlock {
    /// An empty region
    #[must_use]
    pub fn empty() -> Self {
        StaticsBlock {
            size: LayoutWidth::Known(0),
            alignment: 1,
        }
    }

    /// True if no field was routed to this region
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == LayoutWidth::Known(0)
    }
}

impl Default for StaticsBlock {
    fn default() -> Self {
        StaticsBlock::empty()
    }
}

/// Computed static layout of one type: three independent regions.
///
/// Static storage is never inherited; each region has its own cursor and alignment
/// and regions never share space.
#[derive(Debug, Clone)]
pub struct ComputedStaticLayout {
    /// Ordinary statics
    pub non_gc: StaticsBlock,
    /// GC-tracked statics
    pub gc: StaticsBlock,
    /// Thread-local statics
    pub thread_local: StaticsBlock,
    /// Per-field placements; `None` means region-sizes depth
    pub offsets: Option<Vec<StaticFieldPlacement>>,
}

impl ComputedStaticLayout {
    /// True if per-field offsets are available
    #[must_use]
    pub fn has_offsets(&self) -> bool {
        self.offsets.is_some()
    }

    /// The depth this result was computed to
    #[must_use]
    pub fn depth(&self) -> StaticLayoutDepth {
        if self.has_offsets() {
            StaticLayoutDepth::RegionSizesAndOffsets
        } else {
            StaticLayoutDepth::RegionSizes
        }
    }

    /// The block for a given region
    #[must_use]
    pub fn region(&self, region: StaticRegion) -> &StaticsBlock {
        match region {
            StaticRegion::NonGc => &self.non_gc,
            StaticRegion::Gc => &self.gc,
            StaticRegion::ThreadLocal => &self.thread_local,
        }
    }

    /// True if `self` is a consistent refinement of an earlier, shallower result.
    #[must_use]
    pub(crate) fn refines(&self, earlier: &ComputedStaticLayout) -> bool {
        self.non_gc == earlier.non_gc
            && self.gc == earlier.gc
            && self.thread_local == earlier.thread_local
    }
}

bitflags! {
    /// Value-type ABI shape flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShapeFlags: u8 {
        /// Every leaf is a floating-point primitive of one uniform width
        const HOMOGENEOUS_FLOAT_AGGREGATE = 0x01;
    }
}

/// The uniform element width of a homogeneous float aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatElement {
    /// 32-bit float leaves
    F32,
    /// 64-bit float leaves
    F64,
}

impl FloatElement {
    /// Width of one element in bytes
    #[must_use]
    pub fn bytes(self) -> u32 {
        match self {
            FloatElement::F32 => 4,
            FloatElement::F64 => 8,
        }
    }
}

/// ABI shape classification of a value type.
///
/// Carries the uniform float element type and the leaf count only when the HFA
/// flag is set. The leaf count is the number of float fields reached by recursing
/// through value-typed fields; declared-size padding never contributes leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeCharacteristics {
    /// The shape flags
    pub flags: ShapeFlags,
    hfa_element: Option<FloatElement>,
    hfa_leaves: u32,
}

impl ShapeCharacteristics {
    /// No special shape
    #[must_use]
    pub fn none() -> Self {
        ShapeCharacteristics {
            flags: ShapeFlags::empty(),
            hfa_element: None,
            hfa_leaves: 0,
        }
    }

    /// A homogeneous float aggregate of the given element width and leaf count
    #[must_use]
    pub fn hfa(element: FloatElement, leaves: u32) -> Self {
        ShapeCharacteristics {
            flags: ShapeFlags::HOMOGENEOUS_FLOAT_AGGREGATE,
            hfa_element: Some(element),
            hfa_leaves: leaves,
        }
    }

    /// True if the HFA flag is set
    #[must_use]
    pub fn is_hfa(&self) -> bool {
        self.flags
            .contains(ShapeFlags::HOMOGENEOUS_FLOAT_AGGREGATE)
    }

    /// The uniform element type, defined only when the HFA flag is set
    #[must_use]
    pub fn hfa_element(&self) -> Option<FloatElement> {
        self.hfa_element
    }

    /// Number of float leaves; zero when the HFA flag is not set
    #[must_use]
    pub fn hfa_leaf_count(&self) -> u32 {
        self.hfa_leaves
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_follows_offsets_presence() {
        let sizes_only = ComputedInstanceLayout {
            packing: 0,
            size: LayoutWidth::Known(8),
            aligned_size: LayoutWidth::Known(8),
            alignment: 4,
            offsets: None,
        };
        assert_eq!(sizes_only.depth(), InstanceLayoutDepth::Sizes);

        let with_offsets = ComputedInstanceLayout {
            offsets: Some(Vec::new()),
            ..sizes_only.clone()
        };
        assert_eq!(with_offsets.depth(), InstanceLayoutDepth::SizesAndOffsets);
        assert!(with_offsets.refines(&sizes_only));
    }

    #[test]
    fn test_refinement_detects_contradiction() {
        let earlier = ComputedInstanceLayout {
            packing: 0,
            size: LayoutWidth::Known(8),
            aligned_size: LayoutWidth::Known(8),
            alignment: 4,
            offsets: None,
        };
        let contradicting = ComputedInstanceLayout {
            alignment: 8,
            ..earlier.clone()
        };
        assert!(!contradicting.refines(&earlier));
    }

    #[test]
    fn test_statics_block_empty() {
        let block = StaticsBlock::empty();
        assert!(block.is_empty());
        assert_eq!(block.alignment, 1);
    }

    #[test]
    fn test_shape_characteristics() {
        let none = ShapeCharacteristics::none();
        assert!(!none.is_hfa());
        assert_eq!(none.hfa_element(), None);
        assert_eq!(none.hfa_leaf_count(), 0);

        let hfa = ShapeCharacteristics::hfa(FloatElement::F64, 2);
        assert!(hfa.is_hfa());
        assert_eq!(hfa.hfa_element(), Some(FloatElement::F64));
        assert_eq!(hfa.hfa_leaf_count(), 2);
        assert_eq!(FloatElement::F64.bytes(), 8);
        assert_eq!(FloatElement::F32.bytes(), 4);
    }

    #[test]
    fn test_static_layout_region_accessor() {
        let layout = ComputedStaticLayout {
            non_gc: StaticsBlock {
                size: LayoutWidth::Known(4),
                alignment: 4,
            },
            gc: StaticsBlock::empty(),
            thread_local: StaticsBlock::empty(),
            offsets: None,
        };
        assert_eq!(
            layout.region(StaticRegion::NonGc).size,
            LayoutWidth::Known(4)
        );
        assert!(layout.region(StaticRegion::Gc).is_empty());
        assert_eq!(layout.depth(), StaticLayoutDepth::RegionSizes);
    }
}
