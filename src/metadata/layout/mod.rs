//! The layout engine: dispatcher, algorithm strategies and result caching.
//!
//! This module is the computational core of the crate. A [`LayoutEngine`] answers
//! six questions about a type - instance layout, static layout, GC-pointer
//! containment, shape characteristics, the HFA element type, and by-ref-like-ness -
//! by routing each request to the [`LayoutAlgorithm`] registered for the type's
//! category and memoizing the answer on the type itself.
//!
//! # Key Components
//!
//! - [`LayoutEngine`] - the dispatcher exposing the public operations
//! - [`LayoutAlgorithm`] - the strategy contract one category implementation fulfils
//! - [`ComputedInstanceLayout`] / [`ComputedStaticLayout`] - immutable result records
//! - [`LayoutWidth`] - platform-width-aware magnitude with an indeterminate state
//! - [`TargetProperties`] - the machine description layout is computed for
//!
//! # Computation Rules
//!
//! - A type's instance layout is computed only after its base type's instance
//!   layout is fully known; the dependency graph follows the inheritance chain and
//!   never cycles for well-formed input.
//! - Static layout never depends on another type's static layout. Distinct types
//!   may be laid out concurrently; [`LayoutEngine::compute_all`] does exactly that.
//! - Requests at sizes-only depth never fault merely because offsets are
//!   unavailable; the absent offset list is a normal partial result that a later,
//!   deeper request refines.
//! - A computation that re-enters its own type (illegal self-containment) is
//!   reported as [`crate::Error::LayoutCycle`]; the fault aborts only the
//!   requesting type's computation and leaves every other cached result intact.
//!
//! # Examples
//!
//! ```rust
//! use cillayout::prelude::*;
//!
//! let registry = TypeRegistry::new()?;
//! let engine = LayoutEngine::new(TargetProperties::new(PointerSize::Bit64));
//!
//! let i4 = registry.primitive(CilFlavor::I4)?;
//! let i8 = registry.primitive(CilFlavor::I8)?;
//! let mixed = TypeBuilder::value_type(&registry, "Demo", "Mixed")
//!     .field("Small", &i4)
//!     .field("Wide", &i8)
//!     .build()?;
//!
//! let layout = engine.instance_layout(&mixed, InstanceLayoutDepth::SizesAndOffsets)?;
//! assert_eq!(layout.alignment, 8);
//! let offsets = layout.offsets.as_ref().unwrap();
//! assert_eq!(offsets[0].offset, 0);
//! assert_eq!(offsets[1].offset, 8);
//! # Ok::<(), cillayout::Error>(())
//! ```

pub(crate) mod cache;
mod gcscan;
mod instance;
mod results;
mod shape;
mod statics;
mod target;
mod width;

use std::sync::Arc;

use rayon::prelude::*;

pub(crate) use cache::LayoutCache;
pub use results::{
    ComputedInstanceLayout, ComputedStaticLayout, FieldPlacement, FloatElement,
    InstanceLayoutDepth, ShapeCharacteristics, ShapeFlags, StaticFieldPlacement,
    StaticLayoutDepth, StaticRegion, StaticsBlock,
};
pub use target::TargetProperties;
pub use width::LayoutWidth;

use crate::{
    metadata::{
        token::Token,
        typesystem::{CilFlavor, CilTypeRc, TypeRegistry},
    },
    Error, Result,
};

/// The strategy contract one type-category algorithm fulfils.
///
/// Implementations receive the engine back so recursive queries (a field's inlined
/// size, a nested aggregate's shape) flow through the memoized public operations.
/// No implementation may read another type's *static* layout - static layout
/// computation is type-local by construction.
pub trait LayoutAlgorithm: Send + Sync {
    /// Compute the instance layout at the requested depth
    fn instance_layout(
        &self,
        engine: &LayoutEngine,
        ty: &CilTypeRc,
        depth: InstanceLayoutDepth,
    ) -> Result<ComputedInstanceLayout>;

    /// Compute the static layout at the requested depth
    fn static_layout(
        &self,
        engine: &LayoutEngine,
        ty: &CilTypeRc,
        depth: StaticLayoutDepth,
    ) -> Result<ComputedStaticLayout>;

    /// Decide whether instances can transitively carry a collectable reference
    fn contains_gc_pointers(&self, engine: &LayoutEngine, ty: &CilTypeRc) -> Result<bool>;

    /// Classify the value-type ABI shape
    fn shape_characteristics(
        &self,
        engine: &LayoutEngine,
        ty: &CilTypeRc,
    ) -> Result<ShapeCharacteristics>;

    /// Decide whether the type is stack-only
    fn is_byref_like(&self, engine: &LayoutEngine, ty: &CilTypeRc) -> Result<bool>;
}

/// Algorithm for ordinary declared types: classes, value types, primitives and
/// interfaces. This is where the real field-walking work happens.
struct DefinedTypeLayout;

impl LayoutAlgorithm for DefinedTypeLayout {
    fn instance_layout(
        &self,
        engine: &LayoutEngine,
        ty: &CilTypeRc,
        depth: InstanceLayoutDepth,
    ) -> Result<ComputedInstanceLayout> {
        instance::compute(engine, ty, depth)
    }

    fn static_layout(
        &self,
        engine: &LayoutEngine,
        ty: &CilTypeRc,
        depth: StaticLayoutDepth,
    ) -> Result<ComputedStaticLayout> {
        statics::compute(engine, ty, depth)
    }

    fn contains_gc_pointers(&self, engine: &LayoutEngine, ty: &CilTypeRc) -> Result<bool> {
        gcscan::compute(engine, ty)
    }

    fn shape_characteristics(
        &self,
        engine: &LayoutEngine,
        ty: &CilTypeRc,
    ) -> Result<ShapeCharacteristics> {
        shape::classify(engine, ty)
    }

    fn is_byref_like(&self, engine: &LayoutEngine, ty: &CilTypeRc) -> Result<bool> {
        shape::classify_byref_like(engine, ty)
    }
}

/// Algorithm for array types. Arrays are reference kinds: embedded anywhere they
/// occupy one native word, their element storage is runtime-managed, and they
/// declare no statics of their own.
struct ArrayLayout;

impl LayoutAlgorithm for ArrayLayout {
    fn instance_layout(
        &self,
        engine: &LayoutEngine,
        _ty: &CilTypeRc,
        depth: InstanceLayoutDepth,
    ) -> Result<ComputedInstanceLayout> {
        let pointer = engine.target().pointer_bytes();
        Ok(ComputedInstanceLayout {
            packing: 0,
            size: LayoutWidth::Known(pointer),
            aligned_size: LayoutWidth::Known(pointer),
            alignment: pointer,
            offsets: (depth == InstanceLayoutDepth::SizesAndOffsets).then(Vec::new),
        })
    }

    fn static_layout(
        &self,
        _engine: &LayoutEngine,
        _ty: &CilTypeRc,
        depth: StaticLayoutDepth,
    ) -> Result<ComputedStaticLayout> {
        Ok(statics::empty(depth))
    }

    fn contains_gc_pointers(&self, _engine: &LayoutEngine, _ty: &CilTypeRc) -> Result<bool> {
        Ok(true)
    }

    fn shape_characteristics(
        &self,
        _engine: &LayoutEngine,
        _ty: &CilTypeRc,
    ) -> Result<ShapeCharacteristics> {
        Ok(ShapeCharacteristics::none())
    }

    fn is_byref_like(&self, _engine: &LayoutEngine, _ty: &CilTypeRc) -> Result<bool> {
        Ok(false)
    }
}

/// Algorithm for pointers, by-refs and function pointers: one untracked native word.
struct PointerLayout;

impl LayoutAlgorithm for PointerLayout {
    fn instance_layout(
        &self,
        engine: &LayoutEngine,
        _ty: &CilTypeRc,
        depth: InstanceLayoutDepth,
    ) -> Result<ComputedInstanceLayout> {
        let pointer = engine.target().pointer_bytes();
        Ok(ComputedInstanceLayout {
            packing: 0,
            size: LayoutWidth::Known(pointer),
            aligned_size: LayoutWidth::Known(pointer),
            alignment: pointer,
            offsets: (depth == InstanceLayoutDepth::SizesAndOffsets).then(Vec::new),
        })
    }

    fn static_layout(
        &self,
        _engine: &LayoutEngine,
        _ty: &CilTypeRc,
        depth: StaticLayoutDepth,
    ) -> Result<ComputedStaticLayout> {
        Ok(statics::empty(depth))
    }

    fn contains_gc_pointers(&self, _engine: &LayoutEngine, _ty: &CilTypeRc) -> Result<bool> {
        Ok(false)
    }

    fn shape_characteristics(
        &self,
        _engine: &LayoutEngine,
        _ty: &CilTypeRc,
    ) -> Result<ShapeCharacteristics> {
        Ok(ShapeCharacteristics::none())
    }

    fn is_byref_like(&self, _engine: &LayoutEngine, ty: &CilTypeRc) -> Result<bool> {
        Ok(ty.flavor == CilFlavor::ByRef)
    }
}

/// Algorithm for types with no resolvable magnitude: unresolved generic parameters
/// and unknown flavors. Sizes are indeterminate; GC containment is conservatively
/// assumed so the scanner never misses a reference.
struct IndeterminateLayout;

impl LayoutAlgorithm for IndeterminateLayout {
    fn instance_layout(
        &self,
        engine: &LayoutEngine,
        _ty: &CilTypeRc,
        depth: InstanceLayoutDepth,
    ) -> Result<ComputedInstanceLayout> {
        Ok(ComputedInstanceLayout {
            packing: 0,
            size: LayoutWidth::Indeterminate,
            aligned_size: LayoutWidth::Indeterminate,
            alignment: engine.target().minimum_alignment,
            offsets: (depth == InstanceLayoutDepth::SizesAndOffsets).then(Vec::new),
        })
    }

    fn static_layout(
        &self,
        _engine: &LayoutEngine,
        _ty: &CilTypeRc,
        depth: StaticLayoutDepth,
    ) -> Result<ComputedStaticLayout> {
        Ok(statics::empty(depth))
    }

    fn contains_gc_pointers(&self, _engine: &LayoutEngine, _ty: &CilTypeRc) -> Result<bool> {
        Ok(true)
    }

    fn shape_characteristics(
        &self,
        _engine: &LayoutEngine,
        _ty: &CilTypeRc,
    ) -> Result<ShapeCharacteristics> {
        Ok(ShapeCharacteristics::none())
    }

    fn is_byref_like(&self, _engine: &LayoutEngine, _ty: &CilTypeRc) -> Result<bool> {
        Ok(false)
    }
}

/// The layout engine: selects the algorithm for a type's category, invokes it, and
/// memoizes the result on the type.
///
/// The engine is cheap to share (`&LayoutEngine` is all any caller needs) and
/// carries no per-type state of its own; all caching lives in the per-type memo
/// cells, so independent engines over the same types would still agree.
pub struct LayoutEngine {
    target: TargetProperties,
    defined: DefinedTypeLayout,
    array: ArrayLayout,
    pointer: PointerLayout,
    indeterminate: IndeterminateLayout,
}

impl LayoutEngine {
    /// Create an engine for the given target
    #[must_use]
    pub fn new(target: TargetProperties) -> Self {
        LayoutEngine {
            target,
            defined: DefinedTypeLayout,
            array: ArrayLayout,
            pointer: PointerLayout,
            indeterminate: IndeterminateLayout,
        }
    }

    /// The target this engine computes layout for
    #[must_use]
    pub fn target(&self) -> &TargetProperties {
        &self.target
    }

    /// Select the algorithm registered for a type category
    fn algorithm(&self, flavor: CilFlavor) -> &dyn LayoutAlgorithm {
        match flavor {
            CilFlavor::Array => &self.array,
            CilFlavor::Pointer | CilFlavor::ByRef | CilFlavor::FnPtr => &self.pointer,
            CilFlavor::GenericParameter | CilFlavor::Unknown => &self.indeterminate,
            _ => &self.defined,
        }
    }

    /// Compute (or fetch) the instance layout of `ty` at the requested depth.
    ///
    /// A deeper request on a type whose cached result is shallower recomputes and
    /// publishes the refined result; sizes and alignment never change across depths.
    ///
    /// # Errors
    /// Layout faults ([`Error::LayoutCycle`], [`Error::InvalidExplicitLayout`],
    /// [`Error::UnsupportedPacking`], [`Error::IndeterminateSize`]) abort only this
    /// type's computation; other types' cached results stay valid.
    pub fn instance_layout(
        &self,
        ty: &CilTypeRc,
        depth: InstanceLayoutDepth,
    ) -> Result<Arc<ComputedInstanceLayout>> {
        ty.layout.instance.get_or_compute(
            ty.token,
            |existing| depth > existing.depth(),
            |prior| {
                let computed = self.algorithm(ty.flavor).instance_layout(self, ty, depth)?;
                if let Some(prior) = prior {
                    if !computed.refines(prior) {
                        return Err(malformed_error!(
                            "Deeper instance layout for {} contradicts the cached result",
                            ty.token
                        ));
                    }
                }
                Ok(computed)
            },
        )
    }

    /// Compute (or fetch) the static layout of `ty` at the requested depth.
    ///
    /// Never depends on any other type's static layout; distinct types may be
    /// processed concurrently.
    ///
    /// # Errors
    /// Same fault scoping as [`LayoutEngine::instance_layout`].
    pub fn static_layout(
        &self,
        ty: &CilTypeRc,
        depth: StaticLayoutDepth,
    ) -> Result<Arc<ComputedStaticLayout>> {
        ty.layout.statics.get_or_compute(
            ty.token,
            |existing| depth > existing.depth(),
            |prior| {
                let computed = self.algorithm(ty.flavor).static_layout(self, ty, depth)?;
                if let Some(prior) = prior {
                    if !computed.refines(prior) {
                        return Err(malformed_error!(
                            "Deeper static layout for {} contradicts the cached result",
                            ty.token
                        ));
                    }
                }
                Ok(computed)
            },
        )
    }

    /// Decide whether instances of `ty` can transitively carry a collectable
    /// reference. Memoized forever; stable for the lifetime of the type identity.
    ///
    /// # Errors
    /// Returns [`Error::LayoutCycle`] for re-entrant containment and propagates
    /// resolution failures from dropped field-type references.
    pub fn contains_gc_pointers(&self, ty: &CilTypeRc) -> Result<bool> {
        let answer = ty.layout.gc_pointers.get_or_compute(
            ty.token,
            |_| false,
            |_| self.algorithm(ty.flavor).contains_gc_pointers(self, ty),
        )?;
        Ok(*answer)
    }

    /// Classify the value-type ABI shape of `ty`.
    ///
    /// # Errors
    /// Returns [`Error::LayoutCycle`] for re-entrant containment.
    pub fn shape_characteristics(&self, ty: &CilTypeRc) -> Result<ShapeCharacteristics> {
        let shape = ty.layout.shape.get_or_compute(
            ty.token,
            |_| false,
            |_| self.algorithm(ty.flavor).shape_characteristics(self, ty),
        )?;
        Ok(*shape)
    }

    /// The uniform element type of a homogeneous float aggregate.
    ///
    /// Defined only when [`LayoutEngine::shape_characteristics`] carries the HFA
    /// flag for `ty`.
    ///
    /// # Errors
    /// Returns [`Error::NotFloatAggregate`] when the precondition does not hold.
    pub fn hfa_element_type(&self, ty: &CilTypeRc) -> Result<FloatElement> {
        self.shape_characteristics(ty)?
            .hfa_element()
            .ok_or(Error::NotFloatAggregate(ty.token))
    }

    /// Decide whether `ty` is stack-only (by-ref-like).
    ///
    /// # Errors
    /// Returns [`Error::LayoutCycle`] for re-entrant containment.
    pub fn is_byref_like(&self, ty: &CilTypeRc) -> Result<bool> {
        let answer = ty.layout.byref_like.get_or_compute(
            ty.token,
            |_| false,
            |_| self.algorithm(ty.flavor).is_byref_like(self, ty),
        )?;
        Ok(*answer)
    }

    /// Warm every layout cache of every registered type, in parallel.
    ///
    /// Independent types are processed by independent worker threads; the per-type
    /// memo cells guarantee a type reached through both the batch and a recursive
    /// field query is still computed exactly once. Per-type faults are collected
    /// and returned instead of aborting the batch.
    pub fn compute_all(&self, registry: &TypeRegistry) -> Vec<(Token, Error)> {
        registry
            .snapshot()
            .par_iter()
            .flat_map_iter(|ty| {
                let mut faults = Vec::new();
                if let Err(fault) =
                    self.instance_layout(ty, InstanceLayoutDepth::SizesAndOffsets)
                {
                    faults.push((ty.token, fault));
                }
                if let Err(fault) =
                    self.static_layout(ty, StaticLayoutDepth::RegionSizesAndOffsets)
                {
                    faults.push((ty.token, fault));
                }
                if let Err(fault) = self.contains_gc_pointers(ty) {
                    faults.push((ty.token, fault));
                }
                if let Err(fault) = self.shape_characteristics(ty) {
                    faults.push((ty.token, fault));
                }
                if let Err(fault) = self.is_byref_like(ty) {
                    faults.push((ty.token, fault));
                }
                faults
            })
            .collect()
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        LayoutEngine::new(TargetProperties::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::typesystem::{PointerSize, TypeBuilder};

    fn setup() -> (TypeRegistry, LayoutEngine) {
        let registry = TypeRegistry::new().unwrap();
        let engine = LayoutEngine::new(TargetProperties::new(PointerSize::Bit64));
        (registry, engine)
    }

    #[test]
    fn test_primitive_layout() {
        let (registry, engine) = setup();
        let i4 = registry.primitive(CilFlavor::I4).unwrap();
        let layout = engine
            .instance_layout(&i4, InstanceLayoutDepth::Sizes)
            .unwrap();
        assert_eq!(layout.size, LayoutWidth::Known(4));
        assert_eq!(layout.aligned_size, LayoutWidth::Known(4));
        assert_eq!(layout.alignment, 4);
        assert!(layout.offsets.is_none());
    }

    #[test]
    fn test_dispatch_by_category() {
        let (registry, engine) = setup();

        let array = TypeBuilder::with_flavor(&registry, "Test", "Int32[]", CilFlavor::Array)
            .build()
            .unwrap();
        let layout = engine
            .instance_layout(&array, InstanceLayoutDepth::Sizes)
            .unwrap();
        assert_eq!(layout.size, LayoutWidth::Known(8));
        assert!(engine.contains_gc_pointers(&array).unwrap());

        let pointer = TypeBuilder::with_flavor(&registry, "Test", "Int32*", CilFlavor::Pointer)
            .build()
            .unwrap();
        assert!(!engine.contains_gc_pointers(&pointer).unwrap());
        assert!(!engine.is_byref_like(&pointer).unwrap());

        let byref = TypeBuilder::with_flavor(&registry, "Test", "Int32&", CilFlavor::ByRef)
            .build()
            .unwrap();
        assert!(engine.is_byref_like(&byref).unwrap());

        let generic =
            TypeBuilder::with_flavor(&registry, "Test", "T", CilFlavor::GenericParameter)
                .build()
                .unwrap();
        let layout = engine
            .instance_layout(&generic, InstanceLayoutDepth::Sizes)
            .unwrap();
        assert!(layout.size.is_indeterminate());
        assert!(engine.contains_gc_pointers(&generic).unwrap());
    }

    #[test]
    fn test_memoized_result_is_shared() {
        let (registry, engine) = setup();
        let i4 = registry.primitive(CilFlavor::I4).unwrap();
        let ty = TypeBuilder::value_type(&registry, "Test", "Memo")
            .field("A", &i4)
            .build()
            .unwrap();

        let first = engine
            .instance_layout(&ty, InstanceLayoutDepth::SizesAndOffsets)
            .unwrap();
        let second = engine
            .instance_layout(&ty, InstanceLayoutDepth::SizesAndOffsets)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // A shallower request is served by the deeper cached result.
        let shallow = engine
            .instance_layout(&ty, InstanceLayoutDepth::Sizes)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &shallow));
    }

    #[test]
    fn test_hfa_element_precondition() {
        let (registry, engine) = setup();
        let i4 = registry.primitive(CilFlavor::I4).unwrap();
        let ty = TypeBuilder::value_type(&registry, "Test", "NotHfa")
            .field("A", &i4)
            .build()
            .unwrap();
        assert!(matches!(
            engine.hfa_element_type(&ty),
            Err(Error::NotFloatAggregate(_))
        ));
    }

    #[test]
    fn test_compute_all_reports_faults_without_aborting() {
        let (registry, engine) = setup();
        let i4 = registry.primitive(CilFlavor::I4).unwrap();

        TypeBuilder::value_type(&registry, "Test", "Fine")
            .field("A", &i4)
            .build()
            .unwrap();

        // Explicit layout with a missing offset faults.
        let broken = TypeBuilder::value_type(&registry, "Test", "Broken")
            .explicit_layout()
            .field("NoOffset", &i4)
            .build()
            .unwrap();

        let faults = engine.compute_all(&registry);
        assert!(faults.iter().any(|(token, _)| *token == broken.token));

        let fine = registry.get_by_fullname("Test.Fine").unwrap();
        assert!(engine
            .instance_layout(&fine, InstanceLayoutDepth::SizesAndOffsets)
            .is_ok());
    }
}
