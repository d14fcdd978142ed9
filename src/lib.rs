// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # cillayout
//!
//! A pluggable field layout engine for managed (.NET-style) type systems.
//!
//! Given a type's resolved, ordered field list and its base type's already-computed
//! layout, `cillayout` deterministically derives the in-memory shape of that type:
//! instance field offsets, instance size and alignment, static-storage regions
//! partitioned by GC tracking and thread locality, GC-pointer containment, and
//! ABI-relevant shape classifications (homogeneous float aggregates, stack-only
//! by-ref-like types).
//!
//! The engine never parses metadata and never decides which fields a type has; it is
//! a pure, in-process computational contract sitting between a type loader and the
//! consumers of layout answers (code generation, object allocation, GC scanning,
//! calling-convention lowering).
//!
//! ## Features
//!
//! - **Pluggable algorithms** - layout strategies are selected per type category
//!   (defined types, arrays, pointers, unresolved generics)
//! - **Depth-aware results** - callers request region/size information only, or full
//!   field offsets, and can upgrade later; deeper results strictly refine shallower ones
//! - **Per-type memoization** - each computation happens exactly once per type, with
//!   re-entrancy converted into a reported cycle fault instead of unbounded recursion
//! - **Concurrency-safe** - independent types lay out concurrently with no shared
//!   mutable state; [`LayoutEngine::compute_all`] warms a whole registry in parallel
//! - **Indeterminate sizes** - magnitudes flowing through unresolved generic sharing
//!   propagate explicitly instead of collapsing into a bogus concrete number
//!
//! ## Quick Start
//!
//! ```rust
//! use cillayout::prelude::*;
//!
//! let registry = TypeRegistry::new()?;
//! let engine = LayoutEngine::new(TargetProperties::new(PointerSize::Bit64));
//!
//! let i4 = registry.primitive(CilFlavor::I4)?;
//! let r8 = registry.primitive(CilFlavor::R8)?;
//!
//! let point = TypeBuilder::value_type(&registry, "Demo", "Point")
//!     .field("X", &i4)
//!     .field("Y", &r8)
//!     .build()?;
//!
//! let layout = engine.instance_layout(&point, InstanceLayoutDepth::SizesAndOffsets)?;
//! assert_eq!(layout.alignment, 8);
//! # Ok::<(), cillayout::Error>(())
//! ```

#[macro_use]
pub(crate) mod error;

/// Prelude module for convenient imports
///
/// This module provides a curated selection of the most frequently used types
/// from across the cillayout library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust
/// use cillayout::prelude::*;
///
/// let registry = TypeRegistry::new()?;
/// let engine = LayoutEngine::new(TargetProperties::default());
/// # Ok::<(), cillayout::Error>(())
/// ```
pub mod prelude;

/// Type system surface and the layout engine itself
///
/// This module hosts the two halves of the crate:
///
/// - [`metadata::typesystem`] - the layout subjects: [`metadata::typesystem::CilType`],
///   its fields, the weak-reference plumbing, and the [`metadata::typesystem::TypeRegistry`]
///   used to assemble and look up types
/// - [`metadata::layout`] - the engine: [`metadata::layout::LayoutEngine`], the per-category
///   algorithm strategies, result value types, and the per-type memoization cells
pub mod metadata;

/// The result type used throughout cillayout
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;

pub use metadata::layout::{
    ComputedInstanceLayout, ComputedStaticLayout, FloatElement, InstanceLayoutDepth,
    LayoutEngine, LayoutWidth, ShapeCharacteristics, StaticLayoutDepth, StaticRegion,
    StaticsBlock, TargetProperties,
};
pub use metadata::typesystem::{CilFlavor, CilType, CilTypeRc, PointerSize, TypeRegistry};
