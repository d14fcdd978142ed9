//! # cillayout Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the cillayout library. Import this module to get quick access to the essential
//! types for computing managed type layouts.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cillayout operations
pub use crate::Error;

/// The result type used throughout cillayout
pub use crate::Result;

// ================================================================================================
// Type System
// ================================================================================================

/// Metadata token type for referencing type system entries
pub use crate::metadata::token::Token;

/// Core type system components
pub use crate::metadata::typesystem::{
    CilFlavor, CilType, CilTypeRc, CilTypeRef, Field, FieldAttributes, FieldList, FieldRc,
    PointerSize, TypeAttributes, TypeBuilder, TypeRegistry,
};

// ================================================================================================
// Layout Engine
// ================================================================================================

/// The layout engine and its target description
pub use crate::metadata::layout::{LayoutEngine, TargetProperties};

/// Computation depths for instance and static layout requests
pub use crate::metadata::layout::{InstanceLayoutDepth, StaticLayoutDepth};

/// Layout result value types
pub use crate::metadata::layout::{
    ComputedInstanceLayout, ComputedStaticLayout, FieldPlacement, FloatElement, LayoutWidth,
    ShapeCharacteristics, ShapeFlags, StaticFieldPlacement, StaticRegion, StaticsBlock,
};
