//! Foundational type system building blocks.
//!
//! This module provides the weak-reference plumbing ([`CilTypeRef`]) that keeps the
//! type graph free of ownership cycles, the [`CilFlavor`] category enum that drives
//! layout algorithm selection, and the [`PointerSize`] description of the target's
//! native word width.

use std::sync::Weak;

use strum::EnumIter;

use crate::metadata::{token::Token, typesystem::CilType, typesystem::CilTypeRc};

/// Pointer width of the layout target.
///
/// Native integers (`I`/`U`), object references, pointers and by-refs are all sized
/// by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSize {
    /// 32-bit target (4-byte pointers)
    Bit32,
    /// 64-bit target (8-byte pointers)
    Bit64,
}

impl PointerSize {
    /// Width of a pointer in bytes for this target
    #[must_use]
    pub fn bytes(self) -> u32 {
        match self {
            PointerSize::Bit32 => 4,
            PointerSize::Bit64 => 8,
        }
    }
}

/// A smart reference to a [`CilType`] that automatically handles weak references
/// to prevent circular reference memory leaks while providing a clean API.
///
/// The layout engine never owns type identity; base-type edges and field-type edges
/// are all held through this wrapper and read-only.
#[derive(Clone, Debug)]
pub struct CilTypeRef {
    weak_ref: Weak<CilType>,
}

impl CilTypeRef {
    /// Create a new `CilTypeRef` from a strong reference
    pub fn new(strong_ref: &CilTypeRc) -> Self {
        Self {
            weak_ref: std::sync::Arc::downgrade(strong_ref),
        }
    }

    /// Get a strong reference to the type, returning None if the type has been dropped
    #[must_use]
    pub fn upgrade(&self) -> Option<CilTypeRc> {
        self.weak_ref.upgrade()
    }

    /// Check if the referenced type is still alive
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.weak_ref.strong_count() > 0
    }

    /// Get the token of the referenced type (if still alive)
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.upgrade().map(|t| t.token)
    }

    /// Get the name of the referenced type (if still alive)
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.upgrade().map(|t| t.name.clone())
    }
}

impl From<CilTypeRc> for CilTypeRef {
    fn from(strong_ref: CilTypeRc) -> Self {
        Self::new(&strong_ref)
    }
}

/// Represents type flavors in the type system.
///
/// The flavor is the category key the layout dispatcher selects its algorithm by:
/// primitives and `ValueType` lay out inline, reference kinds lay out their field
/// block but occupy one pointer when embedded as a field, pointers/by-refs are
/// word-sized, and generic parameters have no resolvable magnitude at all.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum CilFlavor {
    // Base primitive types
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    I,
    U,
    Object,
    String,

    // Complex types
    Array,
    Pointer,
    ByRef,
    FnPtr,
    GenericParameter,

    // Type categories
    Class,
    ValueType,
    Interface,

    // Fallback
    Unknown,
}

impl CilFlavor {
    /// Check if this is a primitive type
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            CilFlavor::Void
                | CilFlavor::Boolean
                | CilFlavor::Char
                | CilFlavor::I1
                | CilFlavor::U1
                | CilFlavor::I2
                | CilFlavor::U2
                | CilFlavor::I4
                | CilFlavor::U4
                | CilFlavor::I8
                | CilFlavor::U8
                | CilFlavor::R4
                | CilFlavor::R8
                | CilFlavor::I
                | CilFlavor::U
                | CilFlavor::Object
                | CilFlavor::String
        )
    }

    /// Check if this is a value type (inlined when used as a field)
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            CilFlavor::Boolean
                | CilFlavor::Char
                | CilFlavor::I1
                | CilFlavor::U1
                | CilFlavor::I2
                | CilFlavor::U2
                | CilFlavor::I4
                | CilFlavor::U4
                | CilFlavor::I8
                | CilFlavor::U8
                | CilFlavor::R4
                | CilFlavor::R8
                | CilFlavor::I
                | CilFlavor::U
                | CilFlavor::ValueType
        )
    }

    /// Check if this is a reference kind (collectable, pointer-sized when embedded)
    #[must_use]
    pub fn is_reference_kind(&self) -> bool {
        matches!(
            self,
            CilFlavor::Object
                | CilFlavor::String
                | CilFlavor::Class
                | CilFlavor::Interface
                | CilFlavor::Array
        )
    }

    /// Check if this is a floating-point primitive
    #[must_use]
    pub fn is_floating_point(&self) -> bool {
        matches!(self, CilFlavor::R4 | CilFlavor::R8)
    }

    /// Byte size of this flavor when it is a fixed-size primitive.
    ///
    /// Native-word flavors (`I`, `U`) size by the target's pointer width. Returns
    /// `None` for `Void` and for anything that is not a self-sized primitive
    /// (reference kinds, composites, pointers).
    #[must_use]
    pub fn primitive_size(&self, ptr_size: PointerSize) -> Option<u32> {
        match self {
            CilFlavor::Boolean | CilFlavor::I1 | CilFlavor::U1 => Some(1),
            CilFlavor::Char | CilFlavor::I2 | CilFlavor::U2 => Some(2),
            CilFlavor::I4 | CilFlavor::U4 | CilFlavor::R4 => Some(4),
            CilFlavor::I8 | CilFlavor::U8 | CilFlavor::R8 => Some(8),
            CilFlavor::I | CilFlavor::U => Some(ptr_size.bytes()),
            _ => None,
        }
    }

    /// Natural alignment of this flavor when it is a fixed-size primitive.
    ///
    /// Primitives align naturally (alignment equals size).
    #[must_use]
    pub fn primitive_alignment(&self, ptr_size: PointerSize) -> Option<u32> {
        self.primitive_size(ptr_size)
    }

    /// The `System.*` name under which this flavor is pre-registered, if any
    #[must_use]
    pub fn system_name(&self) -> Option<(&'static str, &'static str)> {
        match self {
            CilFlavor::Void => Some(("System", "Void")),
            CilFlavor::Boolean => Some(("System", "Boolean")),
            CilFlavor::Char => Some(("System", "Char")),
            CilFlavor::I1 => Some(("System", "SByte")),
            CilFlavor::U1 => Some(("System", "Byte")),
            CilFlavor::I2 => Some(("System", "Int16")),
            CilFlavor::U2 => Some(("System", "UInt16")),
            CilFlavor::I4 => Some(("System", "Int32")),
            CilFlavor::U4 => Some(("System", "UInt32")),
            CilFlavor::I8 => Some(("System", "Int64")),
            CilFlavor::U8 => Some(("System", "UInt64")),
            CilFlavor::R4 => Some(("System", "Single")),
            CilFlavor::R8 => Some(("System", "Double")),
            CilFlavor::I => Some(("System", "IntPtr")),
            CilFlavor::U => Some(("System", "UIntPtr")),
            CilFlavor::Object => Some(("System", "Object")),
            CilFlavor::String => Some(("System", "String")),
            _ => None,
        }
    }
}
