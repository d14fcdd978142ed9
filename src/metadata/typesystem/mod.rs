//! The type system surface the layout engine computes over.
//!
//! This module provides the layout subjects and their supporting plumbing. It
//! deliberately stops at the interface boundary of the surrounding type system:
//! metadata parsing, type resolution and generic instantiation happen elsewhere and
//! hand this module an already-resolved picture.
//!
//! # Key Components
//!
//! - [`CilType`]: the layout subject - flavor, base edge, ordered field list,
//!   packing directive and the per-type layout memo slot
//! - [`Field`]: a resolved field handle with storage attributes
//! - [`TypeRegistry`]: thread-safe registry owning the types of one type universe
//! - [`TypeBuilder`]: fluent construction of types and their fields
//!
//! # Examples
//!
//! ```rust
//! use cillayout::prelude::*;
//!
//! let registry = TypeRegistry::new()?;
//! let i4 = registry.primitive(CilFlavor::I4)?;
//!
//! let holder = TypeBuilder::value_type(&registry, "Demo", "Holder")
//!     .field("value", &i4)
//!     .build()?;
//! assert_eq!(holder.fullname(), "Demo.Holder");
//! # Ok::<(), cillayout::Error>(())
//! ```

mod base;
mod fields;
mod registry;

use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

pub use base::{CilFlavor, CilTypeRef, PointerSize};
pub use fields::{Field, FieldAttributes, FieldList, FieldRc};
pub use registry::{TypeBuilder, TypeRegistry};

use crate::{
    metadata::{layout::LayoutCache, token::Token},
    Result,
};

/// Reference to a [`CilType`]
pub type CilTypeRc = Arc<CilType>;

bitflags! {
    /// Layout-relevant type attributes.
    ///
    /// The low bits mirror the ECMA-335 `TypeAttributes` layout mask;
    /// `BYREF_LIKE` is a synthesized marker for stack-only value types (the
    /// runtime expresses it through an attribute rather than a flag bit).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeAttributes: u32 {
        /// Fields are laid out in declaration order
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Field offsets are declared explicitly and may overlap
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// Instances may hold interior references and must never leave the stack
        const BYREF_LIKE = 0x4000_0000;
    }
}

/// Maximum declared class size accepted by [`CilType::set_class_layout`] (256MB)
const MAX_CLASS_SIZE: u32 = 0x1000_0000;
/// Maximum packing directive accepted by [`CilType::set_class_layout`]
const MAX_PACKING_SIZE: u16 = 128;

/// Represents a 'Type' as the layout engine sees it.
///
/// The type carries exactly what layout computation consumes: a category flavor, an
/// optional base edge (weak - the engine never owns type identity), an ordered field
/// list, an optional packing/class-size directive, and a memoization slot for the
/// computed layout answers. Everything else about the type (methods, interfaces,
/// generic parameters) lives in the embedding type system.
pub struct CilType {
    /// Token
    pub token: Token,
    /// The type category driving layout algorithm selection
    pub flavor: CilFlavor,
    /// `TypeNamespace` (can be empty)
    pub namespace: String,
    /// `TypeName`
    pub name: String,
    /// Layout-relevant attribute flags
    pub flags: TypeAttributes,
    /// This type's base aka 'extends'
    base: OnceLock<CilTypeRef>,
    /// All fields this type declares, in declaration order
    pub fields: FieldList,
    /// A 2-byte value, specifying the maximum alignment clamp for fields (0 = unset)
    pub packing_size: OnceLock<u16>,
    /// A 4-byte value, specifying the declared size of the type (0 = unset)
    pub class_size: OnceLock<u32>,
    /// Memoization slot for computed layout results
    pub(crate) layout: LayoutCache,
}

impl CilType {
    /// Create a new instance of a `CilType`
    pub fn new(
        token: Token,
        flavor: CilFlavor,
        namespace: String,
        name: String,
        base: Option<CilTypeRc>,
        flags: TypeAttributes,
        fields: FieldList,
    ) -> Self {
        let base_lock = OnceLock::new();
        if let Some(base_value) = base {
            base_lock.set(CilTypeRef::new(&base_value)).ok();
        }

        CilType {
            token,
            flavor,
            namespace,
            name,
            flags,
            base: base_lock,
            fields,
            packing_size: OnceLock::new(),
            class_size: OnceLock::new(),
            layout: LayoutCache::new(),
        }
    }

    /// Access the base type of this type.
    ///
    /// Returns `Ok(None)` when no base edge was set.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeMissingParent`] when a base edge exists but the
    /// referenced type has been dropped by the embedding type system.
    pub fn base(&self) -> Result<Option<CilTypeRc>> {
        match self.base.get() {
            None => Ok(None),
            Some(weak) => weak
                .upgrade()
                .map(Some)
                .ok_or(crate::Error::TypeMissingParent(self.token)),
        }
    }

    /// Publish the base edge of this type.
    ///
    /// # Errors
    /// Returns an error if a base was already set.
    pub fn set_base(&self, base: &CilTypeRc) -> Result<()> {
        self.base
            .set(CilTypeRef::new(base))
            .map_err(|_| malformed_error!("Base type already set on {}", self.token))
    }

    /// Returns the full name (Namespace.Name) of the entity
    #[must_use]
    pub fn fullname(&self) -> String {
        format!("{0}.{1}", self.namespace, self.name)
    }

    /// True if this type declares explicit field placement
    #[must_use]
    pub fn is_explicit_layout(&self) -> bool {
        self.flags.contains(TypeAttributes::EXPLICIT_LAYOUT)
    }

    /// True if this type is explicitly marked as stack-only
    #[must_use]
    pub fn is_marked_byref_like(&self) -> bool {
        self.flags.contains(TypeAttributes::BYREF_LIKE)
    }

    /// Apply a class layout directive (packing clamp and/or declared size) to this type.
    ///
    /// Both values are validated the way the runtime validates `ClassLayout` rows
    /// before they are published: packing must be 0 (unset) or a power of two no
    /// larger than 128, the declared size is capped at 256MB, and layout directives
    /// only apply to classes and value types.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedPacking`] for an invalid packing value, and
    /// a malformed-metadata error for oversized class sizes, incompatible flavors, or
    /// a directive that was already applied.
    pub fn set_class_layout(&self, packing_size: u16, class_size: u32) -> Result<()> {
        if !packing_size.is_power_of_two() && packing_size != 0
            || packing_size > MAX_PACKING_SIZE
        {
            return Err(crate::Error::UnsupportedPacking {
                token: self.token,
                packing: packing_size,
            });
        }

        if class_size > MAX_CLASS_SIZE {
            return Err(malformed_error!(
                "Class size {} for type {} (Token: {}) exceeds maximum allowed size",
                class_size,
                self.name,
                self.token
            ));
        }

        match self.flavor {
            CilFlavor::Class | CilFlavor::ValueType => {}
            _ => {
                return Err(malformed_error!(
                    "Invalid type {} (Token: {}) for a layout directive - must be class or value type",
                    self.name,
                    self.token
                ));
            }
        }

        self.packing_size
            .set(packing_size)
            .map_err(|_| malformed_error!("Packing size already set on {}", self.token))?;
        self.class_size
            .set(class_size)
            .map_err(|_| malformed_error!("Class size already set on {}", self.token))
    }

    /// The packing clamp in effect for this type (0 = unset)
    #[must_use]
    pub fn packing(&self) -> u16 {
        self.packing_size.get().copied().unwrap_or(0)
    }

    /// The declared class size, if one was set and non-zero
    #[must_use]
    pub fn declared_size(&self) -> Option<u32> {
        match self.class_size.get() {
            Some(0) | None => None,
            Some(size) => Some(*size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_type(name: &str) -> CilType {
        CilType::new(
            Token::typedef(1),
            CilFlavor::ValueType,
            "Test".to_string(),
            name.to_string(),
            None,
            TypeAttributes::SEQUENTIAL_LAYOUT,
            Arc::new(boxcar::Vec::new()),
        )
    }

    #[test]
    fn test_fullname() {
        let ty = value_type("Point");
        assert_eq!(ty.fullname(), "Test.Point");
    }

    #[test]
    fn test_base_unset_is_none() {
        let ty = value_type("Point");
        assert!(matches!(ty.base(), Ok(None)));
    }

    #[test]
    fn test_base_set_once() {
        let base = Arc::new(value_type("Base"));
        let ty = value_type("Derived");
        ty.set_base(&base).unwrap();
        assert!(ty.set_base(&base).is_err());
        let resolved = ty.base().unwrap().unwrap();
        assert_eq!(resolved.name, "Base");
    }

    #[test]
    fn test_dropped_base_reported() {
        let ty = value_type("Derived");
        {
            let base = Arc::new(value_type("Base"));
            ty.set_base(&base).unwrap();
        }
        assert!(matches!(
            ty.base(),
            Err(crate::Error::TypeMissingParent(_))
        ));
    }

    #[test]
    fn test_class_layout_validation() {
        let ty = value_type("Packed");
        assert!(matches!(
            ty.set_class_layout(3, 0),
            Err(crate::Error::UnsupportedPacking { packing: 3, .. })
        ));
        assert!(matches!(
            ty.set_class_layout(256, 0),
            Err(crate::Error::UnsupportedPacking { packing: 256, .. })
        ));
        assert!(ty.set_class_layout(4, 16).is_ok());
        assert!(ty.set_class_layout(4, 16).is_err());
        assert_eq!(ty.packing(), 4);
        assert_eq!(ty.declared_size(), Some(16));
    }

    #[test]
    fn test_class_layout_rejects_oversized() {
        let ty = value_type("Huge");
        assert!(ty.set_class_layout(0, 0x1000_0001).is_err());
    }

    #[test]
    fn test_class_layout_rejects_interfaces() {
        let ty = CilType::new(
            Token::typedef(2),
            CilFlavor::Interface,
            "Test".to_string(),
            "IFace".to_string(),
            None,
            TypeAttributes::empty(),
            Arc::new(boxcar::Vec::new()),
        );
        assert!(ty.set_class_layout(8, 0).is_err());
    }

    #[test]
    fn test_declared_size_zero_is_unset() {
        let ty = value_type("Plain");
        ty.set_class_layout(0, 0).unwrap();
        assert_eq!(ty.declared_size(), None);
        assert_eq!(ty.packing(), 0);
    }
}
