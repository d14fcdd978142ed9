//! Field handles consumed by the layout engine.
//!
//! A [`Field`] is a symbolic handle to a declared field: its declared type (held
//! weakly, the engine never owns type identity), its storage attributes, and an
//! optional explicit byte offset published once by the metadata loader. Fields are
//! immutable once resolved; the declaration order of a type's [`FieldList`] is
//! semantically meaningful for implicit layout.

use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

use crate::{
    metadata::{token::Token, typesystem::CilTypeRc, typesystem::CilTypeRef},
    Result,
};

/// Reference to a [`Field`]
pub type FieldRc = Arc<Field>;
/// A vector that holds a list of [`Field`] in declaration order
pub type FieldList = Arc<boxcar::Vec<FieldRc>>;

bitflags! {
    /// Storage attributes of a field.
    ///
    /// The low bits mirror ECMA-335 `FieldAttributes`; `THREAD_STATIC` is a
    /// synthesized marker (the runtime expresses it through an attribute rather
    /// than a flag bit) kept outside the ECMA bit range.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldAttributes: u32 {
        /// Field belongs to the type, not to instances
        const STATIC = 0x0010;
        /// Field can only be initialized, not written after init
        const INIT_ONLY = 0x0020;
        /// Field is a compile-time constant with no storage
        const LITERAL = 0x0040;
        /// Static field with one storage slot per thread
        const THREAD_STATIC = 0x0001_0000;
    }
}

/// A declared field of a [`crate::metadata::typesystem::CilType`].
///
/// Owned by the type that declares it. The `layout` slot carries the explicit byte
/// offset for explicit-layout types and stays empty otherwise; its absence for an
/// explicit-layout instance field is a layout fault, not a default of zero.
#[derive(Debug)]
pub struct Field {
    /// `RowID` within the declaring type's field list (1-based)
    pub rid: u32,
    /// Token
    pub token: Token,
    /// Field name
    pub name: String,
    /// Storage attributes
    pub flags: FieldAttributes,
    /// The declared type of this field (weak reference)
    pub field_type: CilTypeRef,
    /// A 4-byte value, specifying the byte offset of the field within the class
    pub layout: OnceLock<u32>,
}

impl Field {
    /// Create a new field handle
    pub fn new(
        rid: u32,
        token: Token,
        name: String,
        flags: FieldAttributes,
        field_type: CilTypeRef,
    ) -> Self {
        Field {
            rid,
            token,
            name,
            flags,
            field_type,
            layout: OnceLock::new(),
        }
    }

    /// True if this field has per-type (static) storage
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }

    /// True if this field has one static storage slot per thread
    #[must_use]
    pub fn is_thread_static(&self) -> bool {
        self.flags.contains(FieldAttributes::THREAD_STATIC)
    }

    /// True if this field occupies per-instance storage
    #[must_use]
    pub fn is_instance(&self) -> bool {
        !self.is_static()
    }

    /// True if this field is a compile-time constant with no storage at all
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.flags.contains(FieldAttributes::LITERAL)
    }

    /// The explicit byte offset declared for this field, if any
    #[must_use]
    pub fn explicit_offset(&self) -> Option<u32> {
        self.layout.get().copied()
    }

    /// Publish the explicit byte offset for this field.
    ///
    /// # Errors
    /// Returns an error if an explicit offset was already set.
    pub fn set_explicit_offset(&self, offset: u32) -> Result<()> {
        self.layout
            .set(offset)
            .map_err(|_| malformed_error!("Explicit offset already set on field {}", self.token))
    }

    /// Resolve the declared type of this field.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeMissingParent`] if the referenced type has been
    /// dropped by the embedding type system.
    pub fn resolved_type(&self) -> Result<CilTypeRc> {
        self.field_type
            .upgrade()
            .ok_or(crate::Error::TypeMissingParent(self.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::typesystem::{CilFlavor, CilType, TypeAttributes};

    fn int32() -> CilTypeRc {
        Arc::new(CilType::new(
            Token::typedef(1),
            CilFlavor::I4,
            "System".to_string(),
            "Int32".to_string(),
            None,
            TypeAttributes::empty(),
            Arc::new(boxcar::Vec::new()),
        ))
    }

    #[test]
    fn test_field_storage_predicates() {
        let ty = int32();
        let instance = Field::new(
            1,
            Token::field(1),
            "value".to_string(),
            FieldAttributes::empty(),
            CilTypeRef::new(&ty),
        );
        assert!(instance.is_instance());
        assert!(!instance.is_static());
        assert!(!instance.is_thread_static());

        let stat = Field::new(
            2,
            Token::field(2),
            "counter".to_string(),
            FieldAttributes::STATIC,
            CilTypeRef::new(&ty),
        );
        assert!(stat.is_static());
        assert!(!stat.is_instance());

        let tls = Field::new(
            3,
            Token::field(3),
            "slot".to_string(),
            FieldAttributes::STATIC | FieldAttributes::THREAD_STATIC,
            CilTypeRef::new(&ty),
        );
        assert!(tls.is_static());
        assert!(tls.is_thread_static());
    }

    #[test]
    fn test_explicit_offset_set_once() {
        let ty = int32();
        let field = Field::new(
            1,
            Token::field(1),
            "x".to_string(),
            FieldAttributes::empty(),
            CilTypeRef::new(&ty),
        );
        assert_eq!(field.explicit_offset(), None);
        field.set_explicit_offset(8).unwrap();
        assert_eq!(field.explicit_offset(), Some(8));
        assert!(field.set_explicit_offset(16).is_err());
    }

    #[test]
    fn test_resolved_type_reports_dropped_referent() {
        let ty = int32();
        let field = Field::new(
            1,
            Token::field(1),
            "x".to_string(),
            FieldAttributes::empty(),
            CilTypeRef::new(&ty),
        );
        assert!(field.resolved_type().is_ok());
        drop(ty);
        assert!(matches!(
            field.resolved_type(),
            Err(crate::Error::TypeMissingParent(_))
        ));
    }
}
