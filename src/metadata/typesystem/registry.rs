//! Central type registry and builder.
//!
//! The [`TypeRegistry`] owns the types of one type universe and is the anchor the
//! layout engine's weak references point into. It is designed for high-concurrency
//! scenarios: lock-free primary storage (`SkipMap`) keyed by token, a concurrent
//! fullname index (`DashMap`), and atomic token generation. Layout computation for
//! distinct registered types may proceed concurrently; the registry itself never
//! blocks lookups during insertion.
//!
//! [`TypeBuilder`] is the fluent construction surface used by embedders and tests to
//! assemble a type, its field list and its layout directives in one pass.
//!
//! # Examples
//!
//! ```rust
//! use cillayout::prelude::*;
//!
//! let registry = TypeRegistry::new()?;
//! let i4 = registry.primitive(CilFlavor::I4)?;
//!
//! let pair = TypeBuilder::value_type(&registry, "Demo", "Pair")
//!     .field("First", &i4)
//!     .field("Second", &i4)
//!     .build()?;
//!
//! assert!(registry.get(&pair.token).is_some());
//! assert!(registry.get_by_fullname("Demo.Pair").is_some());
//! # Ok::<(), cillayout::Error>(())
//! ```

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use strum::IntoEnumIterator;

use crate::{
    metadata::{
        token::Token,
        typesystem::{
            CilFlavor, CilType, CilTypeRc, CilTypeRef, Field, FieldAttributes, FieldRc,
            TypeAttributes,
        },
    },
    Result,
};

/// Central registry for all types of one type universe.
///
/// The registry pre-registers the runtime primitives (`System.Int32`,
/// `System.Double`, ...) on construction so field declarations can reference them
/// immediately. All collections are concurrent; shared references to the registry
/// can be used from multiple threads without external locking.
pub struct TypeRegistry {
    /// Primary storage, keyed by token
    types: SkipMap<Token, CilTypeRc>,
    /// Fullname ("Namespace.Name") index
    fullname_index: DashMap<String, Token>,
    /// Pre-registered primitive types, keyed by flavor
    primitives: DashMap<CilFlavor, CilTypeRc>,
    /// Next TypeDef row to hand out
    next_type_rid: AtomicU32,
    /// Next Field row to hand out
    next_field_rid: AtomicU32,
}

impl TypeRegistry {
    /// Create a new registry with all primitive types pre-registered.
    ///
    /// # Errors
    /// Returns an error if primitive registration fails (duplicate tokens, which
    /// would indicate a bug in token generation).
    pub fn new() -> Result<Self> {
        let registry = TypeRegistry {
            types: SkipMap::new(),
            fullname_index: DashMap::new(),
            primitives: DashMap::new(),
            next_type_rid: AtomicU32::new(1),
            next_field_rid: AtomicU32::new(1),
        };

        for flavor in CilFlavor::iter() {
            let Some((namespace, name)) = flavor.system_name() else {
                continue;
            };

            let primitive = Arc::new(CilType::new(
                registry.next_token(),
                flavor,
                namespace.to_string(),
                name.to_string(),
                None,
                TypeAttributes::empty(),
                Arc::new(boxcar::Vec::new()),
            ));
            registry.insert(&primitive)?;
            registry.primitives.insert(flavor, primitive);
        }

        Ok(registry)
    }

    /// Allocate the next type definition token
    pub fn next_token(&self) -> Token {
        Token::typedef(self.next_type_rid.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate the next field token
    pub(crate) fn next_field_token(&self) -> (u32, Token) {
        let rid = self.next_field_rid.fetch_add(1, Ordering::Relaxed);
        (rid, Token::field(rid))
    }

    /// Register a type.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeInsert`] if a type with the same token is already
    /// registered.
    pub fn insert(&self, ty: &CilTypeRc) -> Result<()> {
        if self.types.contains_key(&ty.token) {
            return Err(crate::Error::TypeInsert(ty.token));
        }

        self.types.insert(ty.token, ty.clone());
        self.fullname_index.insert(ty.fullname(), ty.token);
        Ok(())
    }

    /// Look up a type by token
    #[must_use]
    pub fn get(&self, token: &Token) -> Option<CilTypeRc> {
        self.types.get(token).map(|entry| entry.value().clone())
    }

    /// Look up a type by its full "Namespace.Name"
    #[must_use]
    pub fn get_by_fullname(&self, fullname: &str) -> Option<CilTypeRc> {
        let token = *self.fullname_index.get(fullname)?;
        self.get(&token)
    }

    /// Look up a pre-registered primitive type by flavor.
    ///
    /// # Errors
    /// Returns an error if the flavor has no pre-registered primitive (composites,
    /// pointers, ...).
    pub fn primitive(&self, flavor: CilFlavor) -> Result<CilTypeRc> {
        self.primitives
            .get(&flavor)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| malformed_error!("No primitive registered for flavor {:?}", flavor))
    }

    /// Number of registered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True if no types are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Snapshot of all registered types.
    ///
    /// Used by batch operations ([`crate::metadata::layout::LayoutEngine::compute_all`])
    /// that want a stable working set while the registry stays open for insertion.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CilTypeRc> {
        self.types
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

/// A pending field recorded by [`TypeBuilder`]
struct PendingField {
    name: String,
    flags: FieldAttributes,
    field_type: CilTypeRc,
    explicit_offset: Option<u32>,
}

/// Fluent builder for constructing and registering a [`CilType`].
///
/// The builder mints tokens from the registry, wires field-type edges as weak
/// references, applies the layout directive (packing / declared size) with
/// validation, and registers the finished type.
pub struct TypeBuilder<'a> {
    registry: &'a TypeRegistry,
    namespace: String,
    name: String,
    flavor: CilFlavor,
    flags: TypeAttributes,
    base: Option<CilTypeRc>,
    packing: Option<u16>,
    class_size: Option<u32>,
    fields: Vec<PendingField>,
}

impl<'a> TypeBuilder<'a> {
    /// Start building a value type (struct)
    #[must_use]
    pub fn value_type(registry: &'a TypeRegistry, namespace: &str, name: &str) -> Self {
        Self::with_flavor(registry, namespace, name, CilFlavor::ValueType)
            .flags(TypeAttributes::SEQUENTIAL_LAYOUT)
    }

    /// Start building a class
    #[must_use]
    pub fn class(registry: &'a TypeRegistry, namespace: &str, name: &str) -> Self {
        Self::with_flavor(registry, namespace, name, CilFlavor::Class)
    }

    /// Start building a type of an arbitrary flavor
    #[must_use]
    pub fn with_flavor(
        registry: &'a TypeRegistry,
        namespace: &str,
        name: &str,
        flavor: CilFlavor,
    ) -> Self {
        TypeBuilder {
            registry,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flavor,
            flags: TypeAttributes::empty(),
            base: None,
            packing: None,
            class_size: None,
            fields: Vec::new(),
        }
    }

    /// Add attribute flags
    #[must_use]
    pub fn flags(mut self, flags: TypeAttributes) -> Self {
        self.flags |= flags;
        self
    }

    /// Switch the type to explicit field placement
    #[must_use]
    pub fn explicit_layout(mut self) -> Self {
        self.flags.remove(TypeAttributes::SEQUENTIAL_LAYOUT);
        self.flags |= TypeAttributes::EXPLICIT_LAYOUT;
        self
    }

    /// Mark the type as stack-only (by-ref-like)
    #[must_use]
    pub fn byref_like(mut self) -> Self {
        self.flags |= TypeAttributes::BYREF_LIKE;
        self
    }

    /// Set the base type
    #[must_use]
    pub fn base(mut self, base: &CilTypeRc) -> Self {
        self.base = Some(base.clone());
        self
    }

    /// Set the packing clamp
    #[must_use]
    pub fn packing(mut self, packing: u16) -> Self {
        self.packing = Some(packing);
        self
    }

    /// Set the declared class size
    #[must_use]
    pub fn class_size(mut self, class_size: u32) -> Self {
        self.class_size = Some(class_size);
        self
    }

    /// Add an instance field
    #[must_use]
    pub fn field(mut self, name: &str, field_type: &CilTypeRc) -> Self {
        self.fields.push(PendingField {
            name: name.to_string(),
            flags: FieldAttributes::empty(),
            field_type: field_type.clone(),
            explicit_offset: None,
        });
        self
    }

    /// Add an instance field with a declared explicit offset
    #[must_use]
    pub fn field_at(mut self, name: &str, field_type: &CilTypeRc, offset: u32) -> Self {
        self.fields.push(PendingField {
            name: name.to_string(),
            flags: FieldAttributes::empty(),
            field_type: field_type.clone(),
            explicit_offset: Some(offset),
        });
        self
    }

    /// Add a static field
    #[must_use]
    pub fn static_field(mut self, name: &str, field_type: &CilTypeRc) -> Self {
        self.fields.push(PendingField {
            name: name.to_string(),
            flags: FieldAttributes::STATIC,
            field_type: field_type.clone(),
            explicit_offset: None,
        });
        self
    }

    /// Add a thread-local static field
    #[must_use]
    pub fn thread_static_field(mut self, name: &str, field_type: &CilTypeRc) -> Self {
        self.fields.push(PendingField {
            name: name.to_string(),
            flags: FieldAttributes::STATIC | FieldAttributes::THREAD_STATIC,
            field_type: field_type.clone(),
            explicit_offset: None,
        });
        self
    }

    /// Add a literal (constant) field - declared but without storage
    #[must_use]
    pub fn literal_field(mut self, name: &str, field_type: &CilTypeRc) -> Self {
        self.fields.push(PendingField {
            name: name.to_string(),
            flags: FieldAttributes::STATIC | FieldAttributes::LITERAL,
            field_type: field_type.clone(),
            explicit_offset: None,
        });
        self
    }

    /// Construct the type, wire its fields and register it.
    ///
    /// # Errors
    /// Returns an error for invalid layout directives (see
    /// [`CilType::set_class_layout`]), duplicate explicit offsets, or registry
    /// insertion failures.
    pub fn build(self) -> Result<CilTypeRc> {
        let token = self.registry.next_token();
        let field_list: crate::metadata::typesystem::FieldList = Arc::new(boxcar::Vec::new());

        let ty = Arc::new(CilType::new(
            token,
            self.flavor,
            self.namespace,
            self.name,
            self.base,
            self.flags,
            field_list.clone(),
        ));

        if self.packing.is_some() || self.class_size.is_some() {
            ty.set_class_layout(
                self.packing.unwrap_or(0),
                self.class_size.unwrap_or(0),
            )?;
        }

        for pending in self.fields {
            let (rid, field_token) = self.registry.next_field_token();
            let field: FieldRc = Arc::new(Field::new(
                rid,
                field_token,
                pending.name,
                pending.flags,
                CilTypeRef::new(&pending.field_type),
            ));
            if let Some(offset) = pending.explicit_offset {
                field.set_explicit_offset(offset)?;
            }
            field_list.push(field);
        }

        self.registry.insert(&ty)?;
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_preregisters_primitives() {
        let registry = TypeRegistry::new().unwrap();
        assert!(!registry.is_empty());

        let i4 = registry.primitive(CilFlavor::I4).unwrap();
        assert_eq!(i4.fullname(), "System.Int32");
        assert_eq!(i4.flavor, CilFlavor::I4);

        let by_name = registry.get_by_fullname("System.Double").unwrap();
        assert_eq!(by_name.flavor, CilFlavor::R8);
    }

    #[test]
    fn test_registry_rejects_duplicate_tokens() {
        let registry = TypeRegistry::new().unwrap();
        let ty = TypeBuilder::value_type(&registry, "Test", "Once")
            .build()
            .unwrap();
        assert!(matches!(
            registry.insert(&ty),
            Err(crate::Error::TypeInsert(_))
        ));
    }

    #[test]
    fn test_registry_unknown_primitive() {
        let registry = TypeRegistry::new().unwrap();
        assert!(registry.primitive(CilFlavor::Class).is_err());
    }

    #[test]
    fn test_builder_wires_fields_in_declaration_order() {
        let registry = TypeRegistry::new().unwrap();
        let i4 = registry.primitive(CilFlavor::I4).unwrap();
        let r8 = registry.primitive(CilFlavor::R8).unwrap();

        let ty = TypeBuilder::value_type(&registry, "Test", "Pair")
            .field("A", &i4)
            .field("B", &r8)
            .static_field("Count", &i4)
            .build()
            .unwrap();

        let names: Vec<String> = ty.fields.iter().map(|(_, f)| f.name.clone()).collect();
        assert_eq!(names, vec!["A", "B", "Count"]);

        let (_, first) = ty.fields.iter().next().unwrap();
        assert_eq!(first.resolved_type().unwrap().flavor, CilFlavor::I4);
        assert!(first.is_instance());
    }

    #[test]
    fn test_builder_applies_layout_directive() {
        let registry = TypeRegistry::new().unwrap();
        let ty = TypeBuilder::value_type(&registry, "Test", "Packed")
            .packing(2)
            .class_size(24)
            .build()
            .unwrap();
        assert_eq!(ty.packing(), 2);
        assert_eq!(ty.declared_size(), Some(24));
    }

    #[test]
    fn test_builder_explicit_layout_offsets() {
        let registry = TypeRegistry::new().unwrap();
        let i4 = registry.primitive(CilFlavor::I4).unwrap();
        let ty = TypeBuilder::value_type(&registry, "Test", "Union")
            .explicit_layout()
            .field_at("AsInt", &i4, 0)
            .field_at("AsOther", &i4, 0)
            .build()
            .unwrap();
        assert!(ty.is_explicit_layout());
        for (_, field) in ty.fields.iter() {
            assert_eq!(field.explicit_offset(), Some(0));
        }
    }

    #[test]
    fn test_snapshot_contains_registered_types() {
        let registry = TypeRegistry::new().unwrap();
        let before = registry.len();
        let ty = TypeBuilder::value_type(&registry, "Test", "Extra")
            .build()
            .unwrap();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), before + 1);
        assert!(snapshot.iter().any(|t| t.token == ty.token));
    }
}
