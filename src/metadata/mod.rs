//! Type system surface and layout computation.
//!
//! # Key Components
//!
//! - [`token`] - metadata tokens identifying types and fields
//! - [`typesystem`] - the layout subjects ([`typesystem::CilType`], [`typesystem::Field`])
//!   and the [`typesystem::TypeRegistry`] that owns them
//! - [`layout`] - the layout engine, its per-category algorithm strategies, the
//!   immutable result value types, and the per-type memoization cells

pub mod layout;
pub mod token;
pub mod typesystem;
