//! Target machine description consumed by layout computation.

use crate::metadata::typesystem::PointerSize;

/// Properties of the machine layout is computed for.
///
/// Everything ABI-variable the engine needs lives here: the native word width, the
/// minimum alignment any type is granted, and the leaf budget for homogeneous float
/// aggregate classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetProperties {
    /// Width of pointers, native ints and object references
    pub pointer_size: PointerSize,
    /// Maximum number of float leaves a homogeneous float aggregate may carry
    pub max_hfa_elements: u32,
    /// Alignment granted to types with no alignment requirement of their own
    pub minimum_alignment: u32,
}

impl TargetProperties {
    /// A target with the conventional defaults (HFA budget 4, minimum alignment 1)
    #[must_use]
    pub fn new(pointer_size: PointerSize) -> Self {
        TargetProperties {
            pointer_size,
            max_hfa_elements: 4,
            minimum_alignment: 1,
        }
    }

    /// Width of a pointer in bytes
    #[must_use]
    pub fn pointer_bytes(&self) -> u32 {
        self.pointer_size.bytes()
    }
}

impl Default for TargetProperties {
    fn default() -> Self {
        TargetProperties::new(PointerSize::Bit64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let target = TargetProperties::default();
        assert_eq!(target.pointer_bytes(), 8);
        assert_eq!(target.max_hfa_elements, 4);
        assert_eq!(target.minimum_alignment, 1);
    }

    #[test]
    fn test_bit32_pointer_bytes() {
        assert_eq!(TargetProperties::new(PointerSize::Bit32).pointer_bytes(), 4);
    }
}
