//! Platform-width-aware layout magnitudes.
//!
//! A [`LayoutWidth`] is either a known byte count or explicitly *indeterminate* -
//! the state of a size that cannot be resolved yet, typically because the type flows
//! through unresolved generic sharing. Indeterminacy is a tagged state rather than a
//! sentinel value so arithmetic propagates it and it can never be misread as a
//! concrete zero.

use std::fmt;

use crate::{metadata::token::Token, Result};

/// A layout magnitude in bytes, supporting an explicit indeterminate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutWidth {
    /// A concrete byte count
    Known(u32),
    /// Not resolvable to a concrete number in the current context
    Indeterminate,
}

impl LayoutWidth {
    /// True if this magnitude has no concrete value
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, LayoutWidth::Indeterminate)
    }

    /// Add another magnitude. Indeterminacy propagates; widths that would exceed
    /// `u32::MAX` are not representable and become indeterminate as well.
    #[must_use]
    pub fn add(self, rhs: LayoutWidth) -> LayoutWidth {
        match (self, rhs) {
            (LayoutWidth::Known(a), LayoutWidth::Known(b)) => match a.checked_add(b) {
                Some(sum) => LayoutWidth::Known(sum),
                None => LayoutWidth::Indeterminate,
            },
            _ => LayoutWidth::Indeterminate,
        }
    }

    /// Add a concrete byte count
    #[must_use]
    pub fn add_bytes(self, bytes: u32) -> LayoutWidth {
        self.add(LayoutWidth::Known(bytes))
    }

    /// Round up to the next multiple of `alignment` (which must be a power of
    /// two). Values whose aligned form would exceed `u32::MAX` are not
    /// representable and become indeterminate.
    #[must_use]
    pub fn align_up(self, alignment: u32) -> LayoutWidth {
        debug_assert!(alignment.is_power_of_two());
        match self {
            LayoutWidth::Known(value) => match value.checked_add(alignment - 1) {
                Some(padded) => LayoutWidth::Known(padded & !(alignment - 1)),
                None => LayoutWidth::Indeterminate,
            },
            LayoutWidth::Indeterminate => LayoutWidth::Indeterminate,
        }
    }

    /// The larger of two magnitudes. Indeterminacy propagates.
    #[must_use]
    pub fn max_width(self, rhs: LayoutWidth) -> LayoutWidth {
        match (self, rhs) {
            (LayoutWidth::Known(a), LayoutWidth::Known(b)) => LayoutWidth::Known(a.max(b)),
            _ => LayoutWidth::Indeterminate,
        }
    }

    /// The concrete value, if known
    #[must_use]
    pub fn known(self) -> Option<u32> {
        match self {
            LayoutWidth::Known(value) => Some(value),
            LayoutWidth::Indeterminate => None,
        }
    }

    /// The concrete value, faulting if the magnitude is indeterminate.
    ///
    /// This is the single conversion point where an indeterminate magnitude reaching
    /// a context that requires a concrete number turns into a reported fault.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndeterminateSize`] carrying `token`, the type whose
    /// layout demanded the concrete value.
    pub fn require_known(self, token: Token) -> Result<u32> {
        self.known().ok_or(crate::Error::IndeterminateSize(token))
    }
}

impl fmt::Display for LayoutWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutWidth::Known(value) => write!(f, "{value}"),
            LayoutWidth::Indeterminate => write!(f, "<indeterminate>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_known() {
        assert_eq!(
            LayoutWidth::Known(4).add(LayoutWidth::Known(8)),
            LayoutWidth::Known(12)
        );
    }

    #[test]
    fn test_indeterminacy_propagates() {
        assert!(LayoutWidth::Indeterminate.add_bytes(4).is_indeterminate());
        assert!(LayoutWidth::Known(4)
            .add(LayoutWidth::Indeterminate)
            .is_indeterminate());
        assert!(LayoutWidth::Indeterminate.align_up(8).is_indeterminate());
        assert!(LayoutWidth::Indeterminate
            .max_width(LayoutWidth::Known(100))
            .is_indeterminate());
    }

    #[test]
    fn test_align_up() {
        assert_eq!(LayoutWidth::Known(5).align_up(4), LayoutWidth::Known(8));
        assert_eq!(LayoutWidth::Known(8).align_up(4), LayoutWidth::Known(8));
        assert_eq!(LayoutWidth::Known(0).align_up(16), LayoutWidth::Known(0));
        assert_eq!(LayoutWidth::Known(1).align_up(1), LayoutWidth::Known(1));
    }

    #[test]
    fn test_max_width() {
        assert_eq!(
            LayoutWidth::Known(4).max_width(LayoutWidth::Known(16)),
            LayoutWidth::Known(16)
        );
    }

    #[test]
    fn test_overflow_becomes_indeterminate() {
        assert!(LayoutWidth::Known(u32::MAX).add_bytes(1).is_indeterminate());
    }

    #[test]
    fn test_align_up_near_max_becomes_indeterminate() {
        assert!(LayoutWidth::Known(u32::MAX - 1).align_up(8).is_indeterminate());
        assert!(LayoutWidth::Known(u32::MAX).align_up(2).is_indeterminate());
        assert_eq!(
            LayoutWidth::Known(u32::MAX - 7).align_up(8),
            LayoutWidth::Known(u32::MAX - 7)
        );
    }

    #[test]
    fn test_require_known() {
        use crate::metadata::token::Token;
        assert_eq!(
            LayoutWidth::Known(8).require_known(Token::typedef(1)).unwrap(),
            8
        );
        assert!(matches!(
            LayoutWidth::Indeterminate.require_known(Token::typedef(1)),
            Err(crate::Error::IndeterminateSize(_))
        ));
    }
}
