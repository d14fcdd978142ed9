//! Metadata tokens identifying type system entries.
//!
//! Tokens follow the ECMA-335 encoding: a table identifier in the high byte and a
//! 24-bit row index in the low bits. The layout engine only ever mints tokens for
//! the two tables it reasons about - type definitions and fields - but accepts any
//! token value handed to it by the embedding type system.

use std::fmt;

/// Table identifier for type definition tokens (`0x02`)
pub const TABLE_TYPEDEF: u8 = 0x02;
/// Table identifier for field tokens (`0x04`)
pub const TABLE_FIELD: u8 = 0x04;

/// A metadata token representing a reference to a metadata table entry.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a type definition token from a row index
    #[must_use]
    pub fn typedef(row: u32) -> Self {
        Token((u32::from(TABLE_TYPEDEF) << 24) | (row & 0x00FF_FFFF))
    }

    /// Creates a field token from a row index
    #[must_use]
    pub fn field(row: u32) -> Self {
        Token((u32::from(TABLE_FIELD) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_table_and_row() {
        let token = Token::new(0x0200_0042);
        assert_eq!(token.table(), TABLE_TYPEDEF);
        assert_eq!(token.row(), 0x42);
        assert_eq!(token.value(), 0x0200_0042);
    }

    #[test]
    fn test_token_constructors() {
        assert_eq!(Token::typedef(1), Token::new(0x0200_0001));
        assert_eq!(Token::field(7), Token::new(0x0400_0007));
        assert_eq!(Token::field(7).table(), TABLE_FIELD);
    }

    #[test]
    fn test_null_token() {
        assert!(Token::new(0).is_null());
        assert!(!Token::typedef(1).is_null());
    }

    #[test]
    fn test_token_display() {
        assert_eq!(format!("{}", Token::new(0x0200_0001)), "0x02000001");
    }
}
