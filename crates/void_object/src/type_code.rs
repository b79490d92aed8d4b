//! Four-character class codes
//!
//! A [`TypeCode`] is the compact alternative to a class name: four ASCII
//! bytes packed big-endian into a `u32`, so `TypeCode::from_bytes(b"DER1")`
//! has the same value as the C multi-character literal `'DER1'`.

use core::fmt;
use core::str::FromStr;

use crate::error::ClassError;

/// A 4-byte packed class identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TypeCode(u32);

impl TypeCode {
    /// Pack four bytes, first byte in the most significant position
    #[inline]
    pub const fn from_bytes(bytes: &[u8; 4]) -> Self {
        Self(u32::from_be_bytes(*bytes))
    }

    /// Wrap an already packed value
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the packed value
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Unpack into the four original bytes
    #[inline]
    pub const fn to_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl FromStr for TypeCode {
    type Err = ClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| ClassError::InvalidTypeCode(s.into()))?;
        if !bytes.iter().all(u8::is_ascii) {
            return Err(ClassError::InvalidTypeCode(s.into()));
        }
        Ok(Self::from_bytes(&bytes))
    }
}

impl From<u32> for TypeCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<TypeCode> for u32 {
    fn from(code: TypeCode) -> Self {
        code.0
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeCode('{}')", self)
    }
}
