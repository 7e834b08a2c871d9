use std::fmt;
use std::str::FromStr;

use crate::HashError;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// A 20-byte SHA-1 object identifier, the content address of an object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    /// The null OID (all zeros).
    pub const NULL: Self = Self([0u8; 20]);

    /// Create an ObjectId from raw digest bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        if bytes.len() != 20 {
            return Err(HashError::InvalidHashLength {
                expected: 20,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Create an ObjectId from a 40-character hex string.
    ///
    /// Upper and lower case digits are accepted; anything else fails with
    /// the position of the first bad character.
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        let digits = hex.as_bytes();
        if digits.len() != 40 {
            return Err(HashError::InvalidHexLength {
                expected: 40,
                actual: digits.len(),
            });
        }
        let mut bytes = [0u8; 20];
        for (index, byte) in bytes.iter_mut().enumerate() {
            let hi = nibble(digits[index * 2], index * 2)?;
            let lo = nibble(digits[index * 2 + 1], index * 2 + 1)?;
            *byte = hi << 4 | lo;
        }
        Ok(Self(bytes))
    }

    /// Get the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the null (all-zeros) OID.
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Get the hex string representation (lowercase).
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(40);
        for &byte in &self.0 {
            hex.push(HEX_DIGITS[usize::from(byte >> 4)] as char);
            hex.push(HEX_DIGITS[usize::from(byte & 0x0f)] as char);
        }
        hex
    }
}

/// Decode one hex digit, reporting `position` on failure.
fn nibble(digit: u8, position: usize) -> Result<u8, HashError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(HashError::InvalidHex {
            position,
            character: digit as char,
        }),
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 20]> for ObjectId {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}
