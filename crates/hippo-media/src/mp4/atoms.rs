//! ISO-BMFF box type codes and parsed box headers.

/// Four-character box type code, compared as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomType(pub [u8; 4]);

impl AtomType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOF: Self = Self(*b"moof");
    pub const MFHD: Self = Self(*b"mfhd");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MFRA: Self = Self(*b"mfra");
    pub const TFRA: Self = Self(*b"tfra");
    pub const MFRO: Self = Self(*b"mfro");
    pub const FREE: Self = Self(*b"free");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Size of a compact box header (32-bit size + type).
pub const HEADER_SIZE: u64 = 8;

/// Parsed box header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atom {
    /// Box type code.
    pub atom_type: AtomType,
    /// Absolute offset of the first header byte.
    pub offset: u64,
    /// Box size including header.
    pub size: u64,
}

impl Atom {
    /// Offset of the payload (after the header).
    pub fn data_offset(&self) -> u64 {
        self.offset + HEADER_SIZE
    }

    /// Payload size (size - header).
    pub fn data_size(&self) -> u64 {
        self.size.saturating_sub(HEADER_SIZE)
    }

    /// Offset one past the last byte of this box.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Offset of the last byte of this box.
    pub fn last_byte(&self) -> u64 {
        self.end() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_type_display() {
        assert_eq!(AtomType::MDAT.to_string(), "mdat");
        assert_eq!(AtomType::from_bytes([0xff, 0, 0, 1]).as_str(), "????");
    }

    #[test]
    fn test_atom_geometry() {
        let atom = Atom {
            atom_type: AtomType::MDAT,
            offset: 240,
            size: 500,
        };
        assert_eq!(atom.data_offset(), 248);
        assert_eq!(atom.data_size(), 492);
        assert_eq!(atom.end(), 740);
        assert_eq!(atom.last_byte(), 739);
    }
}
