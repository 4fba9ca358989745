//! Locating the `mfra` box through the fixed-size `mfro` trailer.

use crate::mp4::{AtomType, HEADER_SIZE};
use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

/// Size of the `mfro` box that must close a fragmented file.
pub const MFRO_SIZE: u64 = 16;

/// Maximum `mfra` size read into memory (64 MB) to prevent OOM on malformed files.
pub const MAX_MFRA_SIZE: u64 = 64 * 1024 * 1024;

/// Validated position of the `mfra` box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MfraLocation {
    /// Absolute offset of the `mfra` header.
    pub offset: u64,
    /// Size of the `mfra` box including its header.
    pub size: u64,
}

impl MfraLocation {
    /// Offset of the first child box.
    pub fn data_offset(&self) -> u64 {
        self.offset + HEADER_SIZE
    }

    /// Number of payload bytes holding child boxes.
    pub fn data_size(&self) -> u64 {
        self.size - HEADER_SIZE
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Find and validate the `mfro`/`mfra` pair at the end of a file.
///
/// A file too short to hold a trailer, or whose last 16 bytes are not an
/// `mfro` box, yields [`Error::IndexUnavailable`]. Every other inconsistency
/// (wrong `mfro` size, `mfra` size past the start of the file, missing or
/// mis-sized `mfra` header) is an [`Error::Format`].
pub fn locate_index<R: Read + Seek>(reader: &mut R, file_size: u64) -> Result<MfraLocation> {
    if file_size < MFRO_SIZE {
        return Err(Error::index_unavailable(format!(
            "file is {} bytes, too small for an mfro trailer",
            file_size
        )));
    }

    let mut mfro = [0u8; MFRO_SIZE as usize];
    reader.seek(SeekFrom::Start(file_size - MFRO_SIZE))?;
    reader.read_exact(&mut mfro)?;

    let mfro_type = AtomType::from_bytes([mfro[4], mfro[5], mfro[6], mfro[7]]);
    if mfro_type != AtomType::MFRO {
        return Err(Error::index_unavailable(format!(
            "last box is not mfro (found '{}')",
            mfro_type
        )));
    }

    let mfro_size = be_u32(&mfro[0..4]) as u64;
    if mfro_size != MFRO_SIZE {
        return Err(Error::format(format!(
            "mfro box size is {}, expected 16",
            mfro_size
        )));
    }

    // bytes 8..12 are version and flags
    let mfra_size = be_u32(&mfro[12..16]) as u64;
    if mfra_size > file_size {
        return Err(Error::format(format!(
            "mfra size {} exceeds file size {}",
            mfra_size, file_size
        )));
    }
    if mfra_size < HEADER_SIZE {
        return Err(Error::format(format!(
            "mfra size {} is smaller than a box header",
            mfra_size
        )));
    }

    let offset = file_size - mfra_size;
    let mut header = [0u8; HEADER_SIZE as usize];
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(&mut header)?;

    let mfra_type = AtomType::from_bytes([header[4], header[5], header[6], header[7]]);
    if mfra_type != AtomType::MFRA {
        return Err(Error::format(format!(
            "box at offset {} is '{}', expected mfra",
            offset, mfra_type
        )));
    }

    let box_size = be_u32(&header[0..4]) as u64;
    if box_size < HEADER_SIZE || box_size > file_size {
        return Err(Error::format(format!("invalid mfra box size {}", box_size)));
    }
    if box_size != mfra_size {
        return Err(Error::format(format!(
            "mfra box declares {} bytes but mfro points {} bytes from the end",
            box_size, mfra_size
        )));
    }
    if box_size > MAX_MFRA_SIZE {
        return Err(Error::format(format!(
            "mfra size {} exceeds maximum {}",
            box_size, MAX_MFRA_SIZE
        )));
    }

    tracing::trace!(offset, size = box_size, "located mfra");

    Ok(MfraLocation {
        offset,
        size: box_size,
    })
}

/// Read the child boxes of a located `mfra` into memory.
pub fn read_mfra_payload<R: Read + Seek>(reader: &mut R, mfra: &MfraLocation) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(mfra.data_offset()))?;
    let mut data = vec![0u8; mfra.data_size() as usize];
    reader.read_exact(&mut data)?;
    Ok(data)
}
