//! Decoding of `tfra` (track fragment random access) boxes.

use crate::mp4::{AtomType, BoxScanner};
use crate::{Error, Result};

/// Bytes preceding the first entry: version/flags, track_ID, the packed
/// length sizes and entry count.
const TFRA_HEADER_SIZE: usize = 16;

/// One random-access point: a time and the `moof` that starts there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentEntry {
    /// Presentation time in track timescale units.
    pub time: u64,
    /// Absolute file offset of the fragment's `moof` box.
    pub moof_offset: u64,
}

/// All random-access entries for one track, in box order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TfraTrackIndex {
    pub track_id: u32,
    /// Box version; 1 means 64-bit time and offset fields.
    pub version: u8,
    pub entries: Vec<FragmentEntry>,
}

impl TfraTrackIndex {
    /// First entry with exactly this time.
    pub fn entry_at(&self, time: u64) -> Option<&FragmentEntry> {
        self.entries.iter().find(|e| e.time == time)
    }
}

/// Auxiliary field widths packed into the low 6 bits of byte 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LengthSizes {
    traf_num: usize,
    trun_num: usize,
    sample_num: usize,
}

impl LengthSizes {
    fn from_byte(b: u8) -> Self {
        Self {
            traf_num: ((b >> 4) & 3) as usize + 1,
            trun_num: ((b >> 2) & 3) as usize + 1,
            sample_num: (b & 3) as usize + 1,
        }
    }

    fn total(&self) -> usize {
        self.traf_num + self.trun_num + self.sample_num
    }
}

fn be_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn be_u64(data: &[u8], pos: usize) -> u64 {
    u64::from_be_bytes([
        data[pos],
        data[pos + 1],
        data[pos + 2],
        data[pos + 3],
        data[pos + 4],
        data[pos + 5],
        data[pos + 6],
        data[pos + 7],
    ])
}

/// Walk the children of an `mfra` payload and decode every `tfra` box.
///
/// Other child types (`mfro`, vendor boxes) are skipped. A single malformed
/// `tfra` fails the whole table.
pub fn build_table(mfra_payload: &[u8]) -> Result<Vec<TfraTrackIndex>> {
    let mut tracks = Vec::new();

    for atom in BoxScanner::over_slice(mfra_payload) {
        let atom = atom?;
        if atom.atom_type != AtomType::TFRA {
            tracing::trace!(atom_type = %atom.atom_type, "skipping mfra child");
            continue;
        }

        let payload = &mfra_payload[atom.data_offset() as usize..atom.end() as usize];
        tracks.push(decode_tfra(payload)?);
    }

    Ok(tracks)
}

/// Decode the payload (everything after the 8-byte header) of one `tfra` box.
pub fn decode_tfra(payload: &[u8]) -> Result<TfraTrackIndex> {
    if payload.len() < TFRA_HEADER_SIZE {
        return Err(Error::format(format!(
            "tfra payload is {} bytes, need at least {}",
            payload.len(),
            TFRA_HEADER_SIZE
        )));
    }

    let version = payload[0];
    if version > 1 {
        return Err(Error::format(format!("unsupported tfra version {}", version)));
    }

    let track_id = be_u32(payload, 4);
    let lengths = LengthSizes::from_byte(payload[11]);
    let entry_count = be_u32(payload, 12) as u64;

    let field_size = if version == 1 { 16 } else { 8 };
    let stride = field_size + lengths.total();

    let available = (payload.len() - TFRA_HEADER_SIZE) as u64;
    let needed = entry_count * stride as u64;
    if needed > available {
        return Err(Error::format(format!(
            "tfra for track {} declares {} entries ({} bytes) but only {} bytes follow",
            track_id, entry_count, needed, available
        )));
    }

    let mut entries = Vec::with_capacity(entry_count as usize);
    let mut pos = TFRA_HEADER_SIZE;
    for _ in 0..entry_count {
        let entry = if version == 1 {
            FragmentEntry {
                time: be_u64(payload, pos),
                moof_offset: be_u64(payload, pos + 8),
            }
        } else {
            FragmentEntry {
                time: be_u32(payload, pos) as u64,
                moof_offset: be_u32(payload, pos + 4) as u64,
            }
        };
        entries.push(entry);
        // traf_number, trun_number and sample_number are not needed for lookup
        pos += stride;
    }

    Ok(TfraTrackIndex {
        track_id,
        version,
        entries,
    })
}
