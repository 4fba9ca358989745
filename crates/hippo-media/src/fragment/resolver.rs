//! Resolving `(track_id, time)` to the byte range of one movie fragment.

use super::tail::{locate_index, read_mfra_payload, MfraLocation};
use super::tfra::{build_table, FragmentEntry, TfraTrackIndex};
use crate::mp4::{AtomType, BoxScanner, HEADER_SIZE};
use crate::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

/// How the end of a fragment is determined.
///
/// The two strategies disagree whenever fragments are not laid out back to
/// back in time order, so one must be chosen per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialize",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum EndStrategy {
    /// Walk boxes from the `moof` and stop at the end of the first `mdat`.
    #[default]
    ScanToMdat,
    /// Fast path: end one byte before the next entry's `moof` (by time), or
    /// at end of file for the last entry. Assumes contiguous fragments.
    NextEntryBoundary,
}

/// Last byte of a resolved range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum RangeEnd {
    Inclusive(u64),
    EndOfFile,
}

/// Bytes to transmit for one resolved request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentByteRange {
    /// First byte, inclusive.
    pub start: u64,
    pub end: RangeEnd,
}

impl FragmentByteRange {
    /// Range ending at an explicit byte.
    pub fn inclusive(start: u64, end: u64) -> Self {
        Self {
            start,
            end: RangeEnd::Inclusive(end),
        }
    }

    /// Last byte of the range for a file of `file_size` bytes.
    pub fn end_inclusive(&self, file_size: u64) -> u64 {
        match self.end {
            RangeEnd::Inclusive(end) => end,
            RangeEnd::EndOfFile => file_size.saturating_sub(1),
        }
    }

    /// Number of bytes covered for a file of `file_size` bytes.
    pub fn len(&self, file_size: u64) -> u64 {
        (self.end_inclusive(file_size) + 1).saturating_sub(self.start)
    }
}

impl std::fmt::Display for FragmentByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            RangeEnd::Inclusive(end) => write!(f, "{}-{}", self.start, end),
            RangeEnd::EndOfFile => write!(f, "{}-", self.start),
        }
    }
}

/// Parsed random-access index of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentIndex {
    /// Size of the file the index was read from.
    pub file_size: u64,
    pub mfra: MfraLocation,
    /// Per-track tables in `mfra` order.
    pub tracks: Vec<TfraTrackIndex>,
}

impl FragmentIndex {
    /// Open a file and read its index.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Self::read_from(&mut file, file_size)
    }

    /// Read the index from a reader holding `file_size` bytes.
    pub fn read_from<R: Read + Seek>(reader: &mut R, file_size: u64) -> Result<Self> {
        let mfra = locate_index(reader, file_size)?;
        let payload = read_mfra_payload(reader, &mfra)?;
        let tracks = build_table(&payload)?;

        tracing::debug!(
            mfra_offset = mfra.offset,
            mfra_size = mfra.size,
            tracks = tracks.len(),
            "read fragment index"
        );

        Ok(Self {
            file_size,
            mfra,
            tracks,
        })
    }

    /// First table for `track_id` in document order.
    pub fn track(&self, track_id: u32) -> Option<&TfraTrackIndex> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }

    /// Entry whose time equals `time` exactly.
    pub fn find_entry(&self, track_id: u32, time: u64) -> Result<&FragmentEntry> {
        let track = self
            .track(track_id)
            .ok_or(Error::TrackNotFound { track_id })?;
        track
            .entry_at(time)
            .ok_or(Error::TimeNotFound { track_id, time })
    }

    /// Compute the byte range for `(track_id, time)`.
    ///
    /// `reader` must be the file the index was read from; it is only touched
    /// by [`EndStrategy::ScanToMdat`].
    pub fn locate<R: Read + Seek>(
        &self,
        reader: &mut R,
        track_id: u32,
        time: u64,
        strategy: EndStrategy,
    ) -> Result<FragmentByteRange> {
        let range = match strategy {
            EndStrategy::ScanToMdat => {
                let entry = self.find_entry(track_id, time)?;
                scan_to_mdat(reader, entry.moof_offset, self.file_size)?
            }
            EndStrategy::NextEntryBoundary => self.next_entry_boundary(track_id, time)?,
        };

        tracing::debug!(track_id, time, ?strategy, range = %range, "resolved fragment");
        Ok(range)
    }

    /// Range bounded by the next entry of the same track, ordered by time.
    pub fn next_entry_boundary(&self, track_id: u32, time: u64) -> Result<FragmentByteRange> {
        let track = self
            .track(track_id)
            .ok_or(Error::TrackNotFound { track_id })?;

        let mut sorted = track.entries.clone();
        sorted.sort_by_key(|e| e.time);

        let pos = sorted
            .iter()
            .position(|e| e.time == time)
            .ok_or(Error::TimeNotFound { track_id, time })?;
        let entry = sorted[pos];
        check_moof_offset(entry.moof_offset, self.file_size)?;

        match sorted.get(pos + 1) {
            Some(next) if next.moof_offset > entry.moof_offset => {
                check_moof_offset(next.moof_offset, self.file_size)?;
                Ok(FragmentByteRange::inclusive(entry.moof_offset, next.moof_offset - 1))
            }
            Some(next) => Err(Error::format(format!(
                "fragment at {} is followed in time by a moof at {}, not laid out contiguously",
                entry.moof_offset, next.moof_offset
            ))),
            None => Ok(FragmentByteRange {
                start: entry.moof_offset,
                end: RangeEnd::EndOfFile,
            }),
        }
    }
}

fn check_moof_offset(moof_offset: u64, file_size: u64) -> Result<()> {
    match moof_offset.checked_add(HEADER_SIZE) {
        Some(end) if end <= file_size => Ok(()),
        _ => Err(Error::format(format!(
            "moof offset {} is outside a file of {} bytes",
            moof_offset, file_size
        ))),
    }
}

/// Walk top-level boxes from `moof_offset` until an `mdat` is found; the
/// fragment ends with that box.
fn scan_to_mdat<R: Read + Seek>(
    reader: &mut R,
    moof_offset: u64,
    file_size: u64,
) -> Result<FragmentByteRange> {
    check_moof_offset(moof_offset, file_size)?;

    let mut scanner = BoxScanner::new(&mut *reader, moof_offset, file_size);
    match scanner.seek_to(AtomType::MDAT)? {
        Some(mdat) => Ok(FragmentByteRange::inclusive(moof_offset, mdat.last_byte())),
        None => Err(Error::format(format!(
            "no mdat box follows the moof at offset {}",
            moof_offset
        ))),
    }
}

/// Resolve `(track_id, time)` in the file at `path` using
/// [`EndStrategy::ScanToMdat`].
///
/// Opens the file once; the handle is closed before returning on every path.
pub fn resolve<P: AsRef<Path>>(path: P, track_id: u32, time: u64) -> Result<FragmentByteRange> {
    resolve_with(path, track_id, time, EndStrategy::ScanToMdat)
}

/// Resolve `(track_id, time)` with an explicit end strategy.
pub fn resolve_with<P: AsRef<Path>>(
    path: P,
    track_id: u32,
    time: u64,
    strategy: EndStrategy,
) -> Result<FragmentByteRange> {
    let mut file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let index = FragmentIndex::read_from(&mut file, file_size)?;
    index.locate(&mut file, track_id, time, strategy)
}
