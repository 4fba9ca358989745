//! Synthetic fragmented MP4 files for tests.
//!
//! The builder lays out `ftyp`, then `moof`+`mdat` pairs in call order, then
//! an `mfra` trailer whose `tfra` boxes index every fragment. Sample data is
//! filler; only the box structure is meaningful.

use bytes::{BufMut, BytesMut};
use std::io;
use std::path::Path;

/// Where one indexed fragment landed in the built file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentLayout {
    pub track_id: u32,
    pub time: u64,
    /// Offset of the `moof` header.
    pub start: u64,
    /// Last byte of the following `mdat`, if one was written.
    pub end: Option<u64>,
}

/// A built file and its layout.
#[derive(Debug, Clone)]
pub struct FragmentedFile {
    pub data: Vec<u8>,
    pub fragments: Vec<FragmentLayout>,
    pub mfra_offset: u64,
}

impl FragmentedFile {
    /// File size in bytes.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Whether the file is empty (never true for a built file).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Layout of the fragment indexed at `(track_id, time)`.
    pub fn fragment(&self, track_id: u32, time: u64) -> Option<&FragmentLayout> {
        self.fragments
            .iter()
            .find(|f| f.track_id == track_id && f.time == time)
    }

    /// Write the file to disk.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        std::fs::write(path, &self.data)
    }
}

/// Builder for synthetic fragmented files.
pub struct FragmentedFileBuilder {
    buf: BytesMut,
    sequence: u32,
    tfra_version: u8,
    length_sizes: u8,
    tracks: Vec<(u32, Vec<(u64, u64)>)>,
    fragments: Vec<FragmentLayout>,
    mfra_children: Vec<([u8; 4], usize)>,
}

impl FragmentedFileBuilder {
    /// Create a builder; the file starts with an `ftyp` box.
    pub fn new() -> Self {
        let mut buf = BytesMut::with_capacity(4096);
        let brands = [b"iso6", b"dash", b"msdh"];
        buf.put_u32((16 + brands.len() * 4) as u32);
        buf.put_slice(b"ftyp");
        buf.put_slice(b"iso6"); // major brand
        buf.put_u32(0); // minor version
        for brand in &brands {
            buf.put_slice(*brand);
        }

        Self {
            buf,
            sequence: 0,
            tfra_version: 0,
            length_sizes: 0,
            tracks: Vec::new(),
            fragments: Vec::new(),
            mfra_children: Vec::new(),
        }
    }

    /// Write `tfra` boxes as version 0 (32-bit) or 1 (64-bit).
    pub fn tfra_version(mut self, version: u8) -> Self {
        self.tfra_version = version;
        self
    }

    /// Byte widths (1..=4) of traf_number, trun_number and sample_number.
    pub fn length_sizes(mut self, traf: u8, trun: u8, sample: u8) -> Self {
        assert!((1..=4).contains(&traf) && (1..=4).contains(&trun) && (1..=4).contains(&sample));
        self.length_sizes = ((traf - 1) << 4) | ((trun - 1) << 2) | (sample - 1);
        self
    }

    /// Append a `free` box of `size` bytes (header included).
    pub fn free(mut self, size: u32) -> Self {
        assert!(size >= 8);
        self.buf.put_u32(size);
        self.buf.put_slice(b"free");
        self.buf.put_bytes(0, size as usize - 8);
        self
    }

    /// Append an indexed fragment: a minimal `moof` and an `mdat` carrying
    /// `payload_len` bytes.
    pub fn fragment(self, track_id: u32, time: u64, payload_len: u32) -> Self {
        self.fragment_sized(track_id, time, 24, payload_len + 8)
    }

    /// Append an indexed fragment with exact `moof` and `mdat` box sizes.
    pub fn fragment_sized(mut self, track_id: u32, time: u64, moof_size: u32, mdat_size: u32) -> Self {
        let start = self.write_moof(moof_size);
        assert!(mdat_size >= 8);
        self.buf.put_u32(mdat_size);
        self.buf.put_slice(b"mdat");
        self.buf.put_bytes(0x5A, mdat_size as usize - 8);
        let end = self.buf.len() as u64 - 1;

        self.record(track_id, time, start, Some(end))
    }

    /// Append an indexed `moof` that no `mdat` follows.
    pub fn moof_only(mut self, track_id: u32, time: u64) -> Self {
        let start = self.write_moof(24);
        self.record(track_id, time, start, None)
    }

    /// Add a `tfra` entry pointing anywhere, without writing a fragment.
    pub fn index_entry(mut self, track_id: u32, time: u64, moof_offset: u64) -> Self {
        self.track_entries(track_id).push((time, moof_offset));
        self
    }

    /// Add a non-`tfra` child of `payload_len` bytes to the `mfra` box.
    pub fn mfra_child(mut self, kind: [u8; 4], payload_len: usize) -> Self {
        self.mfra_children.push((kind, payload_len));
        self
    }

    /// Write the `mfra` trailer and return the finished file.
    pub fn build(mut self) -> FragmentedFile {
        let mfra_start = self.buf.len();
        self.buf.put_u32(0); // placeholder size
        self.buf.put_slice(b"mfra");

        for (kind, payload_len) in std::mem::take(&mut self.mfra_children) {
            self.buf.put_u32((payload_len + 8) as u32);
            self.buf.put_slice(&kind);
            self.buf.put_bytes(0, payload_len);
        }

        for (track_id, entries) in std::mem::take(&mut self.tracks) {
            self.write_tfra(track_id, &entries);
        }

        let mfra_size = (self.buf.len() - mfra_start + 16) as u32;
        self.buf.put_u32(16);
        self.buf.put_slice(b"mfro");
        self.buf.put_u32(0); // version + flags
        self.buf.put_u32(mfra_size);

        self.buf[mfra_start..mfra_start + 4].copy_from_slice(&mfra_size.to_be_bytes());

        FragmentedFile {
            data: self.buf.to_vec(),
            fragments: self.fragments,
            mfra_offset: mfra_start as u64,
        }
    }

    fn write_moof(&mut self, moof_size: u32) -> u64 {
        let start = self.buf.len() as u64;
        let padding = moof_size as usize - 24;
        assert!(padding == 0 || padding >= 8);

        self.sequence += 1;
        self.buf.put_u32(moof_size);
        self.buf.put_slice(b"moof");

        // mfhd
        self.buf.put_u32(16);
        self.buf.put_slice(b"mfhd");
        self.buf.put_u32(0); // version + flags
        self.buf.put_u32(self.sequence);

        if padding > 0 {
            self.buf.put_u32(padding as u32);
            self.buf.put_slice(b"free");
            self.buf.put_bytes(0, padding - 8);
        }

        start
    }

    fn write_tfra(&mut self, track_id: u32, entries: &[(u64, u64)]) {
        let traf = ((self.length_sizes >> 4) & 3) as usize + 1;
        let trun = ((self.length_sizes >> 2) & 3) as usize + 1;
        let sample = (self.length_sizes & 3) as usize + 1;
        let field_size = if self.tfra_version == 1 { 16 } else { 8 };
        let size = 8 + 16 + entries.len() * (field_size + traf + trun + sample);

        self.buf.put_u32(size as u32);
        self.buf.put_slice(b"tfra");
        self.buf.put_u8(self.tfra_version);
        self.buf.put_bytes(0, 3); // flags
        self.buf.put_u32(track_id);
        self.buf.put_u32(self.length_sizes as u32);
        self.buf.put_u32(entries.len() as u32);

        for &(time, moof_offset) in entries {
            if self.tfra_version == 1 {
                self.buf.put_u64(time);
                self.buf.put_u64(moof_offset);
            } else {
                self.buf.put_u32(time as u32);
                self.buf.put_u32(moof_offset as u32);
            }
            self.buf.put_uint(1, traf);
            self.buf.put_uint(1, trun);
            self.buf.put_uint(1, sample);
        }
    }

    fn track_entries(&mut self, track_id: u32) -> &mut Vec<(u64, u64)> {
        let pos = match self.tracks.iter().position(|(id, _)| *id == track_id) {
            Some(pos) => pos,
            None => {
                self.tracks.push((track_id, Vec::new()));
                self.tracks.len() - 1
            }
        };
        &mut self.tracks[pos].1
    }

    fn record(mut self, track_id: u32, time: u64, start: u64, end: Option<u64>) -> Self {
        self.track_entries(track_id).push((time, start));
        self.fragments.push(FragmentLayout {
            track_id,
            time,
            start,
            end,
        });
        self
    }
}

impl Default for FragmentedFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
