//! Sequential box header scanner.

use super::atoms::{Atom, AtomType, HEADER_SIZE};
use crate::{Error, Result};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Lazily walks the box headers laid out back to back in `[start, end)`.
///
/// Each step seeks to the current position and reads one 8-byte header.
/// The sequence ends cleanly when fewer than 8 bytes remain; a header whose
/// size is below 8 or overruns the range yields a format error, after which
/// the scanner is exhausted.
pub struct BoxScanner<R> {
    reader: R,
    pos: u64,
    end: u64,
    done: bool,
}

impl<R: Read + Seek> BoxScanner<R> {
    /// Scan the sub-range `[start, end)` of `reader`.
    pub fn new(reader: R, start: u64, end: u64) -> Self {
        Self {
            reader,
            pos: start,
            end,
            done: start >= end,
        }
    }

    /// Offset of the next header to be read.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Advance until a box of `atom_type` is found, skipping every other box
    /// by its declared size. Returns `None` when the range is exhausted.
    pub fn seek_to(&mut self, atom_type: AtomType) -> Result<Option<Atom>> {
        for atom in self.by_ref() {
            let atom = atom?;
            if atom.atom_type == atom_type {
                return Ok(Some(atom));
            }
        }
        Ok(None)
    }

    fn read_header(&mut self) -> Result<Atom> {
        self.reader.seek(SeekFrom::Start(self.pos))?;

        let mut header = [0u8; 8];
        self.reader.read_exact(&mut header)?;

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let atom_type = AtomType::from_bytes([header[4], header[5], header[6], header[7]]);
        let remaining = self.end - self.pos;

        if size < HEADER_SIZE {
            return Err(Error::format(format!(
                "box '{}' at offset {} declares size {} (minimum is 8)",
                atom_type, self.pos, size
            )));
        }
        if size > remaining {
            return Err(Error::format(format!(
                "box '{}' at offset {} declares size {} but only {} bytes remain",
                atom_type, self.pos, size, remaining
            )));
        }

        Ok(Atom {
            atom_type,
            offset: self.pos,
            size,
        })
    }
}

impl<'a> BoxScanner<Cursor<&'a [u8]>> {
    /// Scan an in-memory buffer from its first byte to its last.
    pub fn over_slice(data: &'a [u8]) -> Self {
        let len = data.len() as u64;
        Self::new(Cursor::new(data), 0, len)
    }
}

impl<R: Read + Seek> Iterator for BoxScanner<R> {
    type Item = Result<Atom>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.end.saturating_sub(self.pos) < HEADER_SIZE {
            self.done = true;
            return None;
        }

        match self.read_header() {
            Ok(atom) => {
                self.pos = atom.end();
                Some(Ok(atom))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read + Seek> std::iter::FusedIterator for BoxScanner<R> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_box(buf: &mut Vec<u8>, kind: &[u8; 4], payload_len: usize) {
        buf.extend_from_slice(&((payload_len + 8) as u32).to_be_bytes());
        buf.extend_from_slice(kind);
        buf.extend(std::iter::repeat(0xAB).take(payload_len));
    }

    #[test]
    fn test_boxes_partition_range() {
        let mut data = Vec::new();
        push_box(&mut data, b"ftyp", 12);
        push_box(&mut data, b"moof", 0);
        push_box(&mut data, b"free", 3);
        push_box(&mut data, b"mdat", 100);

        let atoms: Vec<Atom> = BoxScanner::over_slice(&data)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(atoms.len(), 4);
        let mut expected_offset = 0;
        for atom in &atoms {
            assert_eq!(atom.offset, expected_offset);
            expected_offset = atom.end();
        }
        let total: u64 = atoms.iter().map(|a| a.size).sum();
        assert_eq!(total, data.len() as u64);
        assert_eq!(atoms[3].atom_type, AtomType::MDAT);
        assert_eq!(atoms[3].data_size(), 100);
    }

    #[test]
    fn test_trailing_bytes_end_sequence() {
        let mut data = Vec::new();
        push_box(&mut data, b"free", 4);
        data.extend_from_slice(&[0, 0, 0, 9, b'x', b'y', b'z']);

        let atoms: Vec<Atom> = BoxScanner::over_slice(&data)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(atoms.len(), 1);
    }

    #[test]
    fn test_size_below_header_is_format_error() {
        let mut data = vec![0, 0, 0, 4];
        data.extend_from_slice(b"moof");
        data.extend_from_slice(&[0u8; 8]);

        let mut scanner = BoxScanner::over_slice(&data);
        assert!(matches!(scanner.next(), Some(Err(Error::Format(_)))));
        assert!(scanner.next().is_none());
    }

    #[test]
    fn test_largesize_marker_is_format_error() {
        let mut data = vec![0, 0, 0, 1];
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&[0u8; 16]);

        let result: Result<Vec<Atom>> = BoxScanner::over_slice(&data).collect();
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_size_past_range_is_format_error() {
        let mut data = Vec::new();
        push_box(&mut data, b"moof", 8);
        data[3] = 200;

        let result: Result<Vec<Atom>> = BoxScanner::over_slice(&data).collect();
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_sub_range_and_early_stop() {
        let mut data = vec![0xEE; 5];
        push_box(&mut data, b"moof", 10);
        push_box(&mut data, b"free", 2);
        push_box(&mut data, b"mdat", 20);
        push_box(&mut data, b"moof", 10);
        let end = data.len() as u64;

        let mut scanner = BoxScanner::new(Cursor::new(&data[..]), 5, end);
        let mdat = scanner.seek_to(AtomType::MDAT).unwrap().unwrap();
        assert_eq!(mdat.offset, 5 + 18 + 10);
        assert_eq!(mdat.size, 28);
        assert_eq!(scanner.position(), mdat.end());
    }

    #[test]
    fn test_seek_to_missing_type() {
        let mut data = Vec::new();
        push_box(&mut data, b"moof", 4);
        let mut scanner = BoxScanner::over_slice(&data);
        assert!(scanner.seek_to(AtomType::MDAT).unwrap().is_none());
    }

    #[test]
    fn test_empty_range() {
        let data = [0u8; 0];
        assert!(BoxScanner::over_slice(&data).next().is_none());
    }
}
