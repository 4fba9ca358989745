//! Fragment random-access index.
//!
//! A fragmented file that carries an `mfra` trailer can be seeked by time
//! without scanning every `moof`:
//!
//! 1. [`locate_index`] reads the 16-byte `mfro` box at end of file and
//!    validates the `mfra` box it points to.
//! 2. [`build_table`] decodes each `tfra` child into a per-track table of
//!    `(time, moof_offset)` entries.
//! 3. [`FragmentIndex::locate`] finds the exact-time entry and delimits the
//!    fragment according to an [`EndStrategy`].
//!
//! Reads are strictly sequential: each read's offset comes from the result
//! of the one before it.

mod resolver;
mod tail;
mod tfra;

pub use resolver::{
    resolve, resolve_with, EndStrategy, FragmentByteRange, FragmentIndex, RangeEnd,
};
pub use tail::{locate_index, read_mfra_payload, MfraLocation, MAX_MFRA_SIZE, MFRO_SIZE};
pub use tfra::{build_table, decode_tfra, FragmentEntry, TfraTrackIndex};
