//! Hippo-Media: fragment-index resolution for fragmented MP4 files
//!
//! This crate answers one question for the hippo segment server: given a
//! fragmented MP4 (ISO-BMFF) file, a track ID and a time, which bytes of the
//! file make up that movie fragment? The answer is read from the file's
//! trailing random-access index without re-multiplexing anything.
//!
//! # Modules
//!
//! - `mp4` - Box type codes, box headers and a sequential box scanner
//! - `fragment` - `mfro`/`mfra`/`tfra` parsing and byte-range resolution
//! - `fixture` - Synthetic fragmented files for tests (feature `fixtures`)
//!
//! # Example
//!
//! ```no_run
//! let range = hippo_media::resolve("stream/video.mp4", 1, 90_000)?;
//! println!("serve bytes {}", range);
//! # Ok::<(), hippo_media::Error>(())
//! ```

pub mod error;
#[cfg(feature = "fixtures")]
pub mod fixture;
pub mod fragment;
pub mod mp4;

pub use error::{Error, ErrorKind, Result};
pub use fragment::{
    resolve, resolve_with, EndStrategy, FragmentByteRange, FragmentEntry, FragmentIndex,
    RangeEnd, TfraTrackIndex,
};
pub use mp4::{Atom, AtomType, BoxScanner};
