//! ISO-BMFF box primitives.
//!
//! Only what fragment location needs: raw type codes, box headers, and a
//! sequential scanner over an arbitrary byte range.

mod atoms;
mod scanner;

pub use atoms::{Atom, AtomType, HEADER_SIZE};
pub use scanner::BoxScanner;
