//! Fragment resolution and file sending for the request path.
//!
//! - [`FragmentLocator`] turns `(file, track, time)` into a byte range, with
//!   an optional [`IndexCache`] in front of the trailer parser
//! - [`send_file_range`] streams a slice of a file as the response body

mod index_cache;
mod locator;
mod range;

pub use index_cache::{start_cleanup_task, IndexCache};
pub use locator::FragmentLocator;
pub use range::send_file_range;
