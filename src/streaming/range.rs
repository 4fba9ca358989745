//! Sending a byte slice of a file, honoring client range requests.

use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use hippo_media::FragmentByteRange;
use std::io::{ErrorKind, SeekFrom};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::server::ServeError;

/// Send `slice` of the file at `path`, or the whole file when `slice` is `None`.
///
/// A client `Range` header is interpreted relative to the slice. The file is
/// streamed in chunks and closed when the body is dropped.
pub async fn send_file_range(
    path: &Path,
    slice: Option<FragmentByteRange>,
    content_type: &'static str,
    headers: &HeaderMap,
) -> Result<Response, ServeError> {
    let mut file = File::open(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ServeError::not_found(format!("{}", path.display())),
        _ => ServeError::Io(e),
    })?;
    let file_size = file.metadata().await?.len();

    let (slice_start, slice_len) = match slice {
        Some(range) => {
            let end = range.end_inclusive(file_size);
            if range.start > end || end >= file_size {
                return Err(ServeError::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("range {} exceeds file of {} bytes", range, file_size),
                )));
            }
            (range.start, end - range.start + 1)
        }
        None => (0, file_size),
    };

    let client_range = headers
        .get(header::RANGE)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| parse_range_header(s, slice_len));

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes");

    let (offset, length, builder) = match client_range {
        Some((start, end)) => {
            let length = end - start + 1;
            let builder = builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, slice_len),
                );
            (slice_start + start, length, builder)
        }
        None => (slice_start, slice_len, builder.status(StatusCode::OK)),
    };

    file.seek(SeekFrom::Start(offset)).await?;
    let stream = ReaderStream::new(file.take(length));

    tracing::trace!(path = %path.display(), offset, length, "sending file range");

    Ok(builder
        .header(header::CONTENT_LENGTH, length)
        .body(Body::from_stream(stream))?)
}

/// Parse a single `bytes=` range against a resource of `size` bytes.
///
/// Returns inclusive `(start, end)`; `None` for anything malformed or
/// unsatisfiable, and for multi-range requests.
fn parse_range_header(header: &str, size: u64) -> Option<(u64, u64)> {
    let header = header.strip_prefix("bytes=")?;
    if size == 0 {
        return None;
    }

    let parts: Vec<&str> = header.split('-').collect();
    if parts.len() != 2 {
        return None;
    }

    let start = parts[0].trim();
    let end = parts[1].trim();

    match (start.is_empty(), end.is_empty()) {
        // bytes=-500 (last 500 bytes)
        (true, false) => {
            let suffix_len: u64 = end.parse().ok()?;
            if suffix_len == 0 {
                return None;
            }
            Some((size.saturating_sub(suffix_len), size - 1))
        }
        // bytes=500- (from 500 to end)
        (false, true) => {
            let start: u64 = start.parse().ok()?;
            if start >= size {
                return None;
            }
            Some((start, size - 1))
        }
        // bytes=0-499
        (false, false) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            if start >= size {
                return None;
            }
            let end = end.min(size - 1);
            if start > end {
                return None;
            }
            Some((start, end))
        }
        (true, true) => None,
    }
}
