//! Locating the manifest a request path is anchored on.

use std::path::{Path, PathBuf};

/// Walk `relative` (a `/`-separated path under `root`) one segment at a time
/// until a segment names a regular file.
///
/// Returns the manifest path and the remaining sub-path. A directory is only
/// descended into while what follows it still has a `/` after a non-empty
/// head.
pub async fn find_manifest(root: &Path, relative: &str) -> Option<(PathBuf, String)> {
    let mut dir = root.to_path_buf();
    let mut rest = relative;

    loop {
        let (head, tail) = split_head(rest);
        let candidate = dir.join(head);

        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => {
                tracing::trace!(manifest = %candidate.display(), subpath = tail, "found manifest");
                return Some((candidate, tail.to_string()));
            }
            _ => {}
        }

        if tail.find('/').map_or(true, |pos| pos == 0) {
            return None;
        }
        dir = candidate;
        rest = tail;
    }
}

fn split_head(path: &str) -> (&str, &str) {
    match path.find('/') {
        Some(pos) if pos > 0 => (&path[..pos], &path[pos + 1..]),
        _ => (path, ""),
    }
}
