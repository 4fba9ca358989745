//! Mapping request paths to manifests, files and fragments.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
};

use super::{AppContext, ServeError};
use crate::manifest::{find_manifest, LoadedManifest, Route, MP4_CONTENT_TYPE};
use crate::streaming::send_file_range;

const CROSS_DOMAIN_POLICY: &str = r#"<?xml version="1.0"?><cross-domain-policy><allow-access-from domain="*" /></cross-domain-policy>"#;

/// Fallback handler for every path other than the fixed routes.
pub async fn dispatch(
    State(ctx): State<AppContext>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return ServeError::MethodNotAllowed.into_response();
    }

    let server = &ctx.config.server;
    let path = uri.path();
    if server.debug {
        tracing::info!(path, "request");
    }

    if server.cross_domain && path == "/crossdomain.xml" {
        return ([(header::CONTENT_TYPE, "text/xml")], CROSS_DOMAIN_POLICY).into_response();
    }

    let relative = match relative_stream_path(&server.url_root, path) {
        Some(relative) => relative,
        None => return ServeError::not_found(format!("{} is not a stream path", path)).into_response(),
    };

    let mut response = serve_stream(&ctx, &relative, &headers)
        .await
        .into_response();

    if server.set_cors_headers {
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
    }

    if method == Method::HEAD {
        let (parts, _) = response.into_parts();
        return Response::from_parts(parts, Body::empty());
    }

    response
}

async fn serve_stream(
    ctx: &AppContext,
    relative: &str,
    headers: &HeaderMap,
) -> Result<Response, ServeError> {
    let (manifest_path, subpath) = find_manifest(&ctx.config.server.file_root, relative)
        .await
        .ok_or_else(|| ServeError::not_found(format!("no manifest on {}", relative)))?;

    let manifest = LoadedManifest::load(&manifest_path).await?;

    match manifest.route(&subpath) {
        Some(Route::Document { path, content_type }) => {
            send_file_range(&path, None, content_type, headers).await
        }
        Some(Route::Fragment {
            path,
            track_id,
            time,
        }) => {
            let time = time.ok_or_else(|| {
                ServeError::not_found(format!("{} carries no usable time", subpath))
            })?;
            let range = ctx.locator.locate(&path, track_id, time).await?;
            send_file_range(&path, Some(range), MP4_CONTENT_TYPE, headers).await
        }
        None => Err(ServeError::not_found(format!(
            "{} matches nothing in {}",
            subpath,
            manifest_path.display()
        ))),
    }
}

/// The part of `path` below `url_root`, normalized to `/`-joined segments.
///
/// `None` when the path is outside the root, tries to climb with `..`, or
/// has fewer than two segments (a manifest plus a sub-path).
fn relative_stream_path(url_root: &str, path: &str) -> Option<String> {
    let rest = path.strip_prefix(url_root)?;
    if !url_root.ends_with('/') && !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let mut segments = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') => return None,
            s => segments.push(s),
        }
    }

    if segments.len() < 2 {
        return None;
    }
    Some(segments.join("/"))
}
