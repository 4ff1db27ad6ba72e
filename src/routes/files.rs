//! File serving outside `/api`
//!
//! - GET /uploads/advisory/{file} - stored advisory images
//! - GET anything else            - the web client, when a static dir is set
//!
//! Unknown client paths get `index.html` so the client-side router can
//! resolve them.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use hyper::{Method, Request};
use tracing::debug;

use super::common::{bytes_response, render, segments, under, HttpResponse};
use crate::server::AppState;
use crate::services::uploads::content_type_for;
use crate::types::{FarmError, Result};

const UPLOADS_PREFIX: &str = "/uploads";
const INDEX: &str = "index.html";

/// Uploads are immutable once written
const UPLOAD_CACHE: &str = "public, max-age=86400";
const INDEX_CACHE: &str = "no-cache";
const ASSET_CACHE: &str = "public, max-age=3600";

fn decode(raw: &str) -> Option<String> {
    urlencoding::decode(raw).ok().map(|s| s.into_owned())
}

pub async fn handle_upload_request(
    req: &Request<Bytes>,
    state: &AppState,
) -> Option<HttpResponse> {
    let path = req.uri().path();
    if !under(path, UPLOADS_PREFIX) {
        return None;
    }

    let result = match (req.method(), segments(path, UPLOADS_PREFIX).as_slice()) {
        (&Method::GET, ["advisory", file]) => serve_upload(state, file).await,
        (_, ["advisory", _]) => Err(FarmError::MethodNotAllowed),
        _ => Err(FarmError::NotFound("File not found".into())),
    };

    Some(render(req, result))
}

async fn serve_upload(state: &AppState, raw_name: &str) -> Result<HttpResponse> {
    let name =
        decode(raw_name).ok_or_else(|| FarmError::BadRequest("Invalid file name".into()))?;
    let (data, content_type) = state.uploads.read_advisory(&name).await?;
    Ok(bytes_response(content_type, data, UPLOAD_CACHE))
}

/// Relative path inside the static root; `None` for anything that could
/// climb out of it
fn static_relative(path: &str) -> Option<PathBuf> {
    let decoded = decode(path)?;
    let relative = Path::new(decoded.trim_start_matches('/'));

    let mut clean = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(clean)
}

async fn read_file(path: &Path) -> Option<Bytes> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => tokio::fs::read(path).await.ok().map(Bytes::from),
        _ => None,
    }
}

/// Serve the web client. `None` when no static dir is configured or the
/// request is not a GET.
pub async fn handle_static_request(
    req: &Request<Bytes>,
    state: &AppState,
) -> Option<HttpResponse> {
    let root = state.args.static_dir.as_ref()?;
    if req.method() != Method::GET {
        return None;
    }

    let path = req.uri().path();
    if let Some(relative) = static_relative(path).filter(|p| !p.as_os_str().is_empty()) {
        let file = root.join(&relative);
        if let Some(data) = read_file(&file).await {
            let name = relative.to_string_lossy();
            let cache = if name.ends_with(INDEX) {
                INDEX_CACHE
            } else {
                ASSET_CACHE
            };
            return Some(bytes_response(content_type_for(&name), data, cache));
        }
    }

    debug!(path = %path, "Falling back to index.html");
    let data = read_file(&root.join(INDEX)).await?;
    Some(bytes_response(content_type_for(INDEX), data, INDEX_CACHE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_paths_stay_inside_root() {
        assert_eq!(
            static_relative("/assets/app.js"),
            Some(PathBuf::from("assets/app.js"))
        );
        assert_eq!(static_relative("/"), Some(PathBuf::new()));
        assert!(static_relative("/../etc/passwd").is_none());
        assert!(static_relative("/assets/%2e%2e/%2e%2e/secret").is_none());
    }

    #[test]
    fn test_decoding() {
        assert_eq!(decode("image%201.png").as_deref(), Some("image 1.png"));
    }
}
