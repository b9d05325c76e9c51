use crate::{error::ApiError, state::AppState};
use axum::{
    extract::State,
    http::{header, Uri},
    response::{IntoResponse, Response},
};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".html") {
        "text/html"
    } else if path.ends_with(".js") {
        "application/javascript"
    } else if path.ends_with(".css") {
        "text/css"
    } else {
        "application/octet-stream"
    }
}

/// Map a request path onto a file below the public dir. `/` is `index.html`.
/// `.` segments are dropped; `..` or anything rooted yields None.
fn relative_path(uri_path: &str) -> Option<PathBuf> {
    let mut rel = PathBuf::new();
    for component in Path::new(uri_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => rel.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if rel.as_os_str().is_empty() {
        rel.push("index.html");
    }
    Some(rel)
}

/// Fallback for every path that is not an API route.
pub async fn serve_static(State(state): State<AppState>, uri: Uri) -> Result<Response, ApiError> {
    let rel = relative_path(uri.path()).ok_or(ApiError::NotFound)?;
    let full = state.config().public_dir.join(&rel);
    let bytes = tokio::fs::read(&full).await.map_err(|e| {
        debug!(path = %full.display(), error = %e, "static file not served");
        ApiError::NotFound
    })?;
    let content_type = content_type_for(&rel.to_string_lossy());
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
