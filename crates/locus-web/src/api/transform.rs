//! `POST /__locus__/transform?path=`: the bundler plugin sends each module
//! here and substitutes the tagged output when it gets one back.

use std::path::Path;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use locus_tagger::transform_module;
use locus_types::TransformResponse;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::util::http::{json_error, json_ok};

#[derive(Debug, Deserialize)]
pub struct TransformParams {
    pub path: Option<String>,
}

pub async fn api_transform(
    State(state): State<AppState>,
    Query(params): Query<TransformParams>,
    body: String,
) -> Response {
    let Some(path) = params.path.filter(|path| !path.trim().is_empty()) else {
        return json_error(StatusCode::BAD_REQUEST, "missing `path` query parameter");
    };
    let relative = project_relative(&path, state.config.project_root.as_deref());

    let task_path = relative.clone();
    let output = tokio::task::spawn_blocking(move || transform_module(&body, &task_path)).await;
    match output {
        Ok(Some(output)) => match output.map.to_json() {
            Ok(map) => {
                debug!(path = %relative, "module transformed");
                json_ok(&TransformResponse {
                    code: output.code,
                    map,
                })
            }
            Err(e) => {
                warn!(path = %relative, %e, "failed to encode source map");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, e)
            }
        },
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(path = %relative, %e, "transform task failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("transform task failed: {e}"),
            )
        }
    }
}

/// Module id as the tagger should see it: bundler query suffix dropped,
/// forward slashes, and relative to `root` when it lies under it.
pub fn project_relative(path: &str, root: Option<&Path>) -> String {
    let path = path.split('?').next().unwrap_or(path).replace('\\', "/");
    let Some(root) = root else {
        return path;
    };
    let root = root.to_string_lossy().replace('\\', "/");
    match path
        .strip_prefix(root.trim_end_matches('/'))
        .and_then(|rest| rest.strip_prefix('/'))
    {
        Some(rest) => rest.to_string(),
        None => path,
    }
}
