use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

use super::auth::Authorized;
use super::svr::AppState;
use crate::error::ApiError;
use crate::pipeline::{Batch, ResultMap};

/// `POST /sync`: run one batch to completion and answer with name → identifier.
///
/// Jobs that fail are absent from the response.
pub async fn handle_sync(
    _auth: Authorized,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ResultMap>, ApiError> {
    let batch = Batch::decode(&body)?;
    if batch.is_empty() {
        tracing::warn!("no file url in request");
        return Err(ApiError::EmptyBatch);
    }

    Ok(Json(state.pipeline().run_batch(batch).await))
}
