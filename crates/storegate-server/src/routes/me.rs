use axum::Extension;
use axum::response::Json;

use crate::middleware::RequestContext;

/// The resolved end-user principal and what the sync did for it.
pub async fn me(Extension(context): Extension<RequestContext>) -> Json<RequestContext> {
    Json(context)
}
