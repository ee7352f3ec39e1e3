//! Owner-wide tag listing

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::db::TagRepo;
use crate::http::error::ApiError;
use crate::http::extractors::ValidQuery;
use crate::http::server::AppState;
use crate::models::{FileTags, OwnerQuery};

/// GET /tags - every tag of the owner
async fn list_tags(
    State(state): State<Arc<AppState>>,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
) -> Result<Json<FileTags>, ApiError> {
    let tags = TagRepo::new(&state.db).list(&owner.user_token).await?;
    Ok(Json(tags))
}

/// Tag routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/tags", get(list_tags))
}
