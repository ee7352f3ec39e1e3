//! Search endpoint

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};

use crate::db::SearchRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidQuery};
use crate::http::server::AppState;
use crate::models::{ItemSearchResponse, OwnerQuery, SearchRequest};

/// POST /search
async fn search_items(
    State(state): State<Arc<AppState>>,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    ValidJson(req): ValidJson<SearchRequest>,
) -> Result<Json<ItemSearchResponse>, ApiError> {
    let found = SearchRepo::new(&state.db)
        .search(req, &owner.user_token)
        .await?;
    Ok(Json(found))
}

/// Search routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/search", post(search_items))
}
