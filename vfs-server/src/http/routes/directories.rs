//! Directory endpoints

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};

use super::StatusResponse;
use crate::db::DirectoryRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidQuery, ValidUuid};
use crate::http::server::AppState;
use crate::models::{
    CopyRequest, CreateDirectoryRequest, DeleteDirectoryRequest, DirectoryDetails,
    DirectoryListResponse, DirectoryTreeResponse, ListQuery, OwnerQuery, TreeQuery,
    UpdateDirectoryRequest, ValidationError,
};

/// GET /directories - immediate children of a directory or the root
async fn list_directories(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<ListQuery>,
) -> Result<Json<DirectoryListResponse>, ApiError> {
    let listing = DirectoryRepo::new(&state.db)
        .list(query.parent_id, &query.user_token)
        .await?;
    Ok(Json(listing))
}

/// GET /directories/tree - nested tree, `level` deep
async fn directory_tree(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<TreeQuery>,
) -> Result<Json<DirectoryTreeResponse>, ApiError> {
    let tree = DirectoryRepo::new(&state.db)
        .tree(query.parent_id, query.level, &query.user_token)
        .await?;
    Ok(Json(DirectoryTreeResponse { items: tree }))
}

/// GET /directories/{id}
async fn get_directory(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
) -> Result<Json<DirectoryDetails>, ApiError> {
    DirectoryRepo::new(&state.db)
        .details(id, &owner.user_token)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("directory", id))
}

/// POST /directories
async fn create_directory(
    State(state): State<Arc<AppState>>,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    ValidJson(req): ValidJson<CreateDirectoryRequest>,
) -> Result<Json<DirectoryDetails>, ApiError> {
    DirectoryRepo::new(&state.db)
        .create(&req.name, req.parent_id, &owner.user_token)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::Internal {
            message: "directory_create returned no row".into(),
        })
}

/// PATCH /directories/{id} - rename and/or move
async fn update_directory(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    ValidJson(req): ValidJson<UpdateDirectoryRequest>,
) -> Result<Json<DirectoryDetails>, ApiError> {
    let updates = req.updates;
    DirectoryRepo::new(&state.db)
        .update(id, updates.name.as_deref(), updates.parent_id, &owner.user_token)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("directory", id))
}

/// POST /directories/{id}/copy - deep copy
async fn copy_directory(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    ValidJson(req): ValidJson<CopyRequest>,
) -> Result<Json<DirectoryDetails>, ApiError> {
    DirectoryRepo::new(&state.db)
        .copy(id, req.destination_parent_id, &owner.user_token)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("directory", id))
}

/// DELETE /directories/{id} - body `{recursive}` is optional
async fn delete_directory(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let req: DeleteDirectoryRequest = if body.iter().all(u8::is_ascii_whitespace) {
        DeleteDirectoryRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ValidationError::Malformed {
            source: "body",
            reason: e.to_string(),
        })?
    };

    DirectoryRepo::new(&state.db)
        .delete(id, req.recursive, &owner.user_token)
        .await?;
    Ok(Json(StatusResponse::success()))
}

/// Directory routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/directories", get(list_directories).post(create_directory))
        .route("/directories/tree", get(directory_tree))
        .route(
            "/directories/{id}",
            get(get_directory)
                .patch(update_directory)
                .delete(delete_directory),
        )
        .route("/directories/{id}/copy", post(copy_directory))
}

#[cfg(test)]
mod tests {
    use crate::http::routes::test_support::{app, send};
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    async fn mkdir(app: &axum::Router, name: &str, parent: Option<&str>) -> Value {
        let (status, body) = send(
            app,
            "POST",
            "/directories",
            Some(json!({"name": name, "parent_id": parent})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    #[tokio::test]
    async fn create_then_fetch() {
        let app = app().await;
        let created = mkdir(&app, "Docs", None).await;
        let id = created["id"].as_str().unwrap();

        let (status, fetched) = send(&app, "GET", &format!("/directories/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "Docs");
        assert_eq!(fetched["child_counts"]["total"], 0);
    }

    #[tokio::test]
    async fn duplicate_name_is_conflict() {
        let app = app().await;
        mkdir(&app, "Docs", None).await;

        let (status, body) =
            send(&app, "POST", "/directories", Some(json!({"name": "Docs"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["detail"], "Resource name already exists");
    }

    #[tokio::test]
    async fn names_are_forwarded_verbatim() {
        let app = app().await;
        let long = "n".repeat(300);
        for name in ["a\\b", long.as_str()] {
            let (status, body) =
                send(&app, "POST", "/directories", Some(json!({ "name": name }))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["name"], name);
        }
    }

    #[tokio::test]
    async fn missing_name_is_validation_error() {
        let app = app().await;
        let (status, body) = send(&app, "POST", "/directories", Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");

        let (status, _) =
            send(&app, "POST", "/directories", Some(json!({"name": 42}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn bad_uuid_is_validation_error() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/directories/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("UUID"));
    }

    #[tokio::test]
    async fn listing_scoped_by_token() {
        let app = app().await;
        mkdir(&app, "shared", None).await;
        send(
            &app,
            "POST",
            "/directories?user_token=alice",
            Some(json!({"name": "private"})),
        )
        .await;

        let (_, public) = send(&app, "GET", "/directories", None).await;
        assert_eq!(public["directories"].as_array().unwrap().len(), 1);
        assert_eq!(public["directories"][0]["name"], "shared");

        let (_, alice) = send(&app, "GET", "/directories?user_token=alice", None).await;
        assert_eq!(alice["directories"][0]["name"], "private");
    }

    #[tokio::test]
    async fn tree_nests_under_items() {
        let app = app().await;
        let docs = mkdir(&app, "Docs", None).await;
        mkdir(&app, "2024", docs["id"].as_str()).await;

        let (status, body) = send(&app, "GET", "/directories/tree", None).await;
        assert_eq!(status, StatusCode::OK);
        let tree = &body["items"]["tree"];
        assert_eq!(tree[0]["type"], "directory");
        assert_eq!(tree[0]["children"][0]["name"], "2024");
    }

    #[tokio::test]
    async fn tree_level_passed_through() {
        let app = app().await;
        mkdir(&app, "Docs", None).await;

        let (status, body) = send(&app, "GET", "/directories/tree?level=1001", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"]["tree"][0]["name"], "Docs");

        let (status, _) = send(&app, "GET", "/directories/tree?level=deep", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn update_missing_directory_is_404() {
        let app = app().await;
        let uri = format!("/directories/{}", uuid::Uuid::new_v4());
        let (status, _) = send(&app, "PATCH", &uri, Some(json!({"updates": {"name": "x"}}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn copy_into_other_directory() {
        let app = app().await;
        let src = mkdir(&app, "src", None).await;
        let dest = mkdir(&app, "dest", None).await;

        let uri = format!("/directories/{}/copy", src["id"].as_str().unwrap());
        let (status, copy) = send(
            &app,
            "POST",
            &uri,
            Some(json!({"destination_parent_id": dest["id"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(copy["name"], "src");
        assert_eq!(copy["parent_id"], dest["id"]);
    }

    #[tokio::test]
    async fn delete_without_body_is_shallow() {
        let app = app().await;
        let docs = mkdir(&app, "Docs", None).await;
        mkdir(&app, "inner", docs["id"].as_str()).await;
        let uri = format!("/directories/{}", docs["id"].as_str().unwrap());

        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) = send(&app, "DELETE", &uri, Some(json!({"recursive": true}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success"}));

        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
