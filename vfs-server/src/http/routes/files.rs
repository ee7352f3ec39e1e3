//! File and per-file tag endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::StatusResponse;
use crate::db::repos::files::FileChanges;
use crate::db::FileRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidQuery, ValidUuid};
use crate::http::server::AppState;
use crate::models::{
    CopyRequest, CreateFileRequest, FileDetails, FileTags, Metadata, OwnerQuery, TagsRequest,
    UpdateFileRequest,
};

/// GET /files/{id}
async fn get_file(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
) -> Result<Json<FileDetails>, ApiError> {
    FileRepo::new(&state.db)
        .details(id, &owner.user_token)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("file", id))
}

/// POST /files - register a file record with a fresh storage id
async fn create_file(
    State(state): State<Arc<AppState>>,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    ValidJson(req): ValidJson<CreateFileRequest>,
) -> Result<Json<FileDetails>, ApiError> {
    let storage_id = Uuid::new_v4().to_string();

    FileRepo::new(&state.db)
        .create(&req.filename, req.parent_id, &storage_id, Metadata::new(), &owner.user_token)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::Internal {
            message: "file_create returned no row".into(),
        })
}

/// PATCH /files/{id} - properties, then tags, in one transaction
async fn update_file(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    ValidJson(req): ValidJson<UpdateFileRequest>,
) -> Result<Json<FileDetails>, ApiError> {
    let updates = req.updates;
    let changes = FileChanges {
        name: updates.name,
        parent_id: updates.parent_id,
        metadata: updates.metadata,
        tags: updates.tags,
    };

    FileRepo::new(&state.db)
        .update(id, changes, &owner.user_token)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("file", id))
}

/// DELETE /files/{id}
async fn delete_file(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    FileRepo::new(&state.db).delete(id, &owner.user_token).await?;
    Ok(Json(StatusResponse::success()))
}

/// POST /files/{id}/copy
async fn copy_file(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    ValidJson(req): ValidJson<CopyRequest>,
) -> Result<Json<FileDetails>, ApiError> {
    FileRepo::new(&state.db)
        .copy(id, req.destination_parent_id, &owner.user_token)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("file", id))
}

/// POST /files/{id}/tags - add
async fn add_tags(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    ValidJson(req): ValidJson<TagsRequest>,
) -> Result<Json<FileTags>, ApiError> {
    let result = FileRepo::new(&state.db)
        .add_tags(id, req.tags, &owner.user_token)
        .await?;
    Ok(Json(result))
}

/// PATCH /files/{id}/tags - replace
async fn set_tags(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    ValidJson(req): ValidJson<TagsRequest>,
) -> Result<Json<FileTags>, ApiError> {
    let result = FileRepo::new(&state.db)
        .set_tags(id, req.tags, &owner.user_token)
        .await?;
    Ok(Json(result))
}

/// DELETE /files/{id}/tags - remove
async fn remove_tags(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(owner): ValidQuery<OwnerQuery>,
    ValidJson(req): ValidJson<TagsRequest>,
) -> Result<Json<FileTags>, ApiError> {
    let result = FileRepo::new(&state.db)
        .remove_tags(id, req.tags, &owner.user_token)
        .await?;
    Ok(Json(result))
}

/// File routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/files", post(create_file))
        .route("/files/", post(create_file))
        .route(
            "/files/{id}",
            get(get_file).patch(update_file).delete(delete_file),
        )
        .route("/files/{id}/copy", post(copy_file))
        .route(
            "/files/{id}/tags",
            post(add_tags).patch(set_tags).delete(remove_tags),
        )
}

#[cfg(test)]
mod tests {
    use crate::http::routes::test_support::{app, send};
    use axum::http::StatusCode;
    use axum::Router;
    use serde_json::{json, Value};

    async fn touch(app: &Router, filename: &str) -> Value {
        let (status, body) =
            send(app, "POST", "/files", Some(json!({"filename": filename}))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    fn uri(file: &Value, suffix: &str) -> String {
        format!("/files/{}{}", file["id"].as_str().unwrap(), suffix)
    }

    #[tokio::test]
    async fn create_assigns_fresh_storage_id() {
        let app = app().await;
        let a = touch(&app, "a.txt").await;
        let b = touch(&app, "b.txt").await;

        assert_eq!(a["name"], "a.txt");
        assert!(uuid::Uuid::parse_str(a["storage_id"].as_str().unwrap()).is_ok());
        assert_ne!(a["storage_id"], b["storage_id"]);
        assert_eq!(a["metadata"], json!({}));
        assert_eq!(a["tags"], json!({"names": [], "ids": []}));
    }

    #[tokio::test]
    async fn trailing_slash_create() {
        let app = app().await;
        let (status, _) = send(&app, "POST", "/files/", Some(json!({"filename": "x"}))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn patch_updates_properties_and_tags() {
        let app = app().await;
        let file = touch(&app, "a.txt").await;

        let (status, body) = send(
            &app,
            "PATCH",
            &uri(&file, ""),
            Some(json!({"updates": {
                "name": "b.txt",
                "tags": ["red"],
                "metadata": {"pages": 3, "draft": true}
            }})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["name"], "b.txt");
        assert_eq!(body["tags"]["names"], json!(["red"]));
        assert_eq!(body["metadata"]["pages"], 3);
    }

    #[tokio::test]
    async fn patch_is_atomic() {
        let app = app().await;
        let file = touch(&app, "a.txt").await;
        touch(&app, "b.txt").await;

        let (status, _) = send(
            &app,
            "PATCH",
            &uri(&file, ""),
            Some(json!({"updates": {"name": "b.txt", "tags": ["red"]}})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, current) = send(&app, "GET", &uri(&file, ""), None).await;
        assert_eq!(current["name"], "a.txt");
        assert_eq!(current["tags"]["names"], json!([]));
    }

    #[tokio::test]
    async fn tag_lifecycle() {
        let app = app().await;
        let file = touch(&app, "a.txt").await;
        let tags = uri(&file, "/tags");

        let (_, first) = send(&app, "PATCH", &tags, Some(json!({"tags": ["x", "y"]}))).await;
        let (_, second) = send(&app, "PATCH", &tags, Some(json!({"tags": ["x", "y"]}))).await;
        assert_eq!(first, second);
        assert_eq!(second["names"], json!(["x", "y"]));

        let (_, added) = send(&app, "POST", &tags, Some(json!({"tags": ["z"]}))).await;
        assert_eq!(added["names"], json!(["x", "y", "z"]));

        let (status, removed) =
            send(&app, "DELETE", &tags, Some(json!({"tags": ["x", "y", "z"]}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(removed, json!({"names": [], "ids": []}));
    }

    #[tokio::test]
    async fn long_tag_accepted() {
        let app = app().await;
        let file = touch(&app, "a.txt").await;
        let tag = "t".repeat(65);
        let (status, body) =
            send(&app, "POST", &uri(&file, "/tags"), Some(json!({ "tags": [tag] }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["names"], json!([tag]));
    }

    #[tokio::test]
    async fn tags_must_be_a_list() {
        let app = app().await;
        let file = touch(&app, "a.txt").await;
        let (status, _) =
            send(&app, "POST", &uri(&file, "/tags"), Some(json!({"tags": "x"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn copy_and_delete() {
        let app = app().await;
        let (_, dir) = send(&app, "POST", "/directories", Some(json!({"name": "Docs"}))).await;
        let file = touch(&app, "a.txt").await;

        let (status, copy) = send(
            &app,
            "POST",
            &uri(&file, "/copy"),
            Some(json!({"destination_parent_id": dir["id"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(copy["id"], file["id"]);
        assert_eq!(copy["parent_id"], dir["id"]);

        let (status, body) = send(&app, "DELETE", &uri(&file, ""), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let (status, _) = send(&app, "GET", &uri(&file, ""), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_owner_sees_not_found() {
        let app = app().await;
        let file = touch(&app, "a.txt").await;
        let (status, _) = send(&app, "GET", &uri(&file, "?user_token=bob"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
