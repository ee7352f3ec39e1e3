//! File repository
//!
//! Wraps the `file_*` functions, including tag mutation on a single file.
//! `update` is the one multi-call operation: property change, optional tag
//! replacement and the final re-read share a transaction.

use serde_json::Value;
use uuid::Uuid;

use super::first_column;
use crate::db::{DbError, QueryExecutor, Statement};
use crate::models::{FileDetails, FileTags, Metadata};

const DETAILS: &str = "file_details";

/// Changes for `FileRepo::update`; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct FileChanges {
    pub name: Option<String>,
    pub parent_id: Option<Uuid>,
    pub metadata: Option<Metadata>,
    pub tags: Option<Vec<String>>,
}

/// File repository
pub struct FileRepo<'a> {
    db: &'a QueryExecutor,
}

impl<'a> FileRepo<'a> {
    pub fn new(db: &'a QueryExecutor) -> Self {
        Self { db }
    }

    pub async fn details(&self, id: Uuid, user_token: &str) -> Result<Option<FileDetails>, DbError> {
        let rows = self
            .db
            .execute_query(Statement::rows("file_details").arg(id).arg(user_token))
            .await?;
        first_column(rows, "file_details", DETAILS)
    }

    /// Register a file record. Content lives elsewhere under `storage_id`.
    pub async fn create(
        &self,
        name: &str,
        parent_id: Option<Uuid>,
        storage_id: &str,
        metadata: Metadata,
        user_token: &str,
    ) -> Result<Option<FileDetails>, DbError> {
        let rows = self
            .db
            .execute_query(
                Statement::rows("file_create")
                    .arg(name)
                    .arg(parent_id)
                    .arg(user_token)
                    .arg(storage_id)
                    .arg(Value::Object(metadata)),
            )
            .await?;
        first_column(rows, "file_create", DETAILS)
    }

    /// Apply `changes` atomically and return the re-read record.
    pub async fn update(
        &self,
        id: Uuid,
        changes: FileChanges,
        user_token: &str,
    ) -> Result<Option<FileDetails>, DbError> {
        let metadata = changes.metadata.map(Value::Object).unwrap_or(Value::Null);

        let mut statements = vec![Statement::rows("file_update")
            .arg(id)
            .arg(changes.name)
            .arg(changes.parent_id)
            .arg(metadata)
            .arg(user_token)];
        if let Some(tags) = changes.tags {
            statements.push(
                Statement::rows("file_tags_set")
                    .arg(id)
                    .arg(tags)
                    .arg(user_token),
            );
        }
        statements.push(Statement::rows("file_details").arg(id).arg(user_token));

        let mut results = self.db.execute_transaction(statements).await?;
        let updated = results.first().map_or(false, |rows| !rows.is_empty());
        if !updated {
            return Ok(None);
        }
        first_column(results.pop().unwrap_or_default(), "file_details", DETAILS)
    }

    pub async fn delete(&self, id: Uuid, user_token: &str) -> Result<(), DbError> {
        self.db
            .execute_query(Statement::scalar("file_delete").arg(id).arg(user_token))
            .await?;
        Ok(())
    }

    pub async fn copy(
        &self,
        id: Uuid,
        destination: Option<Uuid>,
        user_token: &str,
    ) -> Result<Option<FileDetails>, DbError> {
        let rows = self
            .db
            .execute_query(
                Statement::rows("file_copy")
                    .arg(id)
                    .arg(destination)
                    .arg(user_token),
            )
            .await?;
        first_column(rows, "file_copy", DETAILS)
    }

    pub async fn add_tags(&self, id: Uuid, tags: Vec<String>, user_token: &str) -> Result<FileTags, DbError> {
        self.tags_call("file_tags_add", id, tags, user_token).await
    }

    pub async fn remove_tags(&self, id: Uuid, tags: Vec<String>, user_token: &str) -> Result<FileTags, DbError> {
        self.tags_call("file_tags_remove", id, tags, user_token).await
    }

    /// Replace the whole tag set.
    pub async fn set_tags(&self, id: Uuid, tags: Vec<String>, user_token: &str) -> Result<FileTags, DbError> {
        self.tags_call("file_tags_set", id, tags, user_token).await
    }

    async fn tags_call(
        &self,
        function: &'static str,
        id: Uuid,
        tags: Vec<String>,
        user_token: &str,
    ) -> Result<FileTags, DbError> {
        let rows = self
            .db
            .execute_query(Statement::rows(function).arg(id).arg(tags).arg(user_token))
            .await?;
        Ok(first_column(rows, function, "tags")?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DirectoryRepo, ErrorKind, MemoryBackend, Pool, PoolConfig};
    use serde_json::json;

    async fn executor() -> QueryExecutor {
        let pool = Pool::connect(MemoryBackend::new(), PoolConfig::default())
            .await
            .unwrap();
        QueryExecutor::new(pool)
    }


    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    async fn new_file(db: &QueryExecutor, filename: &str) -> FileDetails {
        FileRepo::new(db)
            .create(filename, None, &Uuid::new_v4().to_string(), Metadata::new(), "public")
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn create_keeps_storage_id() {
        let db = executor().await;
        let storage_id = Uuid::new_v4().to_string();

        let file = FileRepo::new(&db)
            .create("a.txt", None, &storage_id, Metadata::new(), "public")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(file.storage_id, storage_id);
        assert!(file.tags.names.is_empty());
    }

    #[tokio::test]
    async fn update_applies_tags_and_metadata_together() {
        let db = executor().await;
        let repo = FileRepo::new(&db);
        let file = new_file(&db, "a.txt").await;

        let metadata = json!({"size": 12}).as_object().cloned().unwrap();
        let changes = FileChanges {
            name: Some("b.txt".to_string()),
            metadata: Some(metadata),
            tags: Some(tags(&["red", "blue"])),
            ..Default::default()
        };
        let updated = repo.update(file.id, changes, "public").await.unwrap().unwrap();

        assert_eq!(updated.name, "b.txt");
        assert_eq!(updated.metadata["size"], 12);
        assert_eq!(updated.tags.names, tags(&["red", "blue"]));
    }

    #[tokio::test]
    async fn failed_update_leaves_file_untouched() {
        let db = executor().await;
        let repo = FileRepo::new(&db);
        let file = new_file(&db, "a.txt").await;
        new_file(&db, "taken.txt").await;

        let changes = FileChanges {
            name: Some("taken.txt".to_string()),
            tags: Some(tags(&["x"])),
            ..Default::default()
        };
        let err = repo.update(file.id, changes, "public").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let current = repo.details(file.id, "public").await.unwrap().unwrap();
        assert_eq!(current.name, "a.txt");
        assert!(current.tags.names.is_empty());
    }

    #[tokio::test]
    async fn set_tags_is_idempotent() {
        let db = executor().await;
        let repo = FileRepo::new(&db);
        let file = new_file(&db, "a.txt").await;

        let first = repo.set_tags(file.id, tags(&["x", "y"]), "public").await.unwrap();
        let second = repo.set_tags(file.id, tags(&["x", "y"]), "public").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.names, tags(&["x", "y"]));
    }

    #[tokio::test]
    async fn add_then_remove_leaves_no_tags() {
        let db = executor().await;
        let repo = FileRepo::new(&db);
        let file = new_file(&db, "a.txt").await;

        repo.add_tags(file.id, tags(&["x", "y"]), "public").await.unwrap();
        let left = repo.remove_tags(file.id, tags(&["x", "y"]), "public").await.unwrap();
        assert_eq!(left, FileTags::default());
    }

    #[tokio::test]
    async fn recursive_delete_removes_nested_files() {
        let db = executor().await;
        let dirs = DirectoryRepo::new(&db);
        let files = FileRepo::new(&db);

        let docs = dirs.create("Docs", None, "public").await.unwrap().unwrap();
        let file = files
            .create("a.txt", Some(docs.id), "s-1", Metadata::new(), "public")
            .await
            .unwrap()
            .unwrap();

        dirs.delete(docs.id, true, "public").await.unwrap();
        assert!(files.details(file.id, "public").await.unwrap().is_none());
    }
}
