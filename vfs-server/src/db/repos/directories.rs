//! Directory repository
//!
//! Wraps the `directory_*` functions. Details, create, update and copy all
//! answer with a single `directory_details` column.

use uuid::Uuid;

use super::{first_column, first_row};
use crate::db::{DbError, QueryExecutor, Statement};
use crate::models::{DirectoryDetails, DirectoryListResponse, DirectoryTree};

const DETAILS: &str = "directory_details";

/// Directory repository
pub struct DirectoryRepo<'a> {
    db: &'a QueryExecutor,
}

impl<'a> DirectoryRepo<'a> {
    pub fn new(db: &'a QueryExecutor) -> Self {
        Self { db }
    }

    /// Immediate children of `parent_id`, or of the root.
    pub async fn list(
        &self,
        parent_id: Option<Uuid>,
        user_token: &str,
    ) -> Result<DirectoryListResponse, DbError> {
        let rows = self
            .db
            .execute_query(
                Statement::rows("directory_list")
                    .arg(parent_id)
                    .arg(user_token),
            )
            .await?;
        Ok(first_row(rows, "directory_list")?.unwrap_or_default())
    }

    /// Nested tree below `parent_id`, `level` deep.
    pub async fn tree(
        &self,
        parent_id: Option<Uuid>,
        level: i32,
        user_token: &str,
    ) -> Result<DirectoryTree, DbError> {
        let rows = self
            .db
            .execute_query(
                Statement::rows("directory_tree")
                    .arg(parent_id)
                    .arg(user_token)
                    .arg(level),
            )
            .await?;
        Ok(first_row(rows, "directory_tree")?.unwrap_or_default())
    }

    pub async fn details(
        &self,
        id: Uuid,
        user_token: &str,
    ) -> Result<Option<DirectoryDetails>, DbError> {
        let rows = self
            .db
            .execute_query(Statement::rows("directory_details").arg(id).arg(user_token))
            .await?;
        first_column(rows, "directory_details", DETAILS)
    }

    pub async fn create(
        &self,
        name: &str,
        parent_id: Option<Uuid>,
        user_token: &str,
    ) -> Result<Option<DirectoryDetails>, DbError> {
        let rows = self
            .db
            .execute_query(
                Statement::rows("directory_create")
                    .arg(name)
                    .arg(parent_id)
                    .arg(user_token),
            )
            .await?;
        first_column(rows, "directory_create", DETAILS)
    }

    /// Rename and/or move. `None` leaves the field unchanged.
    pub async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        parent_id: Option<Uuid>,
        user_token: &str,
    ) -> Result<Option<DirectoryDetails>, DbError> {
        let rows = self
            .db
            .execute_query(
                Statement::rows("directory_update")
                    .arg(id)
                    .arg(name.map(str::to_owned))
                    .arg(parent_id)
                    .arg(user_token),
            )
            .await?;
        first_column(rows, "directory_update", DETAILS)
    }

    /// Deep copy under `destination`, or into the root.
    pub async fn copy(
        &self,
        id: Uuid,
        destination: Option<Uuid>,
        user_token: &str,
    ) -> Result<Option<DirectoryDetails>, DbError> {
        let rows = self
            .db
            .execute_query(
                Statement::rows("directory_copy")
                    .arg(id)
                    .arg(destination)
                    .arg(user_token),
            )
            .await?;
        first_column(rows, "directory_copy", DETAILS)
    }

    pub async fn delete(&self, id: Uuid, recursive: bool, user_token: &str) -> Result<(), DbError> {
        self.db
            .execute_query(
                Statement::scalar("directory_delete")
                    .arg(id)
                    .arg(recursive)
                    .arg(user_token),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ErrorKind, MemoryBackend, Pool, PoolConfig};

    async fn executor() -> QueryExecutor {
        let pool = Pool::connect(MemoryBackend::new(), PoolConfig::default())
            .await
            .unwrap();
        QueryExecutor::new(pool)
    }

    #[tokio::test]
    async fn create_then_details_round_trip() {
        let db = executor().await;
        let repo = DirectoryRepo::new(&db);

        let created = repo.create("Docs", None, "public").await.unwrap().unwrap();
        let fetched = repo.details(created.id, "public").await.unwrap().unwrap();

        assert_eq!(created.name, "Docs");
        assert_eq!(fetched.name, "Docs");
        assert_eq!(fetched.child_counts.total, 0);
    }

    #[tokio::test]
    async fn missing_details_is_none() {
        let db = executor().await;
        let repo = DirectoryRepo::new(&db);
        assert!(repo.details(Uuid::new_v4(), "public").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_and_tree_of_empty_root() {
        let db = executor().await;
        let repo = DirectoryRepo::new(&db);

        let listing = repo.list(None, "public").await.unwrap();
        assert!(listing.directories.is_empty() && listing.files.is_empty());

        let tree = repo.tree(None, 100, "public").await.unwrap();
        assert!(tree.tree.is_empty());
    }

    #[tokio::test]
    async fn tree_respects_level() {
        let db = executor().await;
        let repo = DirectoryRepo::new(&db);

        let a = repo.create("a", None, "public").await.unwrap().unwrap();
        repo.create("b", Some(a.id), "public").await.unwrap();

        let shallow = repo.tree(None, 1, "public").await.unwrap();
        assert_eq!(shallow.tree.len(), 1);
        assert_eq!(shallow.tree[0].children.as_deref(), Some(&[][..]));

        let deep = repo.tree(None, 2, "public").await.unwrap();
        assert_eq!(deep.tree[0].children.as_ref().unwrap()[0].name, "b");
    }

    #[tokio::test]
    async fn rename_keeps_parent() {
        let db = executor().await;
        let repo = DirectoryRepo::new(&db);

        let a = repo.create("a", None, "public").await.unwrap().unwrap();
        let b = repo.create("b", Some(a.id), "public").await.unwrap().unwrap();

        let renamed = repo
            .update(b.id, Some("c"), None, "public")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "c");
        assert_eq!(renamed.parent_id, Some(a.id));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let db = executor().await;
        let repo = DirectoryRepo::new(&db);

        let err = repo.delete(Uuid::new_v4(), true, "public").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
