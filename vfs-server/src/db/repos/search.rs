//! Search repository

use serde_json::Value;

use super::first_row;
use crate::db::{DbError, QueryExecutor, Statement};
use crate::models::{ItemSearchResponse, SearchRequest};

/// Search repository
pub struct SearchRepo<'a> {
    db: &'a QueryExecutor,
}

impl<'a> SearchRepo<'a> {
    pub fn new(db: &'a QueryExecutor) -> Self {
        Self { db }
    }

    /// Run `item_search`. Absent filters are passed as SQL NULL.
    pub async fn search(
        &self,
        request: SearchRequest,
        user_token: &str,
    ) -> Result<ItemSearchResponse, DbError> {
        let metadata = request.metadata.map(Value::Object).unwrap_or(Value::Null);
        let rows = self
            .db
            .execute_query(
                Statement::rows("item_search")
                    .arg(request.query)
                    .arg(request.kind.as_str())
                    .arg(request.parent_id)
                    .arg(request.tags)
                    .arg(metadata)
                    .arg(user_token),
            )
            .await?;
        Ok(first_row(rows, "item_search")?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DirectoryRepo, FileRepo, MemoryBackend, Pool, PoolConfig};
    use crate::models::{Metadata, SearchType};
    use serde_json::json;

    async fn seeded() -> QueryExecutor {
        let pool = Pool::connect(MemoryBackend::new(), PoolConfig::default())
            .await
            .unwrap();
        let db = QueryExecutor::new(pool);

        let docs = DirectoryRepo::new(&db)
            .create("Reports", None, "public")
            .await
            .unwrap()
            .unwrap();
        let files = FileRepo::new(&db);
        let metadata = json!({"year": 2024}).as_object().cloned().unwrap();
        let q1 = files
            .create("report_q1.pdf", Some(docs.id), "s-1", metadata, "public")
            .await
            .unwrap()
            .unwrap();
        files.add_tags(q1.id, vec!["finance".into()], "public").await.unwrap();
        files
            .create("notes.txt", None, "s-2", Metadata::new(), "public")
            .await
            .unwrap();
        files
            .create("report_secret.pdf", None, "s-3", Metadata::new(), "alice")
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn empty_query_lists_visible_items() {
        let db = seeded().await;
        let found = SearchRepo::new(&db)
            .search(SearchRequest::default(), "public")
            .await
            .unwrap();

        assert_eq!(found.directories.len(), 1);
        assert_eq!(found.files.len(), 2);
        assert!(found.files.iter().all(|f| f.name != "report_secret.pdf"));
    }

    #[tokio::test]
    async fn query_is_case_insensitive_substring() {
        let db = seeded().await;
        let request = SearchRequest {
            query: Some("REPORT".into()),
            kind: SearchType::File,
            ..Default::default()
        };
        let found = SearchRepo::new(&db).search(request, "public").await.unwrap();

        assert!(found.directories.is_empty());
        assert_eq!(found.files.len(), 1);
        assert_eq!(found.files[0].name, "report_q1.pdf");
    }

    #[tokio::test]
    async fn tag_and_metadata_filters() {
        let db = seeded().await;
        let repo = SearchRepo::new(&db);

        let by_tag = SearchRequest {
            tags: Some(vec!["finance".into()]),
            ..Default::default()
        };
        assert_eq!(repo.search(by_tag, "public").await.unwrap().files.len(), 1);

        let by_metadata = SearchRequest {
            metadata: json!({"year": 2023}).as_object().cloned(),
            ..Default::default()
        };
        assert!(repo.search(by_metadata, "public").await.unwrap().files.is_empty());
    }
}
