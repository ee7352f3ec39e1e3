//! Tag repository

use serde::Deserialize;

use crate::db::{DbError, QueryExecutor, Statement};
use crate::models::FileTags;

#[derive(Debug, Deserialize)]
struct TagRow {
    id: i64,
    name: String,
}

/// Tag repository
pub struct TagRepo<'a> {
    db: &'a QueryExecutor,
}

impl<'a> TagRepo<'a> {
    pub fn new(db: &'a QueryExecutor) -> Self {
        Self { db }
    }

    /// Every tag the owner has created, as parallel name and id lists.
    pub async fn list(&self, user_token: &str) -> Result<FileTags, DbError> {
        let rows = self
            .db
            .execute_query(Statement::rows("tags_list").arg(user_token))
            .await?;

        let mut tags = FileTags::default();
        for row in rows {
            let tag: TagRow = row.into_typed("tags_list")?;
            tags.names.push(tag.name);
            tags.ids.push(tag.id);
        }
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FileRepo, MemoryBackend, Pool, PoolConfig};
    use crate::models::Metadata;

    #[tokio::test]
    async fn lists_only_own_tags() {
        let pool = Pool::connect(MemoryBackend::new(), PoolConfig::default())
            .await
            .unwrap();
        let db = QueryExecutor::new(pool);
        let files = FileRepo::new(&db);

        let file = files
            .create("a.txt", None, "s-1", Metadata::new(), "alice")
            .await
            .unwrap()
            .unwrap();
        files
            .add_tags(file.id, vec!["zeta".into(), "alpha".into()], "alice")
            .await
            .unwrap();

        let alice = TagRepo::new(&db).list("alice").await.unwrap();
        assert_eq!(alice.names, vec!["alpha", "zeta"]);
        assert_eq!(alice.ids.len(), 2);

        let public = TagRepo::new(&db).list("public").await.unwrap();
        assert_eq!(public, FileTags::default());
    }
}
