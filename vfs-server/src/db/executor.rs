//! Query execution over pooled connections
//!
//! One lease per call, one transaction per lease. A failed statement rolls
//! back the whole call and is never re-run. Each call runs on its own task,
//! so it completes even when the caller goes away; only the result is lost.

use super::{DbError, Lease, Pool, PoolStatus, Row, Statement};

/// Runs external function calls against the pool.
#[derive(Clone)]
pub struct QueryExecutor {
    pool: Pool,
}

impl QueryExecutor {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Run one statement and commit it.
    pub async fn execute_query(&self, statement: Statement) -> Result<Vec<Row>, DbError> {
        let mut results = self.execute_transaction(vec![statement]).await?;
        Ok(results.pop().unwrap_or_default())
    }

    /// Run statements in order on a single connection, all or nothing.
    ///
    /// Returns one row set per statement. The first failure rolls back every
    /// earlier statement and is returned as-is. Dropping the returned future
    /// does not cancel the work.
    pub async fn execute_transaction(
        &self,
        statements: Vec<Statement>,
    ) -> Result<Vec<Vec<Row>>, DbError> {
        let task = tokio::spawn(run_transaction(self.pool.clone(), statements));
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(DbError::query(None, format!("query task aborted: {}", e))),
        }
    }
}

async fn run_transaction(pool: Pool, statements: Vec<Statement>) -> Result<Vec<Vec<Row>>, DbError> {
    let mut lease = pool.acquire().await?;
    lease.begin().await?;

    let mut results = Vec::with_capacity(statements.len());
    for statement in &statements {
        tracing::debug!(function = statement.function(), "executing statement");
        match lease.run(statement).await {
            Ok(rows) => results.push(rows),
            Err(e) => {
                tracing::debug!(
                    function = statement.function(),
                    error = %e,
                    "statement failed, rolling back"
                );
                rollback(&mut lease).await;
                return Err(e);
            }
        }
    }

    if let Err(e) = lease.commit().await {
        rollback(&mut lease).await;
        return Err(e);
    }
    Ok(results)
}

/// Best-effort rollback; the original failure is what the caller sees.
async fn rollback(lease: &mut Lease) {
    if let Err(e) = lease.rollback().await {
        tracing::warn!(error = %e, "rollback failed");
    }
}
