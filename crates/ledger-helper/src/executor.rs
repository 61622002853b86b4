//! The query-execution seam.
//!
//! A [`TransactionExecutor`] runs one statement inside a transaction the
//! driver has already opened. Implementations adapt a ledger SDK's
//! transaction object; the helpers in [`document`](crate::document) and
//! [`history`](crate::history) only ever see this trait.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{HelperError, Result, ServiceError};

/// Executes parameterized statements within an open transaction.
///
/// Parameters are bound positionally to the `?` placeholders of the
/// statement. Each result row is returned as the service's native document
/// value.
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// Executes `statement` with `parameters` and returns every result row.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the service rejects or fails the statement.
    async fn execute(
        &self,
        statement: &str,
        parameters: &[Value],
    ) -> std::result::Result<Vec<Value>, ServiceError>;
}

#[async_trait]
impl<T: TransactionExecutor + ?Sized> TransactionExecutor for std::sync::Arc<T> {
    async fn execute(
        &self,
        statement: &str,
        parameters: &[Value],
    ) -> std::result::Result<Vec<Value>, ServiceError> {
        (**self).execute(statement, parameters).await
    }
}

/// Runs one statement for `operation`, logging the statement and how long
/// the call took, and tags any failure with the operation name.
pub(crate) async fn execute_logged<E>(
    txn: &E,
    operation: &'static str,
    statement: &str,
    parameters: &[Value],
) -> Result<Vec<Value>>
where
    E: TransactionExecutor + ?Sized,
{
    tracing::debug!(operation, statement, "query statement");
    let start = Instant::now();

    let result = txn.execute(statement, parameters).await;
    tracing::debug!(
        operation,
        elapsed_ms = start.elapsed().as_millis() as u64,
        rows = result.as_ref().map_or(0, Vec::len),
        "execution time",
    );

    result.map_err(|e| HelperError::from_service(operation, e))
}
