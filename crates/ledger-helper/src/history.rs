//! Document history fetch.
//!
//! Queries run against the `history()` view of a table, where each row is one
//! committed revision carrying `blockAddress`, `data` and `metadata`
//! (`metadata.id` is the document id, `metadata.version` its revision number).

use serde_json::Value;

use crate::{
    document::get_document_ids,
    error::{HelperError, Result},
    executor::{TransactionExecutor, execute_logged},
    ion::{BlockAddress, ValueHolder},
    statement,
};

/// Returns the revision of `document_id` committed in the block at
/// `block_address`.
///
/// Only the block's sequence number is used to filter; the strand id is
/// ignored.
///
/// # Errors
///
/// - [`HelperError::Validation`] if `block_address` is not a readable block address.
/// - [`HelperError::NotFound`] if no revision matches.
/// - [`HelperError::Upstream`] if the statement fails.
#[tracing::instrument(skip(txn, block_address))]
pub async fn get_document_revision_by_id_and_block<E>(
    txn: &E,
    table_name: &str,
    document_id: &str,
    block_address: &ValueHolder,
) -> Result<Value>
where
    E: TransactionExecutor + ?Sized,
{
    const OPERATION: &str = "getDocumentRevisionByIdAndBlock";

    let address = BlockAddress::from_value_holder(block_address).map_err(|e| {
        HelperError::validation(OPERATION, format!("Invalid block address: {e}"))
    })?;
    let sequence_no = address.sequence_no;

    let query = statement::select_history_by_id_and_block(table_name);
    let rows = execute_logged(
        txn,
        OPERATION,
        &query,
        &[Value::from(document_id), Value::from(sequence_no)],
    )
    .await?;

    rows.into_iter().next().ok_or_else(|| {
        HelperError::not_found(
            OPERATION,
            format!(
                "Unable to find document with Id: {document_id} and Block Sequence Number: {sequence_no}"
            ),
        )
    })
}

/// Returns every committed revision of the document in `table_name` whose
/// `key_attribute_name` equals `key_attribute_value`.
///
/// The document id is resolved with [`get_document_ids`]; when several
/// documents match, the first id is used.
///
/// # Errors
///
/// - [`HelperError::NotFound`] if no document matches or it has no history.
/// - [`HelperError::Upstream`] if either statement fails.
///
/// Every error is tagged `getDocumentHistory`, including those from the id
/// lookup.
#[tracing::instrument(skip(txn))]
pub async fn get_document_history<E>(
    txn: &E,
    table_name: &str,
    key_attribute_name: &str,
    key_attribute_value: &str,
) -> Result<Vec<Value>>
where
    E: TransactionExecutor + ?Sized,
{
    const OPERATION: &str = "getDocumentHistory";

    let mut ids = get_document_ids(txn, table_name, key_attribute_name, key_attribute_value)
        .await
        .map_err(|e| e.with_operation(OPERATION))?;
    // `get_document_ids` reports an empty match as `NotFound`.
    let document_id = ids.swap_remove(0);

    let query = statement::select_history_by_id(table_name);
    let rows = execute_logged(txn, OPERATION, &query, &[Value::from(document_id.as_str())]).await?;

    if rows.is_empty() {
        return Err(HelperError::not_found(
            OPERATION,
            format!("Unable to find document history with Id: {document_id}"),
        ));
    }
    Ok(rows)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        error::{ServiceError, ServiceErrorKind},
        testutil::{MemoryLedger, MockExecutor},
    };

    #[tokio::test]
    async fn test_revision_query_binds_id_and_sequence_number() {
        let row = json!({ "metadata": { "id": "doc", "version": 1 } });
        let txn = MockExecutor::returning(vec![row.clone(), json!({ "second": true })]);
        let block = ValueHolder::new("{strandId:\"KHtn8Ay2QuS4f1E7PLbvbL\",sequenceNo:33}");

        let revision =
            get_document_revision_by_id_and_block(&txn, "Vehicle", "doc", &block).await.unwrap();

        assert_eq!(revision, row);
        let calls = txn.calls();
        assert_eq!(
            calls[0].statement,
            "SELECT * FROM history( Vehicle ) AS h WHERE h.metadata.id = ? AND h.blockAddress.sequenceNo = ?"
        );
        assert_eq!(calls[0].parameters, vec![json!("doc"), json!(33)]);
    }

    #[tokio::test]
    async fn test_malformed_block_address_is_validation_error() {
        let txn = MockExecutor::returning(vec![json!({})]);
        let block = ValueHolder::new("not ion");

        let err =
            get_document_revision_by_id_and_block(&txn, "Vehicle", "doc", &block).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(txn.call_count(), 0);
    }

    #[tokio::test]
    async fn test_revision_not_found() {
        let txn = MockExecutor::returning(vec![]);
        let block = ValueHolder::from(&BlockAddress::new("s", 4));

        let err =
            get_document_revision_by_id_and_block(&txn, "Vehicle", "doc", &block).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("Block Sequence Number: 4"), "{err}");
    }

    #[tokio::test]
    async fn test_history_returns_every_revision() {
        let ledger = MemoryLedger::new();
        let id = ledger.insert("Vehicle", json!({ "VIN": "V1", "Color": "red" }));
        ledger.update("Vehicle", &id, json!({ "VIN": "V1", "Color": "blue" }));
        ledger.update("Vehicle", &id, json!({ "VIN": "V1", "Color": "green" }));
        ledger.insert("Vehicle", json!({ "VIN": "V2", "Color": "black" }));

        let history = get_document_history(&ledger, "Vehicle", "VIN", "V1").await.unwrap();

        let versions: Vec<u64> =
            history.iter().map(|h| h["metadata"]["version"].as_u64().unwrap()).collect();
        assert_eq!(versions, vec![0, 1, 2]);
        assert!(history.iter().all(|h| h["metadata"]["id"] == json!(id)));
    }

    #[tokio::test]
    async fn test_history_for_unknown_key_is_not_found() {
        let ledger = MemoryLedger::new();
        ledger.insert("Vehicle", json!({ "VIN": "V1" }));

        let err = get_document_history(&ledger, "Vehicle", "VIN", "nope").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.operation(), Some("getDocumentHistory"));
    }

    #[tokio::test]
    async fn test_history_id_lookup_failure_is_tagged_with_history() {
        let ledger = MemoryLedger::new();
        ledger.insert("Vehicle", json!({ "VIN": "V1" }));
        ledger.fail_next_execute(ServiceError::new(ServiceErrorKind::Transport, "reset"));

        let err = get_document_history(&ledger, "Vehicle", "VIN", "V1").await.unwrap_err();

        assert_eq!(err.operation(), Some("getDocumentHistory"));
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::Transport));
    }

    #[tokio::test]
    async fn test_revision_lookup_against_memory_ledger() {
        let ledger = MemoryLedger::new();
        let id = ledger.insert("Vehicle", json!({ "VIN": "V1", "Color": "red" }));
        let block = ledger.update("Vehicle", &id, json!({ "VIN": "V1", "Color": "blue" }));

        let revision = get_document_revision_by_id_and_block(
            &ledger,
            "Vehicle",
            &id,
            &ValueHolder::from(&block),
        )
        .await
        .unwrap();

        assert_eq!(revision["data"]["Color"], "blue");
        assert_eq!(revision["metadata"]["version"], 1);
    }
}
