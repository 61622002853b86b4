//! Document fetch by attribute value or document id.
//!
//! Every function here runs exactly one statement through the supplied
//! transaction and treats an empty result as [`HelperError::NotFound`].
//! Nothing is retried; retry belongs to the driver running the transaction.

use serde_json::Value;

use crate::{
    error::{HelperError, Result},
    executor::{TransactionExecutor, execute_logged},
    statement,
};

/// Upper bound on the number of values accepted by [`get_by_key_attributes`].
pub const MAX_KEYS_TO_RETRIEVE: usize = 32;

/// Returns every document in `table_name` whose `key_attribute_name` equals
/// `key_attribute_value`.
///
/// # Errors
///
/// - [`HelperError::NotFound`] if no document matches.
/// - [`HelperError::Upstream`] if the statement fails.
#[tracing::instrument(skip(txn))]
pub async fn get_by_key_attribute<E>(
    txn: &E,
    table_name: &str,
    key_attribute_name: &str,
    key_attribute_value: &str,
) -> Result<Vec<Value>>
where
    E: TransactionExecutor + ?Sized,
{
    const OPERATION: &str = "getByKeyAttribute";

    let query = statement::select_by_attribute(table_name, key_attribute_name);
    let rows =
        execute_logged(txn, OPERATION, &query, &[Value::from(key_attribute_value)]).await?;

    if rows.is_empty() {
        return Err(HelperError::not_found(
            OPERATION,
            format!("Unable to find document with Key: {key_attribute_value}."),
        ));
    }
    Ok(rows)
}

/// Rejects an empty key list or one longer than [`MAX_KEYS_TO_RETRIEVE`].
pub(crate) fn check_key_count(count: usize) -> Result<()> {
    const OPERATION: &str = "getByKeyAttributes";

    if count == 0 {
        return Err(HelperError::validation(OPERATION, "At least one key value is required."));
    }
    if count > MAX_KEYS_TO_RETRIEVE {
        return Err(HelperError::validation(
            OPERATION,
            format!("Cannot retrieve more than {MAX_KEYS_TO_RETRIEVE} keys at a time, got {count}."),
        ));
    }
    Ok(())
}

/// Returns every document in `table_name` whose `key_attribute_name` is one
/// of `key_attribute_values`.
///
/// The list is checked before any statement runs: it must be non-empty and
/// hold at most [`MAX_KEYS_TO_RETRIEVE`] values.
///
/// # Errors
///
/// - [`HelperError::Validation`] if the list is empty or too long.
/// - [`HelperError::NotFound`] if no document matches.
/// - [`HelperError::Upstream`] if the statement fails.
#[tracing::instrument(skip(txn, key_attribute_values), fields(keys = key_attribute_values.len()))]
pub async fn get_by_key_attributes<E, S>(
    txn: &E,
    table_name: &str,
    key_attribute_name: &str,
    key_attribute_values: &[S],
) -> Result<Vec<Value>>
where
    E: TransactionExecutor + ?Sized,
    S: AsRef<str> + Sync,
{
    const OPERATION: &str = "getByKeyAttributes";

    check_key_count(key_attribute_values.len())?;

    let parameters: Vec<Value> =
        key_attribute_values.iter().map(|v| Value::from(v.as_ref())).collect();
    let query =
        statement::select_by_attributes(table_name, key_attribute_name, parameters.len());
    let rows = execute_logged(txn, OPERATION, &query, &parameters).await?;

    if rows.is_empty() {
        let keys: Vec<&str> = key_attribute_values.iter().map(AsRef::as_ref).collect();
        return Err(HelperError::not_found(
            OPERATION,
            format!("Unable to find documents with Keys: {}.", keys.join(",")),
        ));
    }
    Ok(rows)
}

/// Returns the document in `table_name` with the ledger-assigned id
/// `document_id`.
///
/// # Errors
///
/// - [`HelperError::NotFound`] if the id does not exist.
/// - [`HelperError::Upstream`] if the statement fails.
#[tracing::instrument(skip(txn))]
pub async fn get_document_by_id<E>(
    txn: &E,
    table_name: &str,
    document_id: &str,
) -> Result<Vec<Value>>
where
    E: TransactionExecutor + ?Sized,
{
    const OPERATION: &str = "getDocumentById";

    let query = statement::select_by_id(table_name);
    let rows = execute_logged(txn, OPERATION, &query, &[Value::from(document_id)]).await?;

    if rows.is_empty() {
        return Err(HelperError::not_found(
            OPERATION,
            format!("Unable to find document Id: {document_id}."),
        ));
    }
    Ok(rows)
}

/// Returns the ledger-assigned ids of the documents in `table_name` whose
/// `key_attribute_name` equals `key_attribute_value`.
///
/// Rows without a string `id` field are skipped.
///
/// # Errors
///
/// - [`HelperError::NotFound`] if no id is returned.
/// - [`HelperError::Upstream`] if the statement fails.
#[tracing::instrument(skip(txn))]
pub async fn get_document_ids<E>(
    txn: &E,
    table_name: &str,
    key_attribute_name: &str,
    key_attribute_value: &str,
) -> Result<Vec<String>>
where
    E: TransactionExecutor + ?Sized,
{
    const OPERATION: &str = "getDocumentIds";

    let query = statement::select_ids_by_attribute(table_name, key_attribute_name);
    let rows =
        execute_logged(txn, OPERATION, &query, &[Value::from(key_attribute_value)]).await?;

    let ids: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_str).map(str::to_owned))
        .collect();
    if ids.len() < rows.len() {
        tracing::warn!(
            skipped = rows.len() - ids.len(),
            "result rows without a string id field"
        );
    }

    if ids.is_empty() {
        return Err(HelperError::not_found(
            OPERATION,
            format!("Unable to find document ids with Key: {key_attribute_value}."),
        ));
    }
    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        error::{ServiceError, ServiceErrorKind},
        testutil::MockExecutor,
    };

    #[tokio::test]
    async fn test_get_by_key_attribute_binds_value() {
        let row = json!({ "id": "doc-1", "VIN": "1N4AL11D75C109151" });
        let txn = MockExecutor::returning(vec![row.clone()]);

        let rows = get_by_key_attribute(&txn, "Vehicle", "VIN", "1N4AL11D75C109151")
            .await
            .unwrap();

        assert_eq!(rows, vec![row]);
        let calls = txn.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].statement, "SELECT * FROM Vehicle AS d BY id WHERE d.VIN = ?");
        assert_eq!(calls[0].parameters, vec![json!("1N4AL11D75C109151")]);
    }

    #[tokio::test]
    async fn test_get_by_key_attribute_empty_is_not_found() {
        let txn = MockExecutor::returning(vec![]);

        let err = get_by_key_attribute(&txn, "Vehicle", "VIN", "missing").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "[getByKeyAttribute] Unable to find document with Key: missing."
        );
    }

    #[tokio::test]
    async fn test_get_by_key_attribute_upstream_failure() {
        let txn = MockExecutor::failing(ServiceError::new(ServiceErrorKind::Transport, "reset"));

        let err = get_by_key_attribute(&txn, "Vehicle", "VIN", "x").await.unwrap_err();

        assert_eq!(err.service_kind(), Some(ServiceErrorKind::Transport));
        assert_eq!(err.operation(), Some("getByKeyAttribute"));
    }

    #[tokio::test]
    async fn test_get_by_key_attributes_builds_in_list() {
        let txn = MockExecutor::returning(vec![json!({ "id": "a" }), json!({ "id": "b" })]);

        let rows = get_by_key_attributes(&txn, "Person", "GovId", &["P1", "P2", "P3"])
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        let calls = txn.calls();
        assert_eq!(calls[0].statement, "SELECT * FROM Person AS d BY id WHERE d.GovId IN [?, ?, ?]");
        assert_eq!(calls[0].parameters, vec![json!("P1"), json!("P2"), json!("P3")]);
    }

    #[tokio::test]
    async fn test_get_by_key_attributes_over_limit_makes_no_call() {
        let txn = MockExecutor::returning(vec![json!({ "id": "a" })]);
        let keys: Vec<String> = (0..=MAX_KEYS_TO_RETRIEVE).map(|i| format!("k{i}")).collect();

        let err = get_by_key_attributes(&txn, "Person", "GovId", keys.as_slice()).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(txn.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_by_key_attributes_at_limit_is_accepted() {
        let txn = MockExecutor::returning(vec![json!({ "id": "a" })]);
        let keys: Vec<String> = (0..MAX_KEYS_TO_RETRIEVE).map(|i| format!("k{i}")).collect();

        get_by_key_attributes(&txn, "Person", "GovId", keys.as_slice()).await.unwrap();

        assert_eq!(txn.calls()[0].parameters.len(), MAX_KEYS_TO_RETRIEVE);
    }

    #[tokio::test]
    async fn test_get_by_key_attributes_empty_list_makes_no_call() {
        let txn = MockExecutor::returning(vec![]);

        let err =
            get_by_key_attributes::<_, &str>(&txn, "Person", "GovId", &[]).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(txn.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_by_key_attributes_no_match_lists_keys() {
        let txn = MockExecutor::returning(vec![]);

        let err = get_by_key_attributes(&txn, "Person", "GovId", &["A", "B"]).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("Keys: A,B."), "{err}");
    }

    #[tokio::test]
    async fn test_get_document_by_id() {
        let txn = MockExecutor::returning(vec![json!({ "id": "doc-9", "Owner": "x" })]);

        let rows = get_document_by_id(&txn, "Vehicle", "doc-9").await.unwrap();

        assert_eq!(rows[0]["id"], "doc-9");
        assert_eq!(txn.calls()[0].statement, "SELECT * FROM Vehicle BY id WHERE id = ?");
    }

    #[tokio::test]
    async fn test_get_document_by_id_not_found() {
        let txn = MockExecutor::returning(vec![]);

        let err = get_document_by_id(&txn, "Vehicle", "nope").await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_document_ids_extracts_string_ids() {
        let txn = MockExecutor::returning(vec![
            json!({ "id": "first" }),
            json!({ "other": 1 }),
            json!({ "id": "second" }),
        ]);

        let ids = get_document_ids(&txn, "Vehicle", "VIN", "v").await.unwrap();

        assert_eq!(ids, vec!["first".to_owned(), "second".to_owned()]);
        assert_eq!(txn.calls()[0].statement, "SELECT id FROM Vehicle AS t BY id WHERE t.VIN = ?");
    }

    #[tokio::test]
    async fn test_get_document_ids_none_is_not_found() {
        let txn = MockExecutor::returning(vec![json!({ "unexpected": true })]);

        let err = get_document_ids(&txn, "Vehicle", "VIN", "v").await.unwrap_err();

        assert!(err.is_not_found());
    }
}
