//! One-stop facade over a driver and a control-plane client.

use serde_json::Value;

use crate::{
    control::ControlPlaneClient,
    digest::{self, GetDigestResponse},
    document,
    driver::{LedgerDriver, SessionClient},
    error::Result,
    history,
    ion::ValueHolder,
    revision::{self, GetRevisionResponse},
};

/// Runs every helper operation against one ledger.
///
/// Query operations each run in their own transaction through the driver,
/// and so inherit its concurrency limit, retry policy and timeout.
/// Digest and revision requests go straight to the control-plane client.
///
/// For several queries in one transaction, call the free functions in
/// [`document`](crate::document) and [`history`](crate::history) from inside
/// [`LedgerDriver::execute`].
pub struct LedgerHelper<C, P> {
    driver: LedgerDriver<C>,
    control: P,
}

impl<C, P: Clone> Clone for LedgerHelper<C, P> {
    fn clone(&self) -> Self {
        Self { driver: self.driver.clone(), control: self.control.clone() }
    }
}

impl<C, P> std::fmt::Debug for LedgerHelper<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerHelper").field("driver", &self.driver).finish_non_exhaustive()
    }
}

impl<C, P> LedgerHelper<C, P>
where
    C: SessionClient,
    P: ControlPlaneClient,
{
    /// Creates a helper from an existing driver and control-plane client.
    pub fn new(driver: LedgerDriver<C>, control: P) -> Self {
        Self { driver, control }
    }

    /// Returns the ledger this helper works against.
    #[must_use]
    pub fn ledger_name(&self) -> &str {
        self.driver.ledger_name()
    }

    /// Returns the driver queries run through.
    #[must_use]
    pub fn driver(&self) -> &LedgerDriver<C> {
        &self.driver
    }

    /// Returns the control-plane client.
    #[must_use]
    pub fn control(&self) -> &P {
        &self.control
    }

    /// See [`digest::get_ledger_digest`].
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::Upstream`](crate::HelperError::Upstream) if the
    /// control-plane call fails.
    pub async fn get_ledger_digest(&self) -> Result<GetDigestResponse> {
        digest::get_ledger_digest(self.ledger_name(), &self.control).await
    }

    /// See [`revision::get_revision`].
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::Upstream`](crate::HelperError::Upstream) if the
    /// control-plane call fails.
    pub async fn get_revision(
        &self,
        document_id: &str,
        block_address: &ValueHolder,
        digest_tip_address: &ValueHolder,
    ) -> Result<GetRevisionResponse> {
        revision::get_revision(
            self.ledger_name(),
            document_id,
            block_address,
            digest_tip_address,
            &self.control,
        )
        .await
    }

    /// See [`document::get_by_key_attribute`].
    ///
    /// # Errors
    ///
    /// Not-found, or any transaction failure the driver could not retry away.
    pub async fn get_by_key_attribute(
        &self,
        table_name: &str,
        key_attribute_name: &str,
        key_attribute_value: &str,
    ) -> Result<Vec<Value>> {
        self.driver
            .execute(move |txn| async move {
                document::get_by_key_attribute(
                    &*txn,
                    table_name,
                    key_attribute_name,
                    key_attribute_value,
                )
                .await
            })
            .await
    }

    /// See [`document::get_by_key_attributes`]. The key list is checked
    /// before a transaction is opened.
    ///
    /// # Errors
    ///
    /// Validation, not-found, or any transaction failure the driver could
    /// not retry away.
    pub async fn get_by_key_attributes<S>(
        &self,
        table_name: &str,
        key_attribute_name: &str,
        key_attribute_values: &[S],
    ) -> Result<Vec<Value>>
    where
        S: AsRef<str> + Sync,
    {
        document::check_key_count(key_attribute_values.len())?;
        self.driver
            .execute(move |txn| async move {
                document::get_by_key_attributes(
                    &*txn,
                    table_name,
                    key_attribute_name,
                    key_attribute_values,
                )
                .await
            })
            .await
    }

    /// See [`document::get_document_by_id`].
    ///
    /// # Errors
    ///
    /// Not-found, or any transaction failure the driver could not retry away.
    pub async fn get_document_by_id(
        &self,
        table_name: &str,
        document_id: &str,
    ) -> Result<Vec<Value>> {
        self.driver
            .execute(move |txn| async move {
                document::get_document_by_id(&*txn, table_name, document_id).await
            })
            .await
    }

    /// See [`document::get_document_ids`].
    ///
    /// # Errors
    ///
    /// Not-found, or any transaction failure the driver could not retry away.
    pub async fn get_document_ids(
        &self,
        table_name: &str,
        key_attribute_name: &str,
        key_attribute_value: &str,
    ) -> Result<Vec<String>> {
        self.driver
            .execute(move |txn| async move {
                document::get_document_ids(&*txn, table_name, key_attribute_name, key_attribute_value)
                    .await
            })
            .await
    }

    /// See [`history::get_document_revision_by_id_and_block`].
    ///
    /// # Errors
    ///
    /// Validation, not-found, or any transaction failure the driver could
    /// not retry away.
    pub async fn get_document_revision_by_id_and_block(
        &self,
        table_name: &str,
        document_id: &str,
        block_address: &ValueHolder,
    ) -> Result<Value> {
        self.driver
            .execute(move |txn| async move {
                history::get_document_revision_by_id_and_block(
                    &*txn,
                    table_name,
                    document_id,
                    block_address,
                )
                .await
            })
            .await
    }

    /// See [`history::get_document_history`].
    ///
    /// # Errors
    ///
    /// Not-found, or any transaction failure the driver could not retry away.
    pub async fn get_document_history(
        &self,
        table_name: &str,
        key_attribute_name: &str,
        key_attribute_value: &str,
    ) -> Result<Vec<Value>> {
        self.driver
            .execute(move |txn| async move {
                history::get_document_history(
                    &*txn,
                    table_name,
                    key_attribute_name,
                    key_attribute_value,
                )
                .await
            })
            .await
    }
}
