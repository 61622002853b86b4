//! Document revision fetch, with inclusion proof.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{
    control::ControlPlaneClient,
    error::{HelperError, Result},
    ion::ValueHolder,
};

const OPERATION: &str = "getRevision";

/// Request for a document revision and the proof of its inclusion in the
/// journal up to a digest tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetRevisionRequest {
    /// Ledger name.
    pub name: String,
    /// Block holding the revision.
    pub block_address: ValueHolder,
    /// Ledger-assigned document id.
    pub document_id: String,
    /// Latest block covered by the digest the proof is computed against.
    pub digest_tip_address: ValueHolder,
}

/// The service's revision response, returned to callers unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetRevisionResponse {
    /// Hashes needed to recompute the digest from the revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ValueHolder>,
    /// The revision itself.
    pub revision: ValueHolder,
}

/// Fetches the revision of `document_id` stored at `block_address`, plus the
/// proof of its inclusion up to `digest_tip_address`.
///
/// No verification is done here; the proof is handed back as-is.
///
/// # Errors
///
/// Returns [`HelperError::Upstream`] if the control-plane call fails.
#[tracing::instrument(skip(block_address, digest_tip_address, client))]
pub async fn get_revision<P>(
    ledger_name: &str,
    document_id: &str,
    block_address: &ValueHolder,
    digest_tip_address: &ValueHolder,
    client: &P,
) -> Result<GetRevisionResponse>
where
    P: ControlPlaneClient + ?Sized,
{
    let start = Instant::now();
    let request = GetRevisionRequest {
        name: ledger_name.to_owned(),
        block_address: block_address.clone(),
        document_id: document_id.to_owned(),
        digest_tip_address: digest_tip_address.clone(),
    };

    let result = client.get_revision(request).await;
    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "execution time");

    result.map_err(|e| HelperError::from_service(OPERATION, e))
}
