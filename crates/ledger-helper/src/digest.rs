//! Journal digest fetch.

use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    control::ControlPlaneClient,
    error::{HelperError, Result},
    ion::ValueHolder,
};

const OPERATION: &str = "getLedgerDigest";

/// Request for the current digest of a ledger's journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetDigestRequest {
    /// Ledger name.
    pub name: String,
}

/// The service's digest response, returned to callers unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetDigestResponse {
    /// Hash over the journal up to `digest_tip_address`.
    #[serde(with = "crate::blob")]
    pub digest: Bytes,
    /// Latest block covered by the digest.
    pub digest_tip_address: ValueHolder,
}

impl GetDigestResponse {
    /// Returns the digest as lowercase hex.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

/// Fetches the current digest of `ledger_name`'s journal.
///
/// # Errors
///
/// Returns [`HelperError::Upstream`] if the control-plane call fails.
#[tracing::instrument(skip(client))]
pub async fn get_ledger_digest<P>(ledger_name: &str, client: &P) -> Result<GetDigestResponse>
where
    P: ControlPlaneClient + ?Sized,
{
    let start = Instant::now();
    let request = GetDigestRequest { name: ledger_name.to_owned() };

    let result = client.get_digest(request).await;
    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "execution time");

    result.map_err(|e| HelperError::from_service(OPERATION, e))
}
