//! The control-plane seam.
//!
//! Digest and revision requests go to the ledger's management API rather than
//! through a transaction. A [`ControlPlaneClient`] adapts whichever SDK client
//! the caller uses for that API.

use async_trait::async_trait;

use crate::{
    digest::{GetDigestRequest, GetDigestResponse},
    error::ServiceError,
    revision::{GetRevisionRequest, GetRevisionResponse},
};

/// Client for the ledger's control-plane API.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Requests the current journal digest of a ledger.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the request fails.
    async fn get_digest(&self, request: GetDigestRequest)
    -> Result<GetDigestResponse, ServiceError>;

    /// Requests a document revision and its proof.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the request fails.
    async fn get_revision(
        &self,
        request: GetRevisionRequest,
    ) -> Result<GetRevisionResponse, ServiceError>;
}

#[async_trait]
impl<T: ControlPlaneClient + ?Sized> ControlPlaneClient for std::sync::Arc<T> {
    async fn get_digest(
        &self,
        request: GetDigestRequest,
    ) -> Result<GetDigestResponse, ServiceError> {
        (**self).get_digest(request).await
    }

    async fn get_revision(
        &self,
        request: GetRevisionRequest,
    ) -> Result<GetRevisionResponse, ServiceError> {
        (**self).get_revision(request).await
    }
}
