//! Query helpers for a managed, journal-based ledger database.
//!
//! This crate is a thin convenience layer over a ledger service's client SDK.
//! It builds parameterized query statements, runs them through a
//! caller-supplied transaction, and shapes the results. It also wraps the two
//! control-plane calls used for verification: the journal digest and a
//! document revision with its inclusion proof.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application code                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     LedgerHelper                            │
//! │   document fetch │ history fetch │ digest │ revision        │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │   LedgerDriver               │                              │
//! │   permits │ retry │ timeout  │                              │
//! ├──────────────────────────────┼──────────────────────────────┤
//! │   SessionClient              │   ControlPlaneClient         │
//! │   LedgerTransaction          │                              │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                   Ledger SDK / service                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The SDK is reached only through the traits in the third row, so any SDK
//! (or the mocks in `testutil`) can sit underneath.
//!
//! # Quick Start
//!
//! ```no_run
//! use ledger_helper::{
//!     ControlPlaneClient, DriverConfig, LedgerHelper, SessionClient, create_driver,
//! };
//!
//! async fn show_vehicle<C, P>(client: C, control: P) -> Result<(), Box<dyn std::error::Error>>
//! where
//!     C: SessionClient,
//!     P: ControlPlaneClient,
//! {
//!     let config = DriverConfig::builder().ledger_name("vehicle-registration").build()?;
//!     let helper = LedgerHelper::new(create_driver(config, client)?, control);
//!
//!     let vehicles = helper.get_by_key_attribute("Vehicle", "VIN", "1N4AL11D75C109151").await?;
//!     let digest = helper.get_ledger_digest().await?;
//!     println!("{} vehicle(s), digest {}", vehicles.len(), digest.digest_hex());
//!     Ok(())
//! }
//! ```
//!
//! # Errors
//!
//! Every operation returns [`HelperError`], which is one of not-found,
//! validation, upstream (carrying a [`ServiceErrorKind`]) or configuration.
//! Helper functions never retry. [`LedgerDriver::execute`] re-runs a whole
//! transaction when the failure is transient.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob;
pub mod config;
pub mod control;
pub mod digest;
pub mod document;
pub mod driver;
pub mod error;
pub mod executor;
pub mod helper;
pub mod history;
pub mod ion;
mod retry;
pub mod revision;
pub mod statement;

/// Scripted SDK stand-ins for tests.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

/// Configuration types and default constants for the driver.
pub use config::{
    ConfigError, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF,
    DEFAULT_MAX_CONCURRENT_TRANSACTIONS, DEFAULT_MAX_RETRIES, DEFAULT_TRANSACTION_TIMEOUT,
    DriverConfig, RetryConfig,
};
/// Control-plane seam.
pub use control::ControlPlaneClient;
/// Digest fetch.
pub use digest::{GetDigestRequest, GetDigestResponse, get_ledger_digest};
/// Document fetch.
pub use document::{
    MAX_KEYS_TO_RETRIEVE, get_by_key_attribute, get_by_key_attributes, get_document_by_id,
    get_document_ids,
};
/// Driver factory and transaction seams.
pub use driver::{LedgerDriver, LedgerTransaction, SessionClient, create_driver};
/// Error types and result alias.
pub use error::{BoxError, HelperError, Result, ServiceError, ServiceErrorKind};
/// Statement execution seam.
pub use executor::TransactionExecutor;
/// Facade over driver and control plane.
pub use helper::LedgerHelper;
/// Document history fetch.
pub use history::{get_document_history, get_document_revision_by_id_and_block};
/// Ion payload types.
pub use ion::{BlockAddress, IonReadError, ValueHolder};
/// Revision fetch.
pub use revision::{GetRevisionRequest, GetRevisionResponse, get_revision};
