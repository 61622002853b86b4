//! Driver factory and transaction runner.
//!
//! A [`LedgerDriver`] pairs a [`DriverConfig`] with the caller's
//! [`SessionClient`]. Session pooling and the wire protocol stay inside the
//! client; the driver only decides how many transactions run at once, runs
//! the caller's body between start and commit/abort, and re-runs the whole
//! transaction on transient failures.
//!
//! ```text
//! execute(body)
//!   acquire permit ──► start_transaction ──► body(txn) ──► commit
//!        │                                       │
//!        │                                       └─ Err / timeout ──► abort
//!        └──────────── retry on transient error ◄─────────────┘
//! ```

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::{Mutex, Semaphore},
    time::Instant,
};

use crate::{
    config::DriverConfig,
    error::{HelperError, Result, ServiceError, ServiceErrorKind},
    executor::TransactionExecutor,
    retry::with_retry,
};

const OPERATION: &str = "executeTransaction";

/// An open transaction, as handed out by a [`SessionClient`].
#[async_trait]
pub trait LedgerTransaction: TransactionExecutor {
    /// Identifier assigned by the service.
    fn transaction_id(&self) -> &str;

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the commit is rejected, e.g. on an
    /// optimistic concurrency conflict.
    async fn commit(&self) -> std::result::Result<(), ServiceError>;

    /// Abandons the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the service could not be told.
    async fn abort(&self) -> std::result::Result<(), ServiceError>;
}

/// Source of transactions for one or more ledgers.
///
/// Implementations wrap an SDK's pooled session client.
#[async_trait]
pub trait SessionClient: Send + Sync + 'static {
    /// Transaction type this client produces.
    type Transaction: LedgerTransaction + 'static;

    /// Opens a transaction against `ledger_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if no session could be obtained.
    async fn start_transaction(
        &self,
        ledger_name: &str,
    ) -> std::result::Result<Self::Transaction, ServiceError>;
}

/// Creates a driver for the ledger named in `config`.
///
/// # Errors
///
/// Returns [`HelperError::Config`] if `config` is invalid.
///
/// # Example
///
/// ```no_run
/// # use ledger_helper::{DriverConfig, SessionClient, create_driver, get_by_key_attribute};
/// # async fn example<C: SessionClient>(client: C) -> Result<(), Box<dyn std::error::Error>> {
/// let config = DriverConfig::builder().ledger_name("vehicle-registration").build()?;
/// let driver = create_driver(config, client)?;
///
/// let vehicles = driver
///     .execute(move |txn| async move {
///         get_by_key_attribute(&*txn, "Vehicle", "VIN", "1N4AL11D75C109151").await
///     })
///     .await?;
/// # let _ = vehicles;
/// # Ok(())
/// # }
/// ```
pub fn create_driver<C: SessionClient>(config: DriverConfig, client: C) -> Result<LedgerDriver<C>> {
    LedgerDriver::new(config, Arc::new(client))
}

/// Runs transactions against one ledger.
///
/// Cloning is cheap; clones share the client and the permit pool.
pub struct LedgerDriver<C> {
    config: Arc<DriverConfig>,
    client: Arc<C>,
    permits: Arc<Semaphore>,
}

impl<C> Clone for LedgerDriver<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            client: Arc::clone(&self.client),
            permits: Arc::clone(&self.permits),
        }
    }
}

impl<C> std::fmt::Debug for LedgerDriver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerDriver")
            .field("ledger_name", &self.config.ledger_name())
            .field("available_permits", &self.permits.available_permits())
            .field("closed", &self.permits.is_closed())
            .finish_non_exhaustive()
    }
}

impl<C: SessionClient> LedgerDriver<C> {
    /// Creates a driver sharing an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::Config`] if `config` is invalid.
    pub fn new(config: DriverConfig, client: Arc<C>) -> Result<Self> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_transactions()));
        tracing::debug!(
            ledger_name = config.ledger_name(),
            max_concurrent_transactions = config.max_concurrent_transactions(),
            "created ledger driver"
        );
        Ok(Self { config: Arc::new(config), client, permits })
    }

    /// Returns the ledger this driver runs against.
    #[must_use]
    pub fn ledger_name(&self) -> &str {
        self.config.ledger_name()
    }

    /// Returns the driver configuration.
    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Returns the underlying session client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns how many more transactions may start right now.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stops accepting new transactions. Transactions already running finish
    /// normally.
    pub fn close(&self) {
        self.permits.close();
        tracing::debug!(ledger_name = self.ledger_name(), "closed ledger driver");
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Runs `body` inside a transaction and commits it.
    ///
    /// `body` receives the open transaction and may run any number of
    /// statements through it. If `body` fails, times out or cannot be
    /// committed, the transaction is aborted and the error returned. If `body` or the commit fails transiently, the whole
    /// transaction, `body` included, is run again per the retry policy, so
    /// `body` must be safe to repeat.
    ///
    /// # Errors
    ///
    /// - Whatever `body` returns.
    /// - [`HelperError::Upstream`] if a transaction cannot be started or
    ///   committed, the driver is closed (`Shutdown`), or the transaction
    ///   timeout elapses (`Timeout`). The timeout starts before waiting for
    ///   a permit, and no attempt starts once it has passed.
    #[tracing::instrument(skip(self, body), fields(ledger_name = self.ledger_name()))]
    pub async fn execute<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnMut(Arc<C::Transaction>) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let deadline = self.config.transaction_timeout().map(Deadline::after);

        let _permit = within(deadline, self.permits.acquire()).await?.map_err(|_| {
            HelperError::upstream(OPERATION, ServiceErrorKind::Shutdown, "driver is closed")
        })?;

        let body = Mutex::new(body);
        let body = &body;
        with_retry(&self.config.retry, OPERATION, move || async move {
            let mut body = body.lock().await;
            self.run_once(&mut *body, deadline).await
        })
        .await
    }

    /// One attempt: start, run `body`, then commit. Every other exit from an
    /// open transaction aborts it.
    async fn run_once<F, Fut, T>(&self, body: &mut F, deadline: Option<Deadline>) -> Result<T>
    where
        F: FnMut(Arc<C::Transaction>) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let txn = within(deadline, self.client.start_transaction(self.ledger_name()))
            .await?
            .map(Arc::new)
            .map_err(|e| HelperError::from_service("startTransaction", e))?;

        let err = match within(deadline, body(Arc::clone(&txn))).await {
            Ok(Ok(value)) => match within(deadline, txn.commit()).await {
                Ok(Ok(())) => return Ok(value),
                Ok(Err(e)) => HelperError::from_service("commitTransaction", e),
                Err(elapsed) => elapsed,
            },
            Ok(Err(err)) | Err(err) => err,
        };

        if let Err(abort_err) = txn.abort().await {
            tracing::warn!(
                transaction_id = txn.transaction_id(),
                error = %abort_err,
                "failed to abort transaction",
            );
        }
        Err(err)
    }
}

/// Point in time by which an `execute` call must finish.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self { at: Instant::now() + timeout, timeout }
    }

    fn elapsed(self) -> HelperError {
        HelperError::upstream(
            OPERATION,
            ServiceErrorKind::Timeout,
            format!("transaction did not complete within {:?}", self.timeout),
        )
    }
}

/// Awaits `future` unless `deadline` passes first.
async fn within<F: Future>(deadline: Option<Deadline>, future: F) -> Result<F::Output> {
    let Some(deadline) = deadline else {
        return Ok(future.await);
    };
    if Instant::now() >= deadline.at {
        return Err(deadline.elapsed());
    }
    tokio::time::timeout_at(deadline.at, future).await.map_err(|_| deadline.elapsed())
}
