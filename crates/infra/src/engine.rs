//! Inventory transaction engine (application-level orchestration).
//!
//! The engine is the only entry point a request layer calls. It validates
//! input, applies the inventory rules from `depot-inventory`, and drives the
//! store's unit of work so that a stock balance and its ledger entry are
//! committed together or not at all.
//!
//! ## Movement Flow
//!
//! ```text
//! MovementRequest
//!   ↓
//! 1. Validate (quantity > 0) and resolve the date default (acceptance time)
//!   ↓
//! 2. Begin unit of work
//!   ↓
//! 3. Read the product inside the unit of work (locks / version-tracks the row)
//!   ↓
//! 4. Decide the new balance (pure; rejects negative stock)
//!   ↓
//! 5. Stage balance + ledger entry, commit
//!   ↓
//! 6. On write conflict: retry from 2, bounded
//! ```
//!
//! Every public operation runs under the configured request deadline. When it
//! elapses the in-flight future is dropped, which rolls back any open unit of
//! work.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use depot_core::{DomainError, ProductId};
use depot_inventory::{
    AcceptedMovement, Admin, DateWindow, MovementRequest, NewProduct, Product, ProductPatch,
    Statistics, StockTransaction, apply_movement, reconciliation,
};

use crate::config::Config;
use crate::store::{LedgerStore, StoreError};

/// Caller-visible failure.
///
/// Storage detail never appears here; it is logged where the error is mapped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed input. Never retried.
    #[error("{0}")]
    InvalidArgument(String),

    /// Referenced product or admin does not exist.
    #[error("not found")]
    NotFound,

    /// An outbound movement would drive stock below zero.
    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i64, requested: i64 },

    /// Concurrent writers kept winning after all retries.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage unavailable")]
    StorageUnavailable,

    /// A broken internal invariant. Never caused by the caller's input.
    #[error("internal error")]
    Internal,

    /// The request deadline elapsed; nothing was committed.
    #[error("request cancelled: deadline exceeded")]
    Cancelled,
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => EngineError::NotFound,
            StoreError::ConstraintViolation(msg) => {
                warn!(detail = %msg, "constraint violation");
                EngineError::InvalidArgument("request violates a data constraint".to_string())
            }
            StoreError::Conflict(_) => {
                EngineError::Conflict("concurrent update, please retry".to_string())
            }
            StoreError::Unavailable(msg) | StoreError::Corrupt(msg) => {
                tracing::error!(detail = %msg, "storage failure");
                EngineError::StorageUnavailable
            }
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                EngineError::InvalidArgument(msg)
            }
            DomainError::InvariantViolation(msg) => {
                tracing::error!(detail = %msg, "invariant violated");
                EngineError::Internal
            }
            DomainError::InsufficientStock {
                available,
                requested,
            } => EngineError::InsufficientStock {
                available,
                requested,
            },
            DomainError::NotFound => EngineError::NotFound,
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
        }
    }
}

/// Engine tuning taken from [`Config`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_conflict_retries: u32,
    pub request_timeout: Duration,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_conflict_retries: config.max_conflict_retries,
            request_timeout: config.request_timeout,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Use-case layer over a [`LedgerStore`].
///
/// Holds no mutable state of its own; all shared state lives in the store,
/// so several engines (or processes) over one database stay correct.
#[derive(Debug)]
pub struct InventoryEngine<S> {
    store: S,
    settings: EngineSettings,
}

impl<S> InventoryEngine<S> {
    pub fn new(store: S, settings: EngineSettings) -> Self {
        Self { store, settings }
    }
}

impl<S> InventoryEngine<S>
where
    S: LedgerStore,
{
    pub async fn create_product(&self, product: NewProduct) -> Result<Product, EngineError> {
        product.validate()?;
        self.deadline(async {
            self.store.create_product(product).await.map_err(EngineError::from)
        })
        .await
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, EngineError> {
        self.deadline(async {
            self.store.get_product(id).await.map_err(EngineError::from)
        })
        .await
    }

    /// Edit descriptive fields. Quantity is not editable here; see
    /// [`InventoryEngine::reconcile_stock`].
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, EngineError> {
        patch.validate()?;
        self.deadline(async {
            self.store.update_product(id, patch).await.map_err(EngineError::from)
        })
        .await
    }

    pub async fn delete_product(&self, id: ProductId) -> Result<(), EngineError> {
        self.deadline(async {
            self.store.delete_product(id).await.map_err(EngineError::from)
        })
        .await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, EngineError> {
        self.deadline(async {
            self.store.list_products().await.map_err(EngineError::from)
        })
        .await
    }

    /// Validate and atomically apply one stock movement.
    #[instrument(
        skip(self, request),
        fields(product_id = %request.product_id, kind = %request.kind, quantity = request.quantity),
        err
    )]
    pub async fn apply_transaction(
        &self,
        request: MovementRequest,
    ) -> Result<StockTransaction, EngineError> {
        let accepted = request.accept(Utc::now())?;
        self.deadline(self.commit_with_retry(&accepted)).await
    }

    /// Bring a product to a physically counted quantity by recording the
    /// difference as a regular movement. Returns `None` if nothing changed.
    #[instrument(skip(self, note), fields(product_id = %product_id), err)]
    pub async fn reconcile_stock(
        &self,
        product_id: ProductId,
        counted: i64,
        note: &str,
    ) -> Result<Option<StockTransaction>, EngineError> {
        if counted < 0 {
            return Err(EngineError::InvalidArgument(
                "counted quantity cannot be negative".to_string(),
            ));
        }
        self.deadline(async {
            let mut attempt = 0;
            loop {
                match reconcile_atomic(&self.store, product_id, counted, note).await {
                    Err(EngineError::Conflict(msg))
                        if attempt < self.settings.max_conflict_retries =>
                    {
                        attempt += 1;
                        warn!(attempt, %msg, "retrying stock reconciliation");
                    }
                    other => return other,
                }
            }
        })
        .await
    }

    pub async fn list_transactions(
        &self,
        window: DateWindow,
    ) -> Result<Vec<StockTransaction>, EngineError> {
        self.deadline(async {
            self.store.list_transactions(window, None).await.map_err(EngineError::from)
        })
        .await
    }

    pub async fn list_product_transactions(
        &self,
        product_id: ProductId,
        window: DateWindow,
    ) -> Result<Vec<StockTransaction>, EngineError> {
        self.deadline(async {
            // Distinguish "unknown product" from "no movements".
            self.store.get_product(product_id).await?;
            let found = self
                .store
                .list_transactions(window, Some(product_id))
                .await?;
            Ok::<_, EngineError>(found)
        })
        .await
    }

    /// One scan of live products and one scan of the window's movements.
    ///
    /// The two scans are not a consistent cut; a movement committed between
    /// them can show up in one and not the other.
    #[instrument(skip(self), err)]
    pub async fn compute_statistics(&self, window: DateWindow) -> Result<Statistics, EngineError> {
        self.deadline(async {
            let products = self.store.list_products().await?;
            let transactions = self.store.list_transactions(window, None).await?;
            Ok::<_, EngineError>(Statistics::compute(&window, &products, &transactions))
        })
        .await
    }

    pub async fn get_admin_by_username(&self, username: &str) -> Result<Admin, EngineError> {
        self.deadline(async {
            self.store.get_admin_by_username(username).await.map_err(EngineError::from)
        })
        .await
    }

    async fn commit_with_retry(
        &self,
        movement: &AcceptedMovement,
    ) -> Result<StockTransaction, EngineError> {
        let mut attempt = 0;
        loop {
            match create_transaction_atomic(&self.store, movement).await {
                Err(EngineError::Conflict(msg)) if attempt < self.settings.max_conflict_retries => {
                    attempt += 1;
                    warn!(attempt, %msg, "retrying stock movement");
                }
                Err(EngineError::InsufficientStock {
                    available,
                    requested,
                }) => {
                    info!(available, requested, "movement rejected: insufficient stock");
                    return Err(EngineError::InsufficientStock {
                        available,
                        requested,
                    });
                }
                other => return other,
            }
        }
    }

    async fn deadline<T>(
        &self,
        operation: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<T, EngineError> {
        tokio::time::timeout(self.settings.request_timeout, operation)
            .await
            .map_err(|_| {
                warn!(timeout = ?self.settings.request_timeout, "request deadline exceeded");
                EngineError::Cancelled
            })?
    }
}

/// Apply one accepted movement in a single unit of work.
///
/// Reads the product inside the unit of work, decides the new balance,
/// and commits the balance together with the ledger entry. Any failure
/// rolls back both.
pub async fn create_transaction_atomic<S>(
    store: &S,
    movement: &AcceptedMovement,
) -> Result<StockTransaction, EngineError>
where
    S: LedgerStore + ?Sized,
{
    let mut uow = store.begin().await?;

    let product = match uow.product_for_update(movement.product_id).await {
        Ok(p) => p,
        Err(e) => {
            let _ = uow.rollback().await;
            return Err(e.into());
        }
    };

    let (updated, record) = match apply_movement(&product, movement, Utc::now()) {
        Ok(decided) => decided,
        Err(e) => {
            let _ = uow.rollback().await;
            return Err(e.into());
        }
    };

    if let Err(e) = uow.record_movement(&updated, &record).await {
        let _ = uow.rollback().await;
        return Err(e.into());
    }
    uow.commit().await?;

    Ok(record)
}

async fn reconcile_atomic<S>(
    store: &S,
    product_id: ProductId,
    counted: i64,
    note: &str,
) -> Result<Option<StockTransaction>, EngineError>
where
    S: LedgerStore + ?Sized,
{
    let mut uow = store.begin().await?;

    let product = match uow.product_for_update(product_id).await {
        Ok(p) => p,
        Err(e) => {
            let _ = uow.rollback().await;
            return Err(e.into());
        }
    };

    let now = Utc::now();
    let decided = reconciliation(&product, counted, note, now)
        .and_then(|m| m.map(|m| apply_movement(&product, &m, now)).transpose());
    let (updated, record) = match decided {
        Ok(Some(decided)) => decided,
        Ok(None) => {
            let _ = uow.rollback().await;
            return Ok(None);
        }
        Err(e) => {
            let _ = uow.rollback().await;
            return Err(e.into());
        }
    };

    if let Err(e) = uow.record_movement(&updated, &record).await {
        let _ = uow.rollback().await;
        return Err(e.into());
    }
    uow.commit().await?;

    Ok(Some(record))
}
