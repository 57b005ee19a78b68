use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use depot_core::{DomainError, ProductId};
use depot_inventory::{Admin, DateWindow, NewProduct, Product, ProductPatch, StockTransaction};

/// Ledger store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, integrity) as
/// opposed to domain errors. Messages may carry backend detail; the engine
/// strips it before anything reaches a caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A concurrent writer committed first (stale version, serialization failure).
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NotFound => StoreError::NotFound,
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            other => StoreError::ConstraintViolation(other.to_string()),
        }
    }
}

/// Durable storage for products, the movement ledger and admin credentials.
///
/// ## Write Semantics
///
/// Every method except [`LedgerStore::begin`] touches a single record and is
/// committed before it returns. Stock movements span two records (the product
/// balance and the ledger entry), so they only go through a [`UnitOfWork`].
///
/// ## Soft Deletion
///
/// Deleted products stay in storage so historical transactions keep their
/// reference, but every read here excludes them.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a new product with a generated id and timestamps.
    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError>;

    /// Apply only the fields set in `patch`.
    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, StoreError>;

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError>;

    /// Live products, oldest first.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Ledger entries with a movement date in `window`, optionally for one product.
    ///
    /// Ordered by movement date, then creation time.
    async fn list_transactions(
        &self,
        window: DateWindow,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockTransaction>, StoreError>;

    async fn get_admin_by_username(&self, username: &str) -> Result<Admin, StoreError>;

    /// Open an all-or-nothing unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError>;
}

/// A bounded set of writes that commit or roll back together.
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] discards
/// everything staged in it.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Read a live product and claim it for this unit of work.
    ///
    /// Concurrent units that claim the same product serialize: either the
    /// backend blocks the second reader, or the later commit fails with
    /// [`StoreError::Conflict`].
    async fn product_for_update(&mut self, id: ProductId) -> Result<Product, StoreError>;

    /// Stage the new balance of a claimed product together with its ledger entry.
    async fn record_movement(
        &mut self,
        product: &Product,
        transaction: &StockTransaction,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        (**self).create_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        (**self).get_product(id).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, StoreError> {
        (**self).update_product(id, patch).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        (**self).delete_product(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list_products().await
    }

    async fn list_transactions(
        &self,
        window: DateWindow,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        (**self).list_transactions(window, product_id).await
    }

    async fn get_admin_by_username(&self, username: &str) -> Result<Admin, StoreError> {
        (**self).get_admin_by_username(username).await
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        (**self).begin().await
    }
}
