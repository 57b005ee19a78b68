use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use depot_core::{AdminId, AggregateRoot, Entity, ExpectedVersion, ProductId};
use depot_inventory::{Admin, DateWindow, NewProduct, Product, ProductPatch, StockTransaction};

use super::r#trait::{LedgerStore, StoreError, UnitOfWork};

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    transactions: Vec<StockTransaction>,
    admins: HashMap<String, Admin>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Not optimized for performance.
///
/// Units of work use optimistic concurrency: they remember the version of
/// every product they read and the commit is rejected with
/// [`StoreError::Conflict`] if any of those rows changed meanwhile.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tables: RwLock<Tables>,
    fail_next_commit: AtomicBool,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an admin account.
    pub fn insert_admin(
        &self,
        username: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Result<Admin, StoreError> {
        let username = username.into();
        let mut tables = self.write()?;
        if tables.admins.contains_key(&username) {
            return Err(StoreError::ConstraintViolation(format!(
                "admin '{username}' already exists"
            )));
        }
        let admin = Admin {
            id: AdminId::new(),
            username: username.clone(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        };
        tables.admins.insert(username, admin.clone());
        Ok(admin)
    }

    /// Make the next unit-of-work commit fail after validation, as if the
    /// ledger insert had been rejected by the backend.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Every ledger entry ever committed, in commit order.
    pub fn ledger_len(&self) -> usize {
        self.tables.read().map(|t| t.transactions.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

fn live(tables: &Tables, id: ProductId) -> Result<&Product, StoreError> {
    tables
        .products
        .get(&id)
        .filter(|p| !p.is_deleted())
        .ok_or(StoreError::NotFound)
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        product.validate()?;
        let product = product.into_product(ProductId::new(), Utc::now());
        self.write()?.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        live(&*self.read()?, id).cloned()
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, StoreError> {
        patch.validate()?;
        let mut tables = self.write()?;
        live(&tables, id)?;
        let product = tables.products.get_mut(&id).ok_or(StoreError::NotFound)?;
        patch.apply_to(product, Utc::now());
        product.version += 1;
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        live(&tables, id)?;
        if let Some(product) = tables.products.get_mut(&id) {
            let now = Utc::now();
            product.deleted_at = Some(now);
            product.updated_at = now;
            product.version += 1;
        }
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let tables = self.read()?;
        let mut products: Vec<Product> = tables
            .products
            .values()
            .filter(|p| !p.is_deleted())
            .cloned()
            .collect();
        products.sort_by_key(|p| (p.created_at, p.id));
        Ok(products)
    }

    async fn list_transactions(
        &self,
        window: DateWindow,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let tables = self.read()?;
        let mut found: Vec<StockTransaction> = tables
            .transactions
            .iter()
            .filter(|t| window.contains(t.date))
            .filter(|t| product_id.is_none_or(|id| t.product_id == id))
            .cloned()
            .collect();
        found.sort_by_key(|t| (t.date, t.created_at));
        Ok(found)
    }

    async fn get_admin_by_username(&self, username: &str) -> Result<Admin, StoreError> {
        self.read()?
            .admins
            .get(username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        Ok(Box::new(InMemoryUnitOfWork {
            store: self,
            read_versions: HashMap::new(),
            staged: Vec::new(),
        }))
    }
}

/// Unit of work over [`InMemoryLedgerStore`]. Writes are staged locally
/// and applied under a single write lock on commit.
struct InMemoryUnitOfWork<'a> {
    store: &'a InMemoryLedgerStore,
    read_versions: HashMap<ProductId, ExpectedVersion>,
    staged: Vec<(Product, StockTransaction)>,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork<'_> {
    async fn product_for_update(&mut self, id: ProductId) -> Result<Product, StoreError> {
        let product = live(&*self.store.read()?, id)?.clone();
        self.read_versions
            .insert(*product.id(), ExpectedVersion::of(&product));
        Ok(product)
    }

    async fn record_movement(
        &mut self,
        product: &Product,
        transaction: &StockTransaction,
    ) -> Result<(), StoreError> {
        if !self.read_versions.contains_key(product.id()) {
            return Err(StoreError::ConstraintViolation(
                "product was not read in this unit of work".to_string(),
            ));
        }
        if transaction.product_id != *product.id() {
            return Err(StoreError::ConstraintViolation(
                "transaction references a different product".to_string(),
            ));
        }
        if product.quantity < 0 {
            return Err(StoreError::ConstraintViolation(
                "quantity cannot be negative".to_string(),
            ));
        }
        self.staged.push((product.clone(), transaction.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let store = self.store;
        let mut tables = store.write()?;

        // Validate everything before touching anything.
        for (id, expected) in &self.read_versions {
            let current = live(&tables, *id).map_err(|_| {
                StoreError::Conflict(format!("product {id} was deleted concurrently"))
            })?;
            expected.check(current.version())?;
        }
        if store.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        for (product, transaction) in self.staged {
            if let Some(row) = tables.products.get_mut(&product.id) {
                row.quantity = product.quantity;
                row.updated_at = product.updated_at;
                row.version += 1;
            }
            tables.transactions.push(transaction);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
