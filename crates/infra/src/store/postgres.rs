//! Postgres-backed ledger store implementation.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `ConstraintViolation` | Duplicate id / username |
//! | Database (not-null / FK / check) | `23502` / `23503` / `23514` | `ConstraintViolation` | Missing field, dangling product reference, negative quantity |
//! | Database (serialization / deadlock) | `40001` / `40P01` | `Conflict` | Concurrent writer on the same product row |
//! | Database (other) | Any other | `Unavailable` | |
//! | RowNotFound | N/A | `NotFound` | |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Unavailable` | Backend unreachable |
//! | ColumnDecode / Decode | N/A | `Corrupt` | Row does not match the schema |
//!
//! ## Locking
//!
//! A unit of work reads its product with `SELECT ... FOR UPDATE`, so a second
//! movement on the same product blocks until the first commits or rolls back,
//! then sees the new balance. Movements on different products never contend.
//! The `version` guard on the UPDATE is a second line in case the row was
//! claimed without the lock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::instrument;

use depot_core::{AdminId, Money, ProductId, TransactionId};
use depot_inventory::{
    Admin, DateWindow, MovementKind, NewProduct, Product, ProductPatch, StockTransaction,
};

use super::r#trait::{LedgerStore, StoreError, UnitOfWork};
use crate::config::Config;

/// Schema applied by [`PostgresLedgerStore::migrate`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const PRODUCT_COLUMNS: &str = "id, name, description, price_minor, quantity, unit, category, \
     version, created_at, updated_at, deleted_at";

const TRANSACTION_COLUMNS: &str =
    "id, product_id, kind, quantity, unit_price_minor, movement_date, description, created_at";

/// Postgres-backed ledger store.
///
/// Uses SQLx connection pool which is thread-safe (Arc + Send + Sync).
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    /// Create a new PostgresLedgerStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect using `config.database_url`.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("DATABASE_URL is not set".to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, product), err)]
    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        product.validate()?;
        let product = product.into_product(ProductId::new(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price_minor, quantity, unit, category,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(money_to_db(product.price)?)
        .bind(product.quantity)
        .bind(&product.unit)
        .bind(&product.category)
        .bind(product.version as i64)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_product", e))?;

        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?
            .ok_or(StoreError::NotFound)?;
        product_from_row(&row)
    }

    #[instrument(skip(self, patch), fields(product_id = %id), err)]
    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, StoreError> {
        patch.validate()?;
        let price = patch.price.map(money_to_db).transpose()?;

        // COALESCE keeps the stored value wherever the patch field is NULL.
        let sql = format!(
            r#"
            UPDATE products SET
                name        = COALESCE($2, name),
                description = COALESCE($3, description),
                price_minor = COALESCE($4, price_minor),
                unit        = COALESCE($5, unit),
                category    = COALESCE($6, category),
                version     = version + 1,
                updated_at  = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(patch.name.as_deref().map(str::trim))
            .bind(patch.description.as_deref())
            .bind(price)
            .bind(patch.unit.as_deref().map(str::trim))
            .bind(patch.category.as_deref().map(str::trim))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_product", e))?
            .ok_or(StoreError::NotFound)?;
        product_from_row(&row)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET deleted_at = NOW(), updated_at = NOW(), version = version + 1
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_product", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE deleted_at IS NULL ORDER BY created_at, id"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_transactions(
        &self,
        window: DateWindow,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM stock_transactions
            WHERE movement_date >= $1 AND movement_date < $2
              AND ($3::uuid IS NULL OR product_id = $3)
            ORDER BY movement_date, created_at
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(window.start())
            .bind(window.end())
            .bind(product_id.map(uuid::Uuid::from))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_transactions", e))?;
        rows.iter().map(transaction_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn get_admin_by_username(&self, username: &str) -> Result<Admin, StoreError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM admins WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_admin_by_username", e))?
        .ok_or(StoreError::NotFound)?;
        admin_from_row(&row)
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresUnitOfWork {
            tx,
            read_versions: HashMap::new(),
        }))
    }
}

/// Unit of work backed by one database transaction.
///
/// Dropping it without commit rolls the transaction back (SQLx semantics).
struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
    read_versions: HashMap<ProductId, u64>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product_for_update(&mut self, id: ProductId) -> Result<Product, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("product_for_update", e))?
            .ok_or(StoreError::NotFound)?;
        let product = product_from_row(&row)?;
        self.read_versions.insert(id, product.version);
        Ok(product)
    }

    #[instrument(
        skip(self, product, transaction),
        fields(product_id = %product.id, transaction_id = %transaction.id),
        err
    )]
    async fn record_movement(
        &mut self,
        product: &Product,
        transaction: &StockTransaction,
    ) -> Result<(), StoreError> {
        let read_version = *self.read_versions.get(&product.id).ok_or_else(|| {
            StoreError::ConstraintViolation("product was not read in this unit of work".to_string())
        })?;
        if transaction.product_id != product.id {
            return Err(StoreError::ConstraintViolation(
                "transaction references a different product".to_string(),
            ));
        }

        let updated = sqlx::query(
            r#"
            UPDATE products
            SET quantity = $2, updated_at = $3, version = version + 1
            WHERE id = $1 AND version = $4 AND deleted_at IS NULL
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.quantity)
        .bind(product.updated_at)
        .bind(read_version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_quantity", e))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "product {} changed since it was read (version {read_version})",
                product.id
            )));
        }
        self.read_versions.insert(product.id, read_version + 1);

        sqlx::query(
            r#"
            INSERT INTO stock_transactions (
                id, product_id, kind, quantity, unit_price_minor,
                movement_date, description, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.product_id.as_uuid())
        .bind(transaction.kind.as_str())
        .bind(transaction.quantity)
        .bind(money_to_db(transaction.unit_price)?)
        .bind(transaction.date)
        .bind(&transaction.description)
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23502") | Some("23503") | Some("23514") => {
                    StoreError::ConstraintViolation(msg)
                }
                Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("decode failure in {}: {}", operation, err))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn money_to_db(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.minor())
        .map_err(|_| StoreError::ConstraintViolation(format!("amount {money} is out of range")))
}

fn money_from_db(minor: i64) -> Result<Money, StoreError> {
    u64::try_from(minor)
        .map(Money::from_minor)
        .map_err(|_| StoreError::Corrupt(format!("negative amount {minor}")))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("failed to read {name}: {e}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let version: i64 = column(row, "version")?;
    Ok(Product {
        id: ProductId::from_uuid(column(row, "id")?),
        name: column(row, "name")?,
        description: column(row, "description")?,
        price: money_from_db(column(row, "price_minor")?)?,
        quantity: column(row, "quantity")?,
        unit: column(row, "unit")?,
        category: column(row, "category")?,
        version: version as u64,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        deleted_at: column::<Option<DateTime<Utc>>>(row, "deleted_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<StockTransaction, StoreError> {
    let kind: String = column(row, "kind")?;
    Ok(StockTransaction {
        id: TransactionId::from_uuid(column(row, "id")?),
        product_id: ProductId::from_uuid(column(row, "product_id")?),
        kind: kind
            .parse::<MovementKind>()
            .map_err(|_| StoreError::Corrupt(format!("unknown movement kind '{kind}'")))?,
        quantity: column(row, "quantity")?,
        unit_price: money_from_db(column(row, "unit_price_minor")?)?,
        date: column(row, "movement_date")?,
        description: column(row, "description")?,
        created_at: column(row, "created_at")?,
    })
}

fn admin_from_row(row: &PgRow) -> Result<Admin, StoreError> {
    Ok(Admin {
        id: AdminId::from_uuid(column(row, "id")?),
        username: column(row, "username")?,
        password_hash: column(row, "password_hash")?,
        created_at: column(row, "created_at")?,
    })
}
