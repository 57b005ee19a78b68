//! Point-in-time stock snapshot plus windowed movement totals.
//!
//! Never stored. Recomputed from one pass over products and one pass over
//! the window's transactions.

use serde::Serialize;

use depot_core::Money;

use crate::movement::{MovementKind, StockTransaction};
use crate::product::Product;
use crate::window::DateWindow;

/// Products with fewer units than this are reported as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Aggregated warehouse statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_products: usize,
    pub total_value: Money,
    pub monthly_in: i64,
    pub monthly_out: i64,
    pub monthly_value_in: Money,
    pub monthly_value_out: Money,
    pub low_stock_products: Vec<Product>,
}

impl Statistics {
    pub fn compute<'a>(
        window: &DateWindow,
        products: impl IntoIterator<Item = &'a Product>,
        transactions: impl IntoIterator<Item = &'a StockTransaction>,
    ) -> Self {
        let mut builder = StatisticsBuilder::new(*window);
        for product in products {
            builder.observe_product(product);
        }
        for tx in transactions {
            builder.observe_transaction(tx);
        }
        builder.finish()
    }
}

/// Incremental fold behind [`Statistics::compute`].
#[derive(Debug, Clone)]
pub struct StatisticsBuilder {
    window: DateWindow,
    stats: Statistics,
}

impl StatisticsBuilder {
    pub fn new(window: DateWindow) -> Self {
        Self {
            window,
            stats: Statistics::default(),
        }
    }

    /// Count a product in the snapshot. Soft-deleted products are skipped.
    pub fn observe_product(&mut self, product: &Product) {
        if product.is_deleted() {
            return;
        }
        self.stats.total_products += 1;
        self.stats.total_value += product.stock_value();
        if product.quantity < LOW_STOCK_THRESHOLD {
            self.stats.low_stock_products.push(product.clone());
        }
    }

    /// Add a movement to the windowed totals. Movements outside the window are ignored.
    pub fn observe_transaction(&mut self, tx: &StockTransaction) {
        if !self.window.contains(tx.date) {
            return;
        }
        match tx.kind {
            MovementKind::In => {
                self.stats.monthly_in = self.stats.monthly_in.saturating_add(tx.quantity);
                self.stats.monthly_value_in += tx.value();
            }
            MovementKind::Out => {
                self.stats.monthly_out = self.stats.monthly_out.saturating_add(tx.quantity);
                self.stats.monthly_value_out += tx.value();
            }
        }
    }

    pub fn finish(self) -> Statistics {
        self.stats
    }
}
