use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{DomainError, DomainResult, Money, ProductId, TransactionId};

use crate::product::Product;

/// Description prefix for movements recorded by a stock count.
pub const ADJUSTMENT_PREFIX: &str = "stock count adjustment";

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    In,
    Out,
}

impl MovementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    /// Exact match only: `"IN"` or `" in"` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementKind::In),
            "out" => Ok(MovementKind::Out),
            _ => Err(DomainError::validation("transaction type must be 'in' or 'out'")),
        }
    }
}

/// A movement as submitted by a caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
}

impl MovementRequest {
    /// Validate and resolve the movement date.
    ///
    /// `now` is the acceptance time; it becomes the date when none was given
    /// and stays fixed across commit retries.
    pub fn accept(self, now: DateTime<Utc>) -> DomainResult<AcceptedMovement> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than 0"));
        }
        Ok(AcceptedMovement {
            product_id: self.product_id,
            kind: self.kind,
            quantity: self.quantity,
            date: self.date.unwrap_or(now),
            description: self.description,
        })
    }
}

/// A validated movement, ready to be applied inside a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMovement {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub date: DateTime<Utc>,
    pub description: String,
}

impl AcceptedMovement {
    /// Signed change this movement makes to the balance.
    pub fn delta(&self) -> i64 {
        match self.kind {
            MovementKind::In => self.quantity,
            MovementKind::Out => -self.quantity,
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: TransactionId,
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    /// Product price when the movement was applied.
    pub unit_price: Money,
    pub date: DateTime<Utc>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl StockTransaction {
    pub fn value(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Decide the effect of `movement` on `product`.
///
/// Returns the product with its new balance plus the ledger entry to record
/// alongside it. Nothing is mutated; the caller persists both or neither.
pub fn apply_movement(
    product: &Product,
    movement: &AcceptedMovement,
    now: DateTime<Utc>,
) -> DomainResult<(Product, StockTransaction)> {
    if product.id != movement.product_id {
        return Err(DomainError::invariant("product_id mismatch"));
    }
    if product.is_deleted() {
        return Err(DomainError::not_found());
    }

    let new_quantity = product
        .quantity
        .checked_add(movement.delta())
        .ok_or_else(|| DomainError::validation("quantity overflow"))?;
    if new_quantity < 0 {
        return Err(DomainError::insufficient_stock(
            product.quantity,
            movement.quantity,
        ));
    }

    let mut updated = product.clone();
    updated.quantity = new_quantity;
    updated.updated_at = now;

    let record = StockTransaction {
        id: TransactionId::new(),
        product_id: product.id,
        kind: movement.kind,
        quantity: movement.quantity,
        unit_price: product.price,
        date: movement.date,
        description: movement.description.clone(),
        created_at: now,
    };

    Ok((updated, record))
}

/// Movement that brings `product` to a physically counted quantity.
///
/// Returns `None` when the count already matches the balance.
pub fn reconciliation(
    product: &Product,
    counted: i64,
    note: &str,
    now: DateTime<Utc>,
) -> DomainResult<Option<AcceptedMovement>> {
    if counted < 0 {
        return Err(DomainError::validation("counted quantity cannot be negative"));
    }
    let delta = counted - product.quantity;
    if delta == 0 {
        return Ok(None);
    }

    let kind = if delta > 0 {
        MovementKind::In
    } else {
        MovementKind::Out
    };
    let description = if note.trim().is_empty() {
        ADJUSTMENT_PREFIX.to_string()
    } else {
        format!("{ADJUSTMENT_PREFIX}: {}", note.trim())
    };

    Ok(Some(AcceptedMovement {
        product_id: product.id,
        kind,
        quantity: delta.abs(),
        date: now,
        description,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::NewProduct;

    fn product_with(quantity: i64) -> Product {
        NewProduct {
            name: "Bolt".to_string(),
            description: String::new(),
            price: Money::from_minor(10),
            quantity,
            unit: "pcs".to_string(),
            category: "fasteners".to_string(),
        }
        .into_product(ProductId::new(), Utc::now())
    }

    fn movement(product: &Product, kind: MovementKind, quantity: i64) -> AcceptedMovement {
        MovementRequest {
            product_id: product.id,
            kind,
            quantity,
            date: None,
            description: String::new(),
        }
        .accept(Utc::now())
        .unwrap()
    }

    #[test]
    fn kind_parsing_is_exact() {
        assert_eq!("in".parse::<MovementKind>().unwrap(), MovementKind::In);
        assert_eq!("out".parse::<MovementKind>().unwrap(), MovementKind::Out);
        for bad in ["IN", "Out", " in", "", "transfer"] {
            let err = bad.parse::<MovementKind>().unwrap_err();
            assert_eq!(
                err,
                DomainError::validation("transaction type must be 'in' or 'out'")
            );
        }
    }

    #[test]
    fn accept_rejects_non_positive_quantity() {
        for q in [0, -3] {
            let req = MovementRequest {
                product_id: ProductId::new(),
                kind: MovementKind::In,
                quantity: q,
                date: None,
                description: String::new(),
            };
            assert_eq!(
                req.accept(Utc::now()).unwrap_err(),
                DomainError::validation("quantity must be greater than 0")
            );
        }
    }

    #[test]
    fn accept_defaults_date_to_acceptance_time() {
        let now = Utc::now();
        let explicit = now - chrono::Duration::days(3);
        let req = MovementRequest {
            product_id: ProductId::new(),
            kind: MovementKind::In,
            quantity: 1,
            date: None,
            description: String::new(),
        };
        assert_eq!(req.clone().accept(now).unwrap().date, now);

        let dated = MovementRequest {
            date: Some(explicit),
            ..req
        };
        assert_eq!(dated.accept(now).unwrap().date, explicit);
    }

    #[test]
    fn inbound_movement_increases_stock() {
        let product = product_with(0);
        let (updated, record) =
            apply_movement(&product, &movement(&product, MovementKind::In, 5), Utc::now()).unwrap();
        assert_eq!(updated.quantity, 5);
        assert_eq!(record.kind, MovementKind::In);
        assert_eq!(record.unit_price, Money::from_minor(10));
        assert_eq!(product.quantity, 0);
    }

    #[test]
    fn outbound_movement_may_reach_exactly_zero() {
        let product = product_with(5);
        let (updated, _) =
            apply_movement(&product, &movement(&product, MovementKind::Out, 5), Utc::now()).unwrap();
        assert_eq!(updated.quantity, 0);
    }

    #[test]
    fn outbound_movement_below_zero_is_insufficient_stock() {
        let product = product_with(5);
        let err = apply_movement(&product, &movement(&product, MovementKind::Out, 6), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(5, 6));
    }

    #[test]
    fn deleted_product_cannot_move() {
        let mut product = product_with(5);
        product.deleted_at = Some(Utc::now());
        let err = apply_movement(&product, &movement(&product, MovementKind::In, 1), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn reconciliation_records_the_difference() {
        let product = product_with(8);
        let up = reconciliation(&product, 11, "cycle count", Utc::now()).unwrap().unwrap();
        assert_eq!((up.kind, up.quantity), (MovementKind::In, 3));
        assert_eq!(up.description, "stock count adjustment: cycle count");

        let down = reconciliation(&product, 2, "", Utc::now()).unwrap().unwrap();
        assert_eq!((down.kind, down.quantity), (MovementKind::Out, 6));
        assert_eq!(down.description, ADJUSTMENT_PREFIX);

        assert!(reconciliation(&product, 8, "", Utc::now()).unwrap().is_none());
        assert!(reconciliation(&product, -1, "", Utc::now()).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn kind() -> impl Strategy<Value = MovementKind> {
            prop_oneof![Just(MovementKind::In), Just(MovementKind::Out)]
        }

        proptest! {
            /// Property: no sequence of applied movements leaves stock negative,
            /// and rejected movements leave the balance untouched.
            #[test]
            fn stock_never_goes_negative(
                opening in 0i64..50,
                moves in proptest::collection::vec((kind(), 1i64..30), 0..40)
            ) {
                let mut product = product_with(opening);
                let mut expected = opening;
                for (k, q) in moves {
                    let m = movement(&product, k, q);
                    match apply_movement(&product, &m, Utc::now()) {
                        Ok((updated, record)) => {
                            expected += m.delta();
                            prop_assert_eq!(record.quantity, q);
                            product = updated;
                        }
                        Err(DomainError::InsufficientStock { available, requested }) => {
                            prop_assert_eq!(k, MovementKind::Out);
                            prop_assert!(available < requested);
                        }
                        Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                    }
                    prop_assert!(product.quantity >= 0);
                    prop_assert_eq!(product.quantity, expected);
                }
            }

            /// Property: reconciling to any count lands exactly on that count.
            #[test]
            fn reconciliation_lands_on_count(opening in 0i64..1000, counted in 0i64..1000) {
                let product = product_with(opening);
                let after = match reconciliation(&product, counted, "", Utc::now()).unwrap() {
                    Some(m) => apply_movement(&product, &m, Utc::now()).unwrap().0.quantity,
                    None => product.quantity,
                };
                prop_assert_eq!(after, counted);
            }
        }
    }
}
