use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{AggregateRoot, DomainError, DomainResult, Entity, Money, ProductId};

/// Aggregate root: Product.
///
/// `quantity` is never written directly by callers. It changes only through
/// [`crate::apply_movement`], which is what keeps it non-negative and keeps
/// the ledger in step with the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Unit price in smallest currency unit (e.g., cents).
    pub price: Money,
    pub quantity: i64,
    pub unit: String,
    pub category: String,
    /// Bumped by the store on every committed write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Value of the stock on hand at the current unit price.
    pub fn stock_value(&self) -> Money {
        self.price.times(self.quantity)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AggregateRoot for Product {
    fn version(&self) -> u64 {
        self.version
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    /// Opening balance. Later changes go through the ledger.
    #[serde(default)]
    pub quantity: i64,
    pub unit: String,
    pub category: String,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        require_text("name", &self.name)?;
        require_text("unit", &self.unit)?;
        require_text("category", &self.category)?;
        if self.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(())
    }

    /// Build the stored record. The caller is expected to have validated.
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            price: self.price,
            quantity: self.quantity,
            unit: self.unit.trim().to_string(),
            category: self.category.trim().to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Explicit set of product fields to change.
///
/// `None` leaves a field untouched; `Some` sets it, zero and empty
/// description included. There is deliberately no quantity field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.unit.is_none()
            && self.category.is_none()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.is_empty() {
            return Err(DomainError::validation("update contains no fields"));
        }
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(unit) = &self.unit {
            require_text("unit", unit)?;
        }
        if let Some(category) = &self.category {
            require_text("category", category)?;
        }
        Ok(())
    }

    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(unit) = &self.unit {
            product.unit = unit.trim().to_string();
        }
        if let Some(category) = &self.category {
            product.category = category.trim().to_string();
        }
        product.updated_at = now;
    }
}

fn require_text(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> NewProduct {
        NewProduct {
            name: "Widget".to_string(),
            description: "A widget".to_string(),
            price: Money::from_minor(250),
            quantity: 12,
            unit: "pcs".to_string(),
            category: "hardware".to_string(),
        }
    }

    #[test]
    fn new_product_requires_name_unit_and_category() {
        assert!(widget().validate().is_ok());

        for blank in ["name", "unit", "category"] {
            let mut p = widget();
            match blank {
                "name" => p.name = "  ".to_string(),
                "unit" => p.unit = String::new(),
                _ => p.category = "\t".to_string(),
            }
            let err = p.validate().unwrap_err();
            assert_eq!(err, DomainError::validation(format!("{blank} cannot be empty")));
        }
    }

    #[test]
    fn new_product_rejects_negative_opening_balance() {
        let mut p = widget();
        p.quantity = -1;
        assert!(matches!(p.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn into_product_starts_live_at_version_one() {
        let now = Utc::now();
        let product = widget().into_product(ProductId::new(), now);
        assert_eq!(product.version, 1);
        assert_eq!(product.created_at, now);
        assert!(!product.is_deleted());
        assert_eq!(product.stock_value(), Money::from_minor(3000));
    }

    #[test]
    fn patch_can_set_price_to_zero() {
        let mut product = widget().into_product(ProductId::new(), Utc::now());
        let patch = ProductPatch {
            price: Some(Money::ZERO),
            ..ProductPatch::default()
        };
        patch.validate().unwrap();
        patch.apply_to(&mut product, Utc::now());
        assert_eq!(product.price, Money::ZERO);
        assert_eq!(product.name, "Widget");
        assert_eq!(product.quantity, 12);
    }

    #[test]
    fn empty_patch_is_rejected() {
        let err = ProductPatch::default().validate().unwrap_err();
        assert_eq!(err, DomainError::validation("update contains no fields"));
    }

    #[test]
    fn patch_rejects_blank_name() {
        let patch = ProductPatch {
            name: Some(" ".to_string()),
            ..ProductPatch::default()
        };
        assert!(matches!(patch.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn patch_ignores_quantity_in_json() {
        let patch: ProductPatch =
            serde_json::from_value(serde_json::json!({ "name": "Gadget", "quantity": 0 })).unwrap();
        assert_eq!(patch.name.as_deref(), Some("Gadget"));
        assert!(patch.price.is_none());
    }
}
