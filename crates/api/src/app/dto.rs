use chrono::{DateTime, Utc};
use serde::Deserialize;

use depot_core::{Money, ProductId};
use depot_inventory::{
    DateWindow, MovementKind, MovementRequest, NewProduct, ProductPatch,
    window::parse_calendar_date,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Minor currency units.
    pub price: u64,
    #[serde(default)]
    pub quantity: i64,
    pub unit: String,
    pub category: String,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(body: CreateProductRequest) -> Self {
        NewProduct {
            name: body.name,
            description: body.description,
            price: Money::from_minor(body.price),
            quantity: body.quantity,
            unit: body.unit,
            category: body.category,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<u64>,
    pub unit: Option<String>,
    pub category: Option<String>,
}

impl From<UpdateProductRequest> for ProductPatch {
    fn from(body: UpdateProductRequest) -> Self {
        ProductPatch {
            name: body.name,
            description: body.description,
            price: body.price.map(Money::from_minor),
            unit: body.unit,
            category: body.category,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub counted_quantity: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub product_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: i64,
    /// RFC3339; defaults to the time the movement is accepted.
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
}

impl CreateTransactionRequest {
    pub fn into_movement(self) -> Result<MovementRequest, axum::response::Response> {
        let product_id = parse_product_id(&self.product_id)?;
        let kind: MovementKind = self
            .kind
            .parse()
            .map_err(errors::domain_error_to_response)?;
        Ok(MovementRequest {
            product_id,
            kind,
            quantity: self.quantity,
            date: self.date,
            description: self.description,
        })
    }
}

/// `?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD`, both days included.
#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl DateRangeQuery {
    pub fn window(&self) -> Result<DateWindow, axum::response::Response> {
        let (Some(start), Some(end)) = (self.start_date.as_deref(), self.end_date.as_deref())
        else {
            return Err(errors::bad_request("start_date and end_date are required"));
        };
        let start = parse_calendar_date(start).map_err(errors::domain_error_to_response)?;
        let end = parse_calendar_date(end).map_err(errors::domain_error_to_response)?;
        DateWindow::inclusive_days(start, end).map_err(errors::domain_error_to_response)
    }
}

pub fn parse_product_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::bad_request("invalid product id"))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilterQuery {
    pub product_id: Option<String>,
}
