use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{NewSale, NewSaleItem, PagedResult, Sale, SaleHeaderUpdate, SaleItem};

const REQUIRED: &str = "This field is required.";
const CUSTOMER_LENGTH: &str = "Customer must be between 3 and 50 characters.";

fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(REQUIRED.into());
        return Err(err);
    }
    Ok(())
}

/// Length is measured on the trimmed value, the one that gets stored.
fn customer_length(value: &str) -> Result<(), ValidationError> {
    let length = value.trim().chars().count();
    if !(3..=50).contains(&length) {
        let mut err = ValidationError::new("length");
        err.message = Some(CUSTOMER_LENGTH.into());
        return Err(err);
    }
    Ok(())
}

fn positive_price(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some("Unit price must be greater than zero.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateSaleRequest {
    #[validate(
        custom(function = "required"),
        length(max = 50, message = "Sale number cannot be longer than 50 characters.")
    )]
    pub sale_number: String,

    #[validate(custom(function = "customer_length"))]
    pub customer: String,

    #[validate(
        custom(function = "required"),
        length(max = 100, message = "Branch cannot be longer than 100 characters.")
    )]
    pub branch: String,

    #[validate(
        length(min = 1, message = "There must be at least one product for sale."),
        nested
    )]
    #[serde(default)]
    pub items: Vec<CreateSaleItemRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateSaleItemRequest {
    #[serde(default)]
    pub product_id: Option<Uuid>,

    #[validate(
        custom(function = "required"),
        length(max = 200, message = "Product name cannot be longer than 200 characters.")
    )]
    pub name: String,

    #[validate(range(min = 1, max = 20, message = "The quantity must be between 1 and 20."))]
    pub quantity: i32,

    #[validate(custom(function = "positive_price"))]
    pub unit_price: Decimal,
}

impl CreateSaleRequest {
    pub fn into_new_sale(self) -> NewSale {
        NewSale {
            sale_number: self.sale_number.trim().to_string(),
            customer: self.customer.trim().to_string(),
            branch: self.branch.trim().to_string(),
            items: self
                .items
                .into_iter()
                .map(|item| NewSaleItem {
                    product_id: item.product_id,
                    name: item.name.trim().to_string(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }
    }
}

/// Header-only update; items are fixed once the sale exists.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UpdateSaleRequest {
    #[validate(custom(function = "customer_length"))]
    pub customer: String,

    #[validate(
        custom(function = "required"),
        length(max = 100, message = "Branch cannot be longer than 100 characters.")
    )]
    pub branch: String,
}

impl From<UpdateSaleRequest> for SaleHeaderUpdate {
    fn from(req: UpdateSaleRequest) -> Self {
        Self {
            customer: req.customer.trim().to_string(),
            branch: req.branch.trim().to_string(),
        }
    }
}

/// `GET /api/sales` query string.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListSalesParams {
    #[serde(rename = "_page")]
    #[validate(range(min = 1, message = "Page must be at least 1."))]
    pub page: Option<u32>,

    #[serde(rename = "_size")]
    #[validate(range(min = 1, message = "Page size must be at least 1."))]
    pub size: Option<u32>,

    #[serde(rename = "_order")]
    pub order: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub total_value_item: Decimal,
}

impl From<SaleItem> for SaleItemResponse {
    fn from(item: SaleItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount,
            total_value_item: item.total_value_item,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleResponse {
    pub id: Uuid,
    pub sale_number: String,
    pub customer: String,
    pub branch: String,
    pub total_value: Decimal,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<SaleItemResponse>,
}

impl From<Sale> for SaleResponse {
    fn from(sale: Sale) -> Self {
        Self {
            id: sale.id,
            sale_number: sale.sale_number,
            customer: sale.customer,
            branch: sale.branch,
            total_value: sale.total_value,
            cancelled: sale.cancelled,
            created_at: sale.created_at,
            updated_at: sale.updated_at,
            items: sale.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total_count: i64,
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

impl<T> From<PagedResult<T>> for PaginatedResponse<T> {
    fn from(page: PagedResult<T>) -> Self {
        let total_pages = page.total_pages();
        Self {
            data: page.items,
            total_count: page.total_count,
            current_page: page.current_page,
            page_size: page.page_size,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSaleResponse {
    pub success: bool,
    pub id: Uuid,
    pub sale_number: String,
    pub removed_items: Vec<SaleItemResponse>,
}

impl From<Sale> for DeleteSaleResponse {
    fn from(sale: Sale) -> Self {
        Self {
            success: true,
            id: sale.id,
            sale_number: sale.sale_number,
            removed_items: sale.items.into_iter().map(Into::into).collect(),
        }
    }
}
