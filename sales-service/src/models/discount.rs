//! Tiered quantity discount for sale items.
//!
//! | Quantity | Discount                 |
//! |----------|--------------------------|
//! | 1..=3    | none                     |
//! | 4..=9    | 10% of the line subtotal |
//! | 10..=20  | 20% of the line subtotal |
//! | > 20     | rejected                 |

use rust_decimal::Decimal;
use service_core::error::AppError;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

/// Maximum number of units of one product a single sale may carry.
pub const MAX_ITEM_QUANTITY: i32 = 20;

const TIER_ONE_MIN_QUANTITY: i32 = 4;
const TIER_TWO_MIN_QUANTITY: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountError {
    #[error("cannot sell more than {max} units of the same product (requested {quantity})")]
    QuantityExceeded { quantity: i32, max: i32 },
    #[error("unit price is too large to compute the sale amount")]
    AmountOverflow,
}

impl DiscountError {
    /// Request field the error is reported against.
    pub fn field(&self) -> &'static str {
        match self {
            DiscountError::QuantityExceeded { .. } => "quantity",
            DiscountError::AmountOverflow => "unit_price",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            DiscountError::QuantityExceeded { .. } => "quantity_exceeded",
            DiscountError::AmountOverflow => "amount_overflow",
        }
    }
}

/// `unit_price × quantity`, or `AmountOverflow` past `Decimal::MAX`.
pub fn line_subtotal(quantity: i32, unit_price: Decimal) -> Result<Decimal, DiscountError> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or(DiscountError::AmountOverflow)
}

/// Discount granted on a line of `quantity` units at `unit_price` each.
pub fn calculate_discount(quantity: i32, unit_price: Decimal) -> Result<Decimal, DiscountError> {
    if quantity < TIER_ONE_MIN_QUANTITY {
        return Ok(Decimal::ZERO);
    }
    if quantity > MAX_ITEM_QUANTITY {
        return Err(DiscountError::QuantityExceeded {
            quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }

    let rate = if quantity >= TIER_TWO_MIN_QUANTITY {
        Decimal::new(20, 2)
    } else {
        Decimal::new(10, 2)
    };

    line_subtotal(quantity, unit_price)?
        .checked_mul(rate)
        .ok_or(DiscountError::AmountOverflow)
}

impl From<DiscountError> for ValidationErrors {
    fn from(err: DiscountError) -> Self {
        let mut error = ValidationError::new(err.code());
        error.message = Some(err.to_string().into());

        let mut errors = ValidationErrors::new();
        errors.add(err.field(), error);
        errors
    }
}

impl From<DiscountError> for AppError {
    fn from(err: DiscountError) -> Self {
        AppError::ValidationError(err.into())
    }
}
