//! Sale aggregate: a header record that exclusively owns its line items.

use super::discount::{calculate_discount, line_subtotal, DiscountError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Sale header with its items.
///
/// `total_value` is always the sum of the items' `total_value_item`; every
/// mutation that touches items goes through [`Sale::recompute_total`].
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub sale_number: String,
    pub customer: String,
    pub branch: String,
    pub total_value: Decimal,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub items: Vec<SaleItem>,
}

/// One product line within a sale.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub total_value_item: Decimal,
    pub position: i32,
}

/// Input for creating a sale.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub sale_number: String,
    pub customer: String,
    pub branch: String,
    pub items: Vec<NewSaleItem>,
}

/// Input for one line of a new sale.
#[derive(Debug, Clone)]
pub struct NewSaleItem {
    /// Generated when the client does not reference a catalogue product.
    pub product_id: Option<Uuid>,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Header fields that may change after creation.
#[derive(Debug, Clone)]
pub struct SaleHeaderUpdate {
    pub customer: String,
    pub branch: String,
}

impl SaleItem {
    /// Build a line, pricing it with the quantity discount.
    pub fn priced(sale_id: Uuid, position: i32, input: &NewSaleItem) -> Result<Self, DiscountError> {
        let discount = calculate_discount(input.quantity, input.unit_price)?;
        let subtotal = line_subtotal(input.quantity, input.unit_price)?;
        let total_value_item = subtotal
            .checked_sub(discount)
            .ok_or(DiscountError::AmountOverflow)?;

        Ok(Self {
            id: Uuid::new_v4(),
            sale_id,
            product_id: input.product_id.unwrap_or_else(Uuid::new_v4),
            name: input.name.clone(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            discount,
            total_value_item,
            position,
        })
    }
}

impl Sale {
    /// Assign an id, price every item and stamp both timestamps with `now`.
    pub fn create(input: NewSale, now: DateTime<Utc>) -> Result<Self, DiscountError> {
        let id = Uuid::new_v4();
        let items = input
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| SaleItem::priced(id, position as i32, item))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sale = Self {
            id,
            sale_number: input.sale_number,
            customer: input.customer,
            branch: input.branch,
            total_value: Decimal::ZERO,
            cancelled: false,
            created_at: now,
            updated_at: now,
            items,
        };
        sale.recompute_total()?;
        Ok(sale)
    }

    pub fn recompute_total(&mut self) -> Result<(), DiscountError> {
        self.total_value = total_of(&self.items)?;
        Ok(())
    }

    /// Replace the mutable header fields. Items are left untouched.
    pub fn apply_header_update(
        &mut self,
        update: SaleHeaderUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), DiscountError> {
        self.recompute_total()?;
        self.customer = update.customer;
        self.branch = update.branch;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.cancelled = true;
        self.updated_at = now;
    }

    pub fn reactivate(&mut self, now: DateTime<Utc>) {
        self.cancelled = false;
        self.updated_at = now;
    }
}

/// Σ (unit_price × quantity − discount) over `items`.
pub fn total_of(items: &[SaleItem]) -> Result<Decimal, DiscountError> {
    items.iter().try_fold(Decimal::ZERO, |total, item| {
        total
            .checked_add(item.total_value_item)
            .ok_or(DiscountError::AmountOverflow)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn line(name: &str, quantity: i32, unit_price: i64) -> NewSaleItem {
        NewSaleItem {
            product_id: None,
            name: name.to_string(),
            quantity,
            unit_price: Decimal::from(unit_price),
        }
    }

    fn new_sale(items: Vec<NewSaleItem>) -> NewSale {
        NewSale {
            sale_number: "S-0001".to_string(),
            customer: "Acme Corp".to_string(),
            branch: "Downtown".to_string(),
            items,
        }
    }

    #[test]
    fn four_units_at_one_hundred_cost_three_sixty() {
        let sale = Sale::create(new_sale(vec![line("Beer", 4, 100)]), Utc::now()).unwrap();

        let item = &sale.items[0];
        assert_eq!(item.discount, Decimal::from(40));
        assert_eq!(item.total_value_item, Decimal::from(360));
        assert_eq!(sale.total_value, Decimal::from(360));
    }

    #[test]
    fn total_is_sum_of_discounted_items() {
        let sale = Sale::create(
            new_sale(vec![
                line("Water", 2, 10),  // 20, no discount
                line("Juice", 5, 20),  // 100 - 10
                line("Soda", 10, 30), // 300 - 60
            ]),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(sale.total_value, Decimal::from(20 + 90 + 240));
        assert_eq!(Ok(sale.total_value), total_of(&sale.items));
    }

    #[test]
    fn create_rejects_more_than_twenty_units() {
        let result = Sale::create(new_sale(vec![line("Beer", 21, 5)]), Utc::now());
        assert!(matches!(
            result,
            Err(DiscountError::QuantityExceeded { quantity: 21, .. })
        ));
    }

    #[test]
    fn oversized_line_amounts_are_rejected() {
        let huge: Decimal = "70000000000000000000000000000".parse().unwrap();
        let mut single = line("Gold", 1, 1);
        single.unit_price = huge;

        // Each line fits on its own; the sum does not.
        let result = Sale::create(new_sale(vec![single.clone(), single.clone()]), Utc::now());
        assert_eq!(result, Err(DiscountError::AmountOverflow));

        single.quantity = 20;
        let result = Sale::create(new_sale(vec![single]), Utc::now());
        assert_eq!(result, Err(DiscountError::AmountOverflow));
    }

    #[test]
    fn create_stamps_identity_and_timestamps() {
        let now = Utc::now();
        let sale = Sale::create(
            new_sale(vec![line("Beer", 1, 5), line("Chips", 2, 3)]),
            now,
        )
        .unwrap();

        assert!(!sale.cancelled);
        assert_eq!(sale.created_at, now);
        assert_eq!(sale.updated_at, now);
        assert!(sale.items.iter().all(|i| i.sale_id == sale.id));
        assert_eq!(
            sale.items.iter().map(|i| i.position).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn explicit_product_id_is_kept() {
        let product_id = Uuid::new_v4();
        let mut input = line("Beer", 1, 5);
        input.product_id = Some(product_id);

        let item = SaleItem::priced(Uuid::new_v4(), 0, &input).unwrap();
        assert_eq!(item.product_id, product_id);
    }

    #[test]
    fn header_update_changes_only_header_and_timestamp() {
        let created = Utc::now();
        let mut sale = Sale::create(new_sale(vec![line("Beer", 6, 10)]), created).unwrap();
        let before = sale.clone();
        let later = created + Duration::seconds(5);

        sale.apply_header_update(
            SaleHeaderUpdate {
                customer: "Globex".to_string(),
                branch: "Uptown".to_string(),
            },
            later,
        )
        .unwrap();

        assert_eq!(sale.customer, "Globex");
        assert_eq!(sale.branch, "Uptown");
        assert_eq!(sale.updated_at, later);
        assert_eq!(sale.created_at, before.created_at);
        assert_eq!(sale.items, before.items);
        assert_eq!(sale.total_value, before.total_value);
    }

    #[test]
    fn cancel_and_reactivate_toggle_flag_only() {
        let created = Utc::now();
        let mut sale = Sale::create(new_sale(vec![line("Beer", 1, 10)]), created).unwrap();
        let original = sale.clone();

        let cancelled_at = created + Duration::seconds(1);
        sale.cancel(cancelled_at);
        assert!(sale.cancelled);
        assert_eq!(sale.updated_at, cancelled_at);
        assert_eq!(sale.total_value, original.total_value);
        assert_eq!(sale.customer, original.customer);

        let reactivated_at = created + Duration::seconds(2);
        sale.reactivate(reactivated_at);
        assert!(!sale.cancelled);
        assert_eq!(sale.updated_at, reactivated_at);
    }
}
