//! In-process sale storage.
//!
//! Mirrors the PostgreSQL layout (headers and items kept apart) so the
//! command service behaves the same against either store. Used by tests and by `SALES_STORAGE=memory` runs.

use crate::models::{
    paging::page_offset, OrderClause, PagedResult, Sale, SaleItem, SortColumn, SortDirection,
};
use crate::services::repository::{SaleDeletion, SaleRepository};
use async_trait::async_trait;
use service_core::error::AppError;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    sales: HashMap<Uuid, Sale>,
    items: HashMap<Uuid, Vec<SaleItem>>,
}

impl Tables {
    fn with_items(&self, header: &Sale) -> Sale {
        let mut sale = header.clone();
        sale.items = self.items.get(&header.id).cloned().unwrap_or_default();
        sale
    }
}

#[derive(Clone, Default)]
pub struct InMemorySaleRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemorySaleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sale headers.
    pub async fn len(&self) -> usize {
        self.tables.read().await.sales.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn compare_by(column: SortColumn, a: &Sale, b: &Sale) -> Ordering {
    match column {
        SortColumn::Id => a.id.cmp(&b.id),
        SortColumn::SaleNumber => a.sale_number.cmp(&b.sale_number),
        SortColumn::Customer => a.customer.cmp(&b.customer),
        SortColumn::TotalValue => a.total_value.cmp(&b.total_value),
        SortColumn::Branch => a.branch.cmp(&b.branch),
        SortColumn::CreatedAt => a.created_at.cmp(&b.created_at),
        SortColumn::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortColumn::Cancelled => a.cancelled.cmp(&b.cancelled),
    }
}

/// Composite comparison: clauses in order, then `id` ascending.
fn compare_sales(a: &Sale, b: &Sale, order: &[OrderClause]) -> Ordering {
    order
        .iter()
        .map(|clause| {
            let ordering = compare_by(clause.column, a, b);
            match clause.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| a.id.cmp(&b.id))
}

#[async_trait]
impl SaleRepository for InMemorySaleRepository {
    async fn create(&self, sale: &Sale) -> Result<Sale, AppError> {
        let mut tables = self.tables.write().await;

        if tables
            .sales
            .values()
            .any(|existing| existing.sale_number == sale.sale_number)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Sale number '{}' already exists",
                sale.sale_number
            )));
        }

        let mut header = sale.clone();
        let items = std::mem::take(&mut header.items);
        tables.sales.insert(sale.id, header);
        if !items.is_empty() {
            tables.items.insert(sale.id, items);
        }

        Ok(sale.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Sale>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.sales.get(&id).map(|header| tables.with_items(header)))
    }

    async fn update(&self, sale: &Sale) -> Result<Option<Sale>, AppError> {
        let mut tables = self.tables.write().await;

        let Some(header) = tables.sales.get_mut(&sale.id) else {
            return Ok(None);
        };
        header.customer = sale.customer.clone();
        header.branch = sale.branch.clone();
        header.total_value = sale.total_value;
        header.cancelled = sale.cancelled;
        header.updated_at = sale.updated_at;

        let header = header.clone();
        Ok(Some(tables.with_items(&header)))
    }

    async fn delete(&self, id: Uuid) -> Result<SaleDeletion, AppError> {
        let mut tables = self.tables.write().await;

        if !tables.items.get(&id).is_some_and(|items| !items.is_empty()) {
            return Ok(SaleDeletion::NoItems);
        }
        let Some(mut sale) = tables.sales.remove(&id) else {
            return Ok(SaleDeletion::NoHeader);
        };
        sale.items = tables.items.remove(&id).unwrap_or_default();
        Ok(SaleDeletion::Deleted(sale))
    }

    async fn list(
        &self,
        page: u32,
        page_size: u32,
        order: &[OrderClause],
    ) -> Result<PagedResult<Sale>, AppError> {
        let tables = self.tables.read().await;

        let mut headers: Vec<&Sale> = tables.sales.values().collect();
        headers.sort_by(|a, b| compare_sales(a, b, order));

        let total_count = headers.len() as i64;
        let offset = usize::try_from(page_offset(page, page_size)).unwrap_or(usize::MAX);
        let items = headers
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .map(|header| tables.with_items(header))
            .collect();

        Ok(PagedResult::new(items, total_count, page, page_size))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_order, NewSale, NewSaleItem};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn sale(number: &str, customer: &str, minutes: i64) -> Sale {
        Sale::create(
            NewSale {
                sale_number: number.to_string(),
                customer: customer.to_string(),
                branch: "Main".to_string(),
                items: vec![NewSaleItem {
                    product_id: None,
                    name: "Beer".to_string(),
                    quantity: 2,
                    unit_price: Decimal::from(10),
                }],
            },
            Utc::now() + Duration::minutes(minutes),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_get_returns_items() {
        let repo = InMemorySaleRepository::new();
        let created = repo.create(&sale("S-1", "Alice", 0)).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.items.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_sale_number_conflicts() {
        let repo = InMemorySaleRepository::new();
        repo.create(&sale("S-1", "Alice", 0)).await.unwrap();

        let result = repo.create(&sale("S-1", "Bob", 1)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn delete_removes_header_with_items() {
        let repo = InMemorySaleRepository::new();
        let created = repo.create(&sale("S-1", "Alice", 0)).await.unwrap();

        let deleted = repo.delete(created.id).await.unwrap();
        assert_eq!(deleted, SaleDeletion::Deleted(created.clone()));
        assert!(repo.is_empty().await);

        assert_eq!(
            repo.delete(created.id).await.unwrap(),
            SaleDeletion::NoItems
        );
    }

    #[tokio::test]
    async fn delete_without_items_leaves_header() {
        let repo = InMemorySaleRepository::new();
        let mut header = sale("S-1", "Alice", 0);
        header.items.clear();
        let created = repo.create(&header).await.unwrap();

        assert_eq!(
            repo.delete(created.id).await.unwrap(),
            SaleDeletion::NoItems
        );
        assert!(repo.get_by_id(created.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn default_order_is_newest_first() {
        let repo = InMemorySaleRepository::new();
        repo.create(&sale("S-1", "Alice", 0)).await.unwrap();
        repo.create(&sale("S-2", "Bob", 10)).await.unwrap();
        repo.create(&sale("S-3", "Carol", 5)).await.unwrap();

        let page = repo.list(1, 10, &parse_order(None)).await.unwrap();
        let numbers: Vec<_> = page.items.iter().map(|s| s.sale_number.as_str()).collect();
        assert_eq!(numbers, vec!["S-2", "S-3", "S-1"]);
    }

    #[tokio::test]
    async fn secondary_clause_breaks_ties() {
        let repo = InMemorySaleRepository::new();
        repo.create(&sale("S-1", "Bob", 0)).await.unwrap();
        repo.create(&sale("S-2", "Alice", 1)).await.unwrap();
        repo.create(&sale("S-3", "Bob", 2)).await.unwrap();

        let order = parse_order(Some("customer asc, saleNumber desc"));
        let page = repo.list(1, 10, &order).await.unwrap();
        let numbers: Vec<_> = page.items.iter().map(|s| s.sale_number.as_str()).collect();
        assert_eq!(numbers, vec!["S-2", "S-3", "S-1"]);
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let repo = InMemorySaleRepository::new();
        repo.create(&sale("S-1", "Alice", 0)).await.unwrap();

        let page = repo.list(5, 10, &parse_order(None)).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 1);
        assert_eq!(page.current_page, 5);
    }
}
