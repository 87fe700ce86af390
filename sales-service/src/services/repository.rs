//! Storage seam for sales.

use crate::models::{OrderClause, PagedResult, Sale};
use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

/// Result of removing a sale together with its items.
#[derive(Debug, Clone, PartialEq)]
pub enum SaleDeletion {
    /// Header and items removed; the sale carries the removed items.
    Deleted(Sale),
    /// The sale has no items; nothing was removed.
    NoItems,
    /// Items existed but the header did not; nothing was removed.
    NoHeader,
}

/// Persistence operations the command service relies on.
///
/// `Ok(None)` means the target does not exist; storage failures are `Err`.
#[async_trait]
pub trait SaleRepository: Send + Sync + 'static {
    /// Persist a fully priced sale together with its items.
    async fn create(&self, sale: &Sale) -> Result<Sale, AppError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Sale>, AppError>;

    /// Overwrite the header columns of an existing sale and return it with its items.
    async fn update(&self, sale: &Sale) -> Result<Option<Sale>, AppError>;

    /// Remove the items, then the header, as one atomic unit. Either phase
    /// finding nothing leaves storage untouched.
    async fn delete(&self, id: Uuid) -> Result<SaleDeletion, AppError>;

    /// One page of sales ordered by `order` (already validated).
    async fn list(
        &self,
        page: u32,
        page_size: u32,
        order: &[OrderClause],
    ) -> Result<PagedResult<Sale>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
