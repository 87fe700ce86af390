//! Sale commands: validate, persist, project, then announce.
//!
//! Events are published only after the repository call succeeds; a failing
//! sink never undoes a write.

use crate::config::ListingConfig;
use crate::dtos::{CreateSaleRequest, ListSalesParams, UpdateSaleRequest};
use crate::models::{parse_order, PagedResult, Sale, SaleHeaderUpdate};
use crate::services::events::{SaleEvent, SaleEventSink};
use crate::services::metrics::record_operation;
use crate::services::repository::{SaleDeletion, SaleRepository};
use chrono::Utc;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct SaleService {
    repository: Arc<dyn SaleRepository>,
    events: Arc<dyn SaleEventSink>,
    listing: ListingConfig,
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Sale {} not found", id))
}

fn outcome<T>(operation: &'static str, result: &Result<T, AppError>) {
    let label = match result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    record_operation(operation, label);
}

impl SaleService {
    pub fn new(
        repository: Arc<dyn SaleRepository>,
        events: Arc<dyn SaleEventSink>,
        listing: ListingConfig,
    ) -> Self {
        Self {
            repository,
            events,
            listing,
        }
    }

    pub fn repository(&self) -> &Arc<dyn SaleRepository> {
        &self.repository
    }

    #[instrument(skip(self, request), fields(sale_number = %request.sale_number))]
    pub async fn create(&self, request: CreateSaleRequest) -> Result<Sale, AppError> {
        let result = self.create_inner(request).await;
        outcome("create", &result);
        result
    }

    async fn create_inner(&self, request: CreateSaleRequest) -> Result<Sale, AppError> {
        request.validate()?;

        let sale = Sale::create(request.into_new_sale(), Utc::now())?;
        let created = self.repository.create(&sale).await?;

        info!(
            sale_id = %created.id,
            total_value = %created.total_value,
            items = created.items.len(),
            "Sale registered"
        );
        self.events.publish(SaleEvent::created(&created));

        Ok(created)
    }

    #[instrument(skip(self), fields(sale_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Sale, AppError> {
        let result = self
            .repository
            .get_by_id(id)
            .await
            .and_then(|sale| sale.ok_or_else(|| not_found(id)));
        outcome("get", &result);
        result
    }

    #[instrument(skip(self, request), fields(sale_id = %id))]
    pub async fn update(&self, id: Uuid, request: UpdateSaleRequest) -> Result<Sale, AppError> {
        let result = self.update_inner(id, request).await;
        outcome("update", &result);
        result
    }

    async fn update_inner(&self, id: Uuid, request: UpdateSaleRequest) -> Result<Sale, AppError> {
        request.validate()?;

        let mut sale = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))?;

        sale.apply_header_update(SaleHeaderUpdate::from(request), Utc::now())?;

        let updated = self
            .repository
            .update(&sale)
            .await?
            .ok_or_else(|| not_found(id))?;

        info!(sale_id = %id, "Sale header updated");
        self.events.publish(SaleEvent::updated(&updated));

        Ok(updated)
    }

    /// Delete items, then the header, atomically. Each phase reports NotFound on its own.
    #[instrument(skip(self), fields(sale_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<Sale, AppError> {
        let result = self.delete_inner(id).await;
        outcome("delete", &result);
        result
    }

    async fn delete_inner(&self, id: Uuid) -> Result<Sale, AppError> {
        let sale = match self.repository.delete(id).await? {
            SaleDeletion::Deleted(sale) => sale,
            SaleDeletion::NoItems => {
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "No items found for sale {}",
                    id
                )));
            }
            SaleDeletion::NoHeader => {
                warn!(sale_id = %id, "Sale items found without a header");
                return Err(not_found(id));
            }
        };

        info!(sale_id = %id, removed = sale.items.len(), "Sale deleted");
        self.events.publish(SaleEvent::deleted(&sale));

        Ok(sale)
    }

    #[instrument(skip(self), fields(sale_id = %id))]
    pub async fn cancel(&self, id: Uuid) -> Result<Sale, AppError> {
        let result = self.set_cancelled(id, true).await;
        outcome("cancel", &result);
        result
    }

    #[instrument(skip(self), fields(sale_id = %id))]
    pub async fn reactivate(&self, id: Uuid) -> Result<Sale, AppError> {
        let result = self.set_cancelled(id, false).await;
        outcome("reactivate", &result);
        result
    }

    async fn set_cancelled(&self, id: Uuid, cancelled: bool) -> Result<Sale, AppError> {
        let mut sale = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))?;

        let now = Utc::now();
        if cancelled {
            sale.cancel(now);
        } else {
            sale.reactivate(now);
        }

        let updated = self
            .repository
            .update(&sale)
            .await?
            .ok_or_else(|| not_found(id))?;

        info!(sale_id = %id, cancelled = cancelled, "Sale cancellation changed");
        self.events.publish(SaleEvent::cancellation_changed(&updated));

        Ok(updated)
    }

    #[instrument(skip(self, params), fields(page = ?params.page, size = ?params.size))]
    pub async fn list(&self, params: ListSalesParams) -> Result<PagedResult<Sale>, AppError> {
        let result = self.list_inner(params).await;
        outcome("list", &result);
        result
    }

    async fn list_inner(&self, params: ListSalesParams) -> Result<PagedResult<Sale>, AppError> {
        params.validate()?;

        let page = params.page.unwrap_or(1);
        let page_size = params
            .size
            .unwrap_or(self.listing.default_page_size)
            .clamp(1, self.listing.max_page_size.max(1));
        let order = parse_order(params.order.as_deref());

        let result = self.repository.list(page, page_size, &order).await?;

        if result.is_empty() && self.listing.empty_page_is_not_found {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "No sales found for page {}",
                page
            )));
        }

        Ok(result)
    }
}
