//! PostgreSQL storage for sales-service.

use crate::models::{ordering::to_sql_order_by, paging::page_offset, OrderClause, PagedResult, Sale, SaleItem};
use crate::services::metrics::DbTimer;
use crate::services::repository::{SaleDeletion, SaleRepository};
use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const SALE_COLUMNS: &str =
    "id, sale_number, customer, branch, total_value, cancelled, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, sale_id, product_id, name, quantity, unit_price, discount, total_value_item, position";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "sales-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(db_error("Failed to connect"))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn load_items(&self, sale_id: Uuid) -> Result<Vec<SaleItem>, AppError> {
        let _timer = DbTimer::start("load_items");

        sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = $1 ORDER BY position"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load sale items"))
    }

    async fn load_items_for(&self, sales: &mut [Sale]) -> Result<(), AppError> {
        if sales.is_empty() {
            return Ok(());
        }
        let _timer = DbTimer::start("load_items_batch");

        let ids: Vec<Uuid> = sales.iter().map(|s| s.id).collect();
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ANY($1) ORDER BY sale_id, position"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load sale items"))?;

        let mut by_sale: HashMap<Uuid, Vec<SaleItem>> = HashMap::new();
        for item in items {
            by_sale.entry(item.sale_id).or_default().push(item);
        }
        for sale in sales.iter_mut() {
            sale.items = by_sale.remove(&sale.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl SaleRepository for Database {
    #[instrument(skip(self, sale), fields(sale_id = %sale.id, sale_number = %sale.sale_number, item_count = sale.items.len()))]
    async fn create(&self, sale: &Sale) -> Result<Sale, AppError> {
        let _timer = DbTimer::start("create_sale");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let mut created = sqlx::query_as::<_, Sale>(&format!(
            r#"
            INSERT INTO sales (id, sale_number, customer, branch, total_value, cancelled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SALE_COLUMNS}
            "#
        ))
        .bind(sale.id)
        .bind(&sale.sale_number)
        .bind(&sale.customer)
        .bind(&sale.branch)
        .bind(sale.total_value)
        .bind(sale.cancelled)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Sale number '{}' already exists",
                    sale.sale_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create sale: {}", e)),
        })?;

        let mut items = Vec::with_capacity(sale.items.len());
        for item in &sale.items {
            let inserted = sqlx::query_as::<_, SaleItem>(&format!(
                r#"
                INSERT INTO sale_items (id, sale_id, product_id, name, quantity, unit_price, discount, total_value_item, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(item.id)
            .bind(sale.id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.discount)
            .bind(item.total_value_item)
            .bind(item.position)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("Failed to insert sale item"))?;
            items.push(inserted);
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        created.items = items;

        info!(total_value = %created.total_value, "Sale created");

        Ok(created)
    }

    #[instrument(skip(self), fields(sale_id = %id))]
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Sale>, AppError> {
        let sale = {
            let _timer = DbTimer::start("get_sale");
            sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to get sale"))?
        };

        match sale {
            Some(mut sale) => {
                sale.items = self.load_items(id).await?;
                Ok(Some(sale))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, sale), fields(sale_id = %sale.id))]
    async fn update(&self, sale: &Sale) -> Result<Option<Sale>, AppError> {
        let updated = {
            let _timer = DbTimer::start("update_sale");
            sqlx::query_as::<_, Sale>(&format!(
                r#"
                UPDATE sales
                SET customer = $2, branch = $3, total_value = $4, cancelled = $5, updated_at = $6
                WHERE id = $1
                RETURNING {SALE_COLUMNS}
                "#
            ))
            .bind(sale.id)
            .bind(&sale.customer)
            .bind(&sale.branch)
            .bind(sale.total_value)
            .bind(sale.cancelled)
            .bind(sale.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to update sale"))?
        };

        match updated {
            Some(mut updated) => {
                updated.items = self.load_items(sale.id).await?;
                info!(cancelled = updated.cancelled, "Sale updated");
                Ok(Some(updated))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(sale_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<SaleDeletion, AppError> {
        let _timer = DbTimer::start("delete_sale");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let mut removed = sqlx::query_as::<_, SaleItem>(&format!(
            "DELETE FROM sale_items WHERE sale_id = $1 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Failed to delete sale items"))?;

        // Dropping the transaction without commit rolls it back.
        if removed.is_empty() {
            return Ok(SaleDeletion::NoItems);
        }

        let deleted = sqlx::query_as::<_, Sale>(&format!(
            "DELETE FROM sales WHERE id = $1 RETURNING {SALE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to delete sale"))?;

        let Some(mut sale) = deleted else {
            return Ok(SaleDeletion::NoHeader);
        };

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        removed.sort_by_key(|item| item.position);
        info!(removed = removed.len(), "Sale and items deleted");

        sale.items = removed;
        Ok(SaleDeletion::Deleted(sale))
    }

    #[instrument(skip(self, order), fields(page = page, page_size = page_size))]
    async fn list(
        &self,
        page: u32,
        page_size: u32,
        order: &[OrderClause],
    ) -> Result<PagedResult<Sale>, AppError> {
        let total_count: i64 = {
            let _timer = DbTimer::start("count_sales");
            sqlx::query_scalar("SELECT COUNT(*) FROM sales")
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("Failed to count sales"))?
        };

        // ORDER BY is built only from allow-listed column identifiers.
        let mut sales = {
            let _timer = DbTimer::start("list_sales");
            sqlx::query_as::<_, Sale>(&format!(
                "SELECT {SALE_COLUMNS} FROM sales ORDER BY {} LIMIT $1 OFFSET $2",
                to_sql_order_by(order)
            ))
            .bind(i64::from(page_size))
            .bind(page_offset(page, page_size))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list sales"))?
        };

        self.load_items_for(&mut sales).await?;

        Ok(PagedResult::new(sales, total_count, page, page_size))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("Health check failed"))?;
        Ok(())
    }
}
