//! Domain models for sales-service.

pub mod discount;
pub mod ordering;
pub mod paging;
mod sale;

pub use discount::{calculate_discount, DiscountError, MAX_ITEM_QUANTITY};
pub use ordering::{parse_order, OrderClause, SortColumn, SortDirection};
pub use paging::PagedResult;
pub use sale::{total_of, NewSale, NewSaleItem, Sale, SaleHeaderUpdate, SaleItem};
