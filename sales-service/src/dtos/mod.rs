pub mod sales;

pub use sales::{
    CreateSaleItemRequest, CreateSaleRequest, DeleteSaleResponse, ListSalesParams,
    PaginatedResponse, SaleItemResponse, SaleResponse, UpdateSaleRequest,
};
