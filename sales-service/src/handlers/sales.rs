use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{
    CreateSaleRequest, DeleteSaleResponse, ListSalesParams, PaginatedResponse, SaleResponse,
    UpdateSaleRequest,
};
use crate::startup::AppState;

#[tracing::instrument(skip(state, request))]
pub async fn create_sale(
    State(state): State<AppState>,
    Json(request): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<SaleResponse>), AppError> {
    let sale = state.sales.create(request).await?;
    Ok((StatusCode::CREATED, Json(sale.into())))
}

#[tracing::instrument(skip(state))]
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SaleResponse>, AppError> {
    let sale = state.sales.get(id).await?;
    Ok(Json(sale.into()))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSaleRequest>,
) -> Result<Json<SaleResponse>, AppError> {
    let sale = state.sales.update(id, request).await?;
    Ok(Json(sale.into()))
}

#[tracing::instrument(skip(state))]
pub async fn delete_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteSaleResponse>, AppError> {
    let sale = state.sales.delete(id).await?;
    Ok(Json(sale.into()))
}

#[tracing::instrument(skip(state))]
pub async fn cancel_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SaleResponse>, AppError> {
    let sale = state.sales.cancel(id).await?;
    Ok(Json(sale.into()))
}

#[tracing::instrument(skip(state))]
pub async fn reactivate_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SaleResponse>, AppError> {
    let sale = state.sales.reactivate(id).await?;
    Ok(Json(sale.into()))
}

#[tracing::instrument(skip(state))]
pub async fn list_sales(
    State(state): State<AppState>,
    Query(params): Query<ListSalesParams>,
) -> Result<Json<PaginatedResponse<SaleResponse>>, AppError> {
    let page = state.sales.list(params).await?;
    Ok(Json(page.map(SaleResponse::from).into()))
}
