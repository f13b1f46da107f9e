use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::auth::is_admin;
use crate::schemas::{CreatedResponse, ListResponse, TransactionSchema};
use crate::services::{CreateTransactionRequest, ServiceError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub async fn create_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let authorized = is_admin(&headers, &state.admin_api_key);

    // Body problems are only reported to admins
    let request = match payload {
        Ok(Json(request)) => request,
        Err(e) if authorized => return Err(AppError::Validation(e.body_text())),
        Err(_) => return Err(ServiceError::Unauthorized.into()),
    };

    let created = state.service.create(request, authorized).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse::at(&created, Utc::now())),
    ))
}

pub async fn search_transactions(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.q.unwrap_or_default();
    let found = state.service.search(&query).await?;

    let now = Utc::now();
    let data: Vec<TransactionSchema> = found
        .iter()
        .map(|tx| TransactionSchema::at(tx, now))
        .collect();

    Ok(Json(ListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.service.get_by_code(&code).await?;
    Ok(Json(TransactionSchema::at(&tx, Utc::now())))
}

pub async fn get_by_serial(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.service.get_by_serial(&serial).await?;
    Ok(Json(TransactionSchema::at(&tx, Utc::now())))
}
