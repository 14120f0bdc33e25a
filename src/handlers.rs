use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::engine::{ProcessRequest, TransactionEngine};
use crate::errors::{EngineError, EngineResult};
use crate::models::{
    ApiResponse, BalanceResponse, MovementRequest, MovementType, TransactionResponse,
};
use crate::money::Money;
use crate::seed::AssetRegistry;

/// Application state shared across handlers.
///
/// Why `Arc` around the registry and not the engine? The engine is already
/// cheap to clone (its stores each hold a `PgPool`, itself internally
/// reference-counted); the asset registry is built once at startup and never
/// mutated, so one shared copy is enough.
#[derive(Clone)]
pub struct AppState {
    pub engine: TransactionEngine,
    pub assets: Arc<AssetRegistry>,
}

async fn handle_movement(
    state: &AppState,
    movement_type: MovementType,
    payload: MovementRequest,
) -> EngineResult<Json<ApiResponse<TransactionResponse>>> {
    let amount = Money::from_decimal(payload.amount)?;

    let req = ProcessRequest {
        idempotency_key: payload.idempotency_key,
        movement_type,
        user_id: payload.user_id,
        asset_type: payload.asset_type.clone(),
        amount,
        metadata: payload.metadata,
    };

    tracing::info!(
        movement_type = %movement_type,
        user_id = req.user_id,
        asset_type = %req.asset_type,
        amount = %amount,
        "processing movement"
    );

    let txn = state.engine.process(req).await?;

    tracing::info!(
        public_id = %txn.public_id,
        movement_type = %movement_type,
        "movement processed"
    );

    Ok(Json(ApiResponse::success(TransactionResponse::new(
        txn,
        payload.asset_type,
    ))))
}

/// `POST /api/v1/transactions/topup` — move funds from the TREASURY system
/// wallet into a user's wallet.
pub async fn topup(
    State(state): State<AppState>,
    Json(payload): Json<MovementRequest>,
) -> EngineResult<Json<ApiResponse<TransactionResponse>>> {
    handle_movement(&state, MovementType::Topup, payload).await
}

/// `POST /api/v1/transactions/bonus` — move funds from the MARKETING system
/// wallet into a user's wallet.
pub async fn bonus(
    State(state): State<AppState>,
    Json(payload): Json<MovementRequest>,
) -> EngineResult<Json<ApiResponse<TransactionResponse>>> {
    handle_movement(&state, MovementType::Bonus, payload).await
}

/// `POST /api/v1/transactions/spend` — move funds from a user's wallet into
/// the REVENUE system wallet.
pub async fn spend(
    State(state): State<AppState>,
    Json(payload): Json<MovementRequest>,
) -> EngineResult<Json<ApiResponse<TransactionResponse>>> {
    handle_movement(&state, MovementType::Spend, payload).await
}

/// `GET /api/v1/wallets/:user_id/balance?asset_type=CODE` — read-only
/// balance lookup. A wallet that has never received a movement reads as
/// zero rather than 404 — it simply hasn't been created yet. An
/// unrecognized `asset_type` is the one case this route 404s on, rather
/// than the 422 other endpoints give an unknown asset: there's no resource
/// at that path to read at all.
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Response {
    let asset_type = match params.get("asset_type").cloned() {
        Some(code) => code,
        None => {
            return EngineError::ValidationError("asset_type query param is required".into())
                .into_response()
        }
    };

    if state.assets.lookup(&asset_type).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": format!("unknown asset type '{asset_type}'") })),
        )
            .into_response();
    }

    tracing::debug!(user_id, asset_type = %asset_type, "fetching balance");

    match state.engine.get_balance(user_id, &asset_type).await {
        Ok(balance) => Json(ApiResponse::success(BalanceResponse {
            user_id,
            asset_type,
            balance: balance.to_string(),
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Health check endpoint. Can be extended to ping the pool if a readiness
/// probe ever needs it.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}
