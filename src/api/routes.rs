//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{InventoryItem, OperationContext};
use crate::error::AppError;
use crate::handlers::{PurchaseCommand, TransferCommand};
use crate::projection::{TransferEntry, UserSummary};

use super::middleware::AuthenticatedUser;
use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct AuthRequest {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendCoinRequest {
    #[validate(length(min = 1, message = "toUser must not be empty"))]
    pub to_user: String,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryEntry {
    #[serde(rename = "type")]
    pub item_type: String,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedEntry {
    pub from_user: String,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SentEntry {
    pub to_user: String,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoinHistory {
    pub received: Vec<ReceivedEntry>,
    pub sent: Vec<SentEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub coins: i64,
    pub inventory: Vec<InventoryEntry>,
    pub coin_history: CoinHistory,
}

impl From<UserSummary> for InfoResponse {
    fn from(summary: UserSummary) -> Self {
        Self {
            coins: summary.balance,
            inventory: summary
                .inventory
                .into_iter()
                .map(|InventoryItem { product, quantity }| InventoryEntry {
                    item_type: product,
                    quantity,
                })
                .collect(),
            coin_history: CoinHistory {
                received: summary
                    .received
                    .into_iter()
                    .map(|TransferEntry { username, amount }| ReceivedEntry {
                        from_user: username,
                        amount,
                    })
                    .collect(),
                sent: summary
                    .sent
                    .into_iter()
                    .map(|TransferEntry { username, amount }| SentEntry {
                        to_user: username,
                        amount,
                    })
                    .collect(),
            },
        }
    }
}

/// Unwrap a JSON body, reporting malformed input as an invalid request
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

fn validated<T: Validate>(request: T) -> Result<T, AppError> {
    request
        .validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    Ok(request)
}

// =========================================================================
// API Router
// =========================================================================

/// Routes reachable without a bearer token
pub fn public_router() -> Router<AppState> {
    Router::new().route("/auth", post(authenticate))
}

/// Routes that require a bearer token
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/info", get(info))
        .route("/sendCoin", post(send_coin))
        .route("/buy/:item", get(buy))
}

// =========================================================================
// POST /api/auth
// =========================================================================

/// Log in (provisioning the account on first login) and issue a token
async fn authenticate(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let request = validated(json_body(payload)?)?;

    let token = state
        .auth
        .authenticate(&request.username, &request.password)
        .await?;

    Ok(Json(AuthResponse { token }))
}

// =========================================================================
// GET /api/info
// =========================================================================

/// Balance, inventory and coin history of the caller
async fn info(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<InfoResponse>, AppError> {
    let summary = state.summaries.retrieve(&user.username, &context).await?;

    Ok(Json(summary.into()))
}

// =========================================================================
// POST /api/sendCoin
// =========================================================================

/// Send coins to another user
async fn send_coin(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(context): Extension<OperationContext>,
    payload: Result<Json<SendCoinRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let request = validated(json_body(payload)?)?;

    let command = TransferCommand::new(user.username, request.to_user, request.amount);
    state.transfers.execute(command, &context).await?;

    Ok(StatusCode::OK)
}

// =========================================================================
// GET /api/buy/:item
// =========================================================================

/// Buy one unit of a catalog item
async fn buy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(context): Extension<OperationContext>,
    Path(item): Path<String>,
) -> Result<StatusCode, AppError> {
    let command = PurchaseCommand::new(user.username, item);
    state.purchases.execute(command, &context).await?;

    Ok(StatusCode::OK)
}
