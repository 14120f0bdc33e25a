use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::money::Money;

/// Principal id reserved for the TREASURY system wallet (source of TOPUP).
pub const TREASURY_PRINCIPAL: i64 = -1;
/// Principal id reserved for the MARKETING system wallet (source of BONUS).
pub const MARKETING_PRINCIPAL: i64 = -2;
/// Principal id reserved for the REVENUE system wallet (sink of SPEND).
pub const REVENUE_PRINCIPAL: i64 = -3;

/// An enumerated currency kind, seeded administratively and immutable from
/// the engine's perspective.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AssetType {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

/// Tags a system wallet with which sink/source role it plays. Derived from
/// `principal_id` but materialized on the row for query/seeding convenience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemKind {
    Treasury,
    Marketing,
    Revenue,
}

impl std::fmt::Display for SystemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemKind::Treasury => write!(f, "TREASURY"),
            SystemKind::Marketing => write!(f, "MARKETING"),
            SystemKind::Revenue => write!(f, "REVENUE"),
        }
    }
}

/// An account holding a non-negative balance of one [`AssetType`] for one
/// principal.
///
/// Key design decisions:
/// - `balance` is [`Money`] (never f64!) — prevents floating point errors.
/// - `id` is a database-assigned surrogate key (`BIGSERIAL`), chosen over a
///   client-generated string id specifically so lock ordering has a natural
///   ascending total order to sort on.
/// - `principal_id` is signed: negative values are the three system wallets,
///   positive values are users.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub principal_id: i64,
    pub asset_type_id: i32,
    pub balance: Money,
    pub is_system: bool,
    pub system_kind: Option<SystemKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn is_user_wallet(&self) -> bool {
        !self.is_system
    }
}

/// The three movement types the engine understands. Each fixes a
/// source/destination pair and a debit/credit convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Topup,
    Bonus,
    Spend,
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovementType::Topup => write!(f, "TOPUP"),
            MovementType::Bonus => write!(f, "BONUS"),
            MovementType::Spend => write!(f, "SPEND"),
        }
    }
}

impl MovementType {
    /// The system principal that funds this movement type's source wallet,
    /// or `None` for SPEND (whose source is the user themselves).
    pub fn system_source(&self) -> Option<(i64, SystemKind)> {
        match self {
            MovementType::Topup => Some((TREASURY_PRINCIPAL, SystemKind::Treasury)),
            MovementType::Bonus => Some((MARKETING_PRINCIPAL, SystemKind::Marketing)),
            MovementType::Spend => None,
        }
    }

    /// The system principal that receives this movement type's destination
    /// wallet, or `None` for TOPUP/BONUS (whose destination is the user).
    pub fn system_destination(&self) -> Option<(i64, SystemKind)> {
        match self {
            MovementType::Topup | MovementType::Bonus => None,
            MovementType::Spend => Some((REVENUE_PRINCIPAL, SystemKind::Revenue)),
        }
    }
}

/// Did the transaction commit, or is it still being processed?
///
/// `Failed` is reserved for a future explicit terminal-failure flow; the
/// current movement types roll back on failure rather than persisting a
/// `FAILED` row (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "PENDING"),
            TransactionStatus::Completed => write!(f, "COMPLETED"),
            TransactionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// A record of one movement. The sole source of truth for whether a
/// movement happened; ledger entries are its audit trail, not a second
/// source of truth.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub public_id: Uuid,
    pub idempotency_key: String,
    pub movement_type: MovementType,
    pub user_id: i64,
    pub asset_type_id: i32,
    pub amount: Money,
    pub status: TransactionStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One leg of a double-entry posting. Append-only; never updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Debit,
    Credit,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Debit => write!(f, "DEBIT"),
            EntryType::Credit => write!(f, "CREDIT"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub transaction_public_id: Uuid,
    pub wallet_id: i64,
    pub entry_type: EntryType,
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// === API request/response models (the thin HTTP adapter) ===

/// Request body shared by the topup/bonus/spend endpoints.
#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub idempotency_key: String,
    pub user_id: i64,
    pub asset_type: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: rust_decimal::Decimal,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Generic API response envelope, matching the reference stack's
/// `{ success, data, message }` shape.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

/// Response for a processed (or replayed) movement.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub public_id: Uuid,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub user_id: i64,
    pub asset_type: String,
    pub amount: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransactionResponse {
    pub fn new(txn: Transaction, asset_type_code: String) -> Self {
        Self {
            public_id: txn.public_id,
            movement_type: txn.movement_type,
            user_id: txn.user_id,
            asset_type: asset_type_code,
            amount: txn.amount.to_string(),
            status: txn.status,
            created_at: txn.created_at,
            completed_at: txn.completed_at,
        }
    }
}

/// Response for a balance read (`get_balance`).
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: i64,
    pub asset_type: String,
    pub balance: String,
}
