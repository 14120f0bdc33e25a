use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use sqlx::PgPool;

use crate::config::Config;
use crate::errors::{EngineError, EngineResult};
use crate::ledger_store::LedgerStore;
use crate::models::{EntryType, MovementType, Transaction, TransactionStatus, Wallet};
use crate::money::Money;
use crate::seed::AssetRegistry;
use crate::transaction_store::TransactionStore;
use crate::wallet_store::WalletStore;

/// A typed movement request, already past JSON deserialization but not yet
/// validated.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub idempotency_key: String,
    pub movement_type: MovementType,
    pub user_id: i64,
    pub asset_type: String,
    pub amount: Money,
    pub metadata: serde_json::Value,
}

/// Orchestrates the wallet, transaction, and ledger stores inside a single
/// DB transaction: idempotency fast-path, source/destination resolution,
/// ordered locking, validation, balance mutation, ledger emission, status
/// finalization, and bounded retry on transient storage errors.
#[derive(Clone)]
pub struct TransactionEngine {
    pool: PgPool,
    wallet_store: WalletStore,
    transaction_store: TransactionStore,
    ledger_store: LedgerStore,
    assets: Arc<AssetRegistry>,
    max_retries: u32,
    retry_base_delay: Duration,
    request_deadline: Duration,
}

impl TransactionEngine {
    pub fn new(pool: PgPool, assets: Arc<AssetRegistry>, config: &Config) -> Self {
        Self {
            wallet_store: WalletStore::new(pool.clone()),
            transaction_store: TransactionStore::new(pool.clone()),
            ledger_store: LedgerStore::new(),
            pool,
            assets,
            max_retries: config.engine_max_retries,
            retry_base_delay: config.engine_retry_base_delay,
            request_deadline: config.engine_request_deadline,
        }
    }

    /// Process one movement end to end. Idempotent: replays of the same
    /// `idempotency_key` return the original outcome without mutating state
    /// again.
    pub async fn process(&self, req: ProcessRequest) -> EngineResult<Transaction> {
        self.validate(&req)?;
        let asset_type_id = self.resolve_asset(&req.asset_type)?;

        // Step 1: idempotency fast-path (optimistic, no DB transaction).
        if let Some(existing) = self
            .transaction_store
            .find_by_idempotency_key(&req.idempotency_key)
            .await?
        {
            return Ok(existing);
        }

        let deadline = Instant::now() + self.request_deadline;
        let mut attempt: u32 = 0;

        loop {
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout);
            }

            match self.process_once(&req, asset_type_id).await {
                Ok(txn) => return Ok(txn),
                Err(EngineError::DuplicateIdempotencyKey(existing)) => return Ok(*existing),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        error = %e,
                        idempotency_key = %req.idempotency_key,
                        "transient storage error, retrying"
                    );
                    if Instant::now() + backoff >= deadline {
                        return Err(EngineError::Timeout);
                    }
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read-only balance lookup. No locking: a dirty read of the current
    /// balance is fine for display purposes and avoids contending with
    /// in-flight movements.
    pub async fn get_balance(
        &self,
        user_id: i64,
        asset_type_code: &str,
    ) -> EngineResult<Money> {
        let asset_type_id = self.resolve_asset(asset_type_code)?;
        let wallet = self
            .wallet_store
            .find_by_principal(user_id, asset_type_id)
            .await?;
        Ok(wallet.map(|w| w.balance).unwrap_or(Money::ZERO))
    }

    fn validate(&self, req: &ProcessRequest) -> EngineResult<()> {
        if req.idempotency_key.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "idempotency_key must not be empty".to_string(),
            ));
        }
        if req.user_id <= 0 {
            return Err(EngineError::ValidationError(
                "user_id must be positive".to_string(),
            ));
        }
        if !req.amount.is_positive() {
            return Err(EngineError::ValidationError(
                "amount must be strictly positive".to_string(),
            ));
        }
        Ok(())
    }

    fn resolve_asset(&self, code: &str) -> EngineResult<i32> {
        self.assets
            .lookup(code)
            .map(|a| a.id)
            .ok_or_else(|| EngineError::ValidationError(format!("unknown asset type '{code}'")))
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.retry_base_delay.saturating_mul(1 << (attempt - 1).min(16));
        let jitter_ms = rand::thread_rng().gen_range(0..=exp.as_millis().max(1) as u64 / 2);
        exp + Duration::from_millis(jitter_ms)
    }

    /// One attempt at the full movement algorithm inside a single DB
    /// transaction: resolve wallets, lock them in a deadlock-free order,
    /// validate funds, mutate balances, write the ledger legs, and
    /// finalize. Returns `Err(DuplicateIdempotencyKey(..))` when the
    /// transaction insert loses a concurrent race on the same idempotency
    /// key, for the caller to resolve; all other errors are either
    /// transient-retryable or terminal per the caller's classification.
    async fn process_once(
        &self,
        req: &ProcessRequest,
        asset_type_id: i32,
    ) -> EngineResult<Transaction> {
        let mut tx = self.pool.begin().await?;

        // Resolve source/destination wallets from the movement type.
        let source_wallet = self
            .resolve_wallet(&mut tx, req.movement_type.system_source(), req.user_id, asset_type_id)
            .await?;
        let dest_wallet = self
            .resolve_wallet(
                &mut tx,
                req.movement_type.system_destination(),
                req.user_id,
                asset_type_id,
            )
            .await?;

        // Lock both wallets in ascending-id order regardless of which one is
        // the source and which is the destination, so two concurrent
        // movements that touch the same pair of wallets always acquire their
        // locks in the same order and never deadlock.
        let source_is_first = source_wallet.id <= dest_wallet.id;
        let (first_id, second_id) = if source_is_first {
            (source_wallet.id, dest_wallet.id)
        } else {
            (dest_wallet.id, source_wallet.id)
        };

        let first_locked = self.wallet_store.lock(&mut tx, first_id).await?;
        let second_locked = if first_id == second_id {
            // TOPUP/BONUS/SPEND never move within the same wallet — the
            // three system principals and the user principal are always
            // distinct ids — but guard defensively rather than lock the
            // same row twice.
            first_locked.clone()
        } else {
            self.wallet_store.lock(&mut tx, second_id).await?
        };

        let (source_wallet, dest_wallet) = if source_is_first {
            (first_locked, second_locked)
        } else {
            (second_locked, first_locked)
        };

        // Create the PENDING transaction row. A unique-constraint hit here
        // is the authoritative idempotency check.
        let pending = self
            .transaction_store
            .create_pending(
                &mut tx,
                &req.idempotency_key,
                req.movement_type,
                req.user_id,
                asset_type_id,
                req.amount,
                req.metadata.clone(),
            )
            .await?;

        // Step 6: validate funds.
        if source_wallet.balance < req.amount {
            return Err(match req.movement_type {
                MovementType::Spend => EngineError::InsufficientFunds {
                    balance: source_wallet.balance.as_decimal(),
                    required: req.amount.as_decimal(),
                },
                MovementType::Topup | MovementType::Bonus => EngineError::ConfigurationError(
                    format!(
                        "system wallet {} ({}) has insufficient balance to fund this movement",
                        source_wallet.id, req.asset_type
                    ),
                ),
            });
        }

        // Step 7: apply deltas, capturing before/after snapshots.
        let source_before = source_wallet.balance;
        let source_after_wallet = self
            .wallet_store
            .apply_delta(&mut tx, &source_wallet, req.amount.negate())
            .await?;
        let source_after = source_after_wallet.balance;

        let dest_before = dest_wallet.balance;
        let dest_after_wallet = self
            .wallet_store
            .apply_delta(&mut tx, &dest_wallet, req.amount)
            .await?;
        let dest_after = dest_after_wallet.balance;

        // Step 8: append the paired ledger entries.
        self.ledger_store
            .append(
                &mut tx,
                pending.public_id,
                source_wallet.id,
                EntryType::Debit,
                req.amount,
                source_before,
                source_after,
                Some(describe(req.movement_type, true)),
            )
            .await?;

        self.ledger_store
            .append(
                &mut tx,
                pending.public_id,
                dest_wallet.id,
                EntryType::Credit,
                req.amount,
                dest_before,
                dest_after,
                Some(describe(req.movement_type, false)),
            )
            .await?;

        // Step 9: finalize.
        let finalized = self
            .transaction_store
            .finalize(&mut tx, pending.id, TransactionStatus::Completed)
            .await?;

        // Step 10: commit, releasing locks.
        tx.commit().await?;

        tracing::info!(
            public_id = %finalized.public_id,
            movement_type = %req.movement_type,
            user_id = req.user_id,
            amount = %req.amount,
            "movement completed"
        );

        Ok(finalized)
    }

    /// Resolve one side (source or destination) of a movement to a wallet,
    /// either the user's wallet (created lazily via `get_or_create`) or a
    /// system wallet that must already exist — seeding is responsible for
    /// provisioning the treasury/marketing/revenue wallets for every asset
    /// type, so a missing one here means the deployment is misconfigured.
    async fn resolve_wallet(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        system: Option<(i64, crate::models::SystemKind)>,
        user_id: i64,
        asset_type_id: i32,
    ) -> EngineResult<Wallet> {
        match system {
            Some((principal_id, kind)) => self
                .wallet_store
                .find_by_principal(principal_id, asset_type_id)
                .await?
                .ok_or_else(|| {
                    EngineError::ConfigurationError(format!(
                        "missing {kind} system wallet for asset type {asset_type_id}"
                    ))
                }),
            None => {
                self.wallet_store
                    .get_or_create(tx, user_id, asset_type_id, false, None)
                    .await
            }
        }
    }
}

fn describe(movement_type: MovementType, is_source: bool) -> &'static str {
    match (movement_type, is_source) {
        (MovementType::Topup, true) => "TOPUP debit from treasury",
        (MovementType::Topup, false) => "TOPUP credit to user",
        (MovementType::Bonus, true) => "BONUS debit from marketing",
        (MovementType::Bonus, false) => "BONUS credit to user",
        (MovementType::Spend, true) => "SPEND debit from user",
        (MovementType::Spend, false) => "SPEND credit to revenue",
    }
}
