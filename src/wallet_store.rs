use sqlx::{PgPool, Postgres, Transaction};

use crate::errors::EngineResult;
use crate::models::{SystemKind, Wallet};
use crate::money::Money;

/// Repository for wallet rows.
///
/// Design principle, carried from the reference stack: all database logic
/// for wallets lives here. The engine orchestrates; this store never knows
/// about movement types, idempotency, or ledger entries.
#[derive(Clone)]
pub struct WalletStore {
    pool: PgPool,
}

impl WalletStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a wallet by its natural key without locking — used for
    /// read-only balance queries.
    pub async fn find_by_principal(
        &self,
        principal_id: i64,
        asset_type_id: i32,
    ) -> EngineResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, principal_id, asset_type_id, balance, is_system, system_kind, created_at, updated_at
            FROM wallets
            WHERE principal_id = $1 AND asset_type_id = $2
            "#,
        )
        .bind(principal_id)
        .bind(asset_type_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    /// Return the wallet for `(principal_id, asset_type_id)`, creating it
    /// with a zero balance if it doesn't exist yet.
    ///
    /// Concurrent creation of the same natural key is resolved by the
    /// unique index: the losing `INSERT ... ON CONFLICT DO NOTHING` inserts
    /// zero rows, and the follow-up `SELECT` returns the winner's row.
    pub async fn get_or_create(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        principal_id: i64,
        asset_type_id: i32,
        is_system: bool,
        system_kind: Option<SystemKind>,
    ) -> EngineResult<Wallet> {
        sqlx::query(
            r#"
            INSERT INTO wallets (principal_id, asset_type_id, balance, is_system, system_kind, created_at, updated_at)
            VALUES ($1, $2, 0, $3, $4, NOW(), NOW())
            ON CONFLICT (principal_id, asset_type_id) DO NOTHING
            "#,
        )
        .bind(principal_id)
        .bind(asset_type_id)
        .bind(is_system)
        .bind(system_kind)
        .execute(&mut **tx)
        .await?;

        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, principal_id, asset_type_id, balance, is_system, system_kind, created_at, updated_at
            FROM wallets
            WHERE principal_id = $1 AND asset_type_id = $2
            "#,
        )
        .bind(principal_id)
        .bind(asset_type_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(wallet)
    }

    /// Acquire an exclusive row lock (`SELECT ... FOR UPDATE`) and return a
    /// fresh view of the row. Must be called inside an open DB transaction;
    /// blocks until the lock is available.
    pub async fn lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: i64,
    ) -> EngineResult<Wallet> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, principal_id, asset_type_id, balance, is_system, system_kind, created_at, updated_at
            FROM wallets
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(wallet_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(wallet)
    }

    /// Apply `delta` to a wallet that was obtained from [`Self::lock`] in
    /// this same transaction.
    ///
    /// Critical design point: this mutates and persists the in-memory
    /// instance returned by `lock`, and updates `WHERE id = $2` only — it
    /// never re-`SELECT`s the row. Re-selecting here would let a concurrent
    /// writer's change slip in between the lock and this write, silently
    /// discarding the invariant the lock exists to protect.
    pub async fn apply_delta(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet: &Wallet,
        delta: Money,
    ) -> EngineResult<Wallet> {
        let new_balance = wallet.balance.checked_add(delta)?;
        if new_balance.is_negative() {
            return Err(crate::errors::EngineError::InvariantViolation(format!(
                "wallet {} balance would go negative: {} + {} = {}",
                wallet.id, wallet.balance, delta, new_balance
            )));
        }

        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(new_balance)
        .bind(wallet.id)
        .execute(&mut **tx)
        .await?;

        Ok(Wallet {
            balance: new_balance,
            ..wallet.clone()
        })
    }
}
