use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::models::{MovementType, Transaction, TransactionStatus};
use crate::money::Money;

const UNIQUE_VIOLATION: &str = "23505";

/// Repository for transaction records.
#[derive(Clone)]
pub struct TransactionStore {
    pool: PgPool,
}

impl TransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Best-effort pre-check used by the engine's idempotency fast path.
    /// Runs outside any DB transaction.
    pub async fn find_by_idempotency_key(&self, key: &str) -> EngineResult<Option<Transaction>> {
        let txn = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, public_id, idempotency_key, movement_type, user_id, asset_type_id,
                   amount, status, metadata, created_at, completed_at
            FROM transactions
            WHERE idempotency_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(txn)
    }

    /// Insert a new PENDING transaction with a freshly generated
    /// `public_id`. If the unique constraint on `idempotency_key` fires —
    /// the authoritative check for exactly-once processing, since two
    /// concurrent duplicates can both miss the pre-check — re-reads the
    /// winning row and returns `EngineError::DuplicateIdempotencyKey`
    /// carrying it. This is an internal signal the engine always resolves
    /// before it reaches a caller.
    pub async fn create_pending(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        idempotency_key: &str,
        movement_type: MovementType,
        user_id: i64,
        asset_type_id: i32,
        amount: Money,
        metadata: serde_json::Value,
    ) -> EngineResult<Transaction> {
        let public_id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions
                (public_id, idempotency_key, movement_type, user_id, asset_type_id, amount, status, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'PENDING', $7, $8)
            RETURNING id, public_id, idempotency_key, movement_type, user_id, asset_type_id,
                      amount, status, metadata, created_at, completed_at
            "#,
        )
        .bind(public_id)
        .bind(idempotency_key)
        .bind(movement_type)
        .bind(user_id)
        .bind(asset_type_id)
        .bind(amount)
        .bind(metadata)
        .bind(now)
        .fetch_one(&mut **tx)
        .await;

        match result {
            Ok(txn) => Ok(txn),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                let existing = self
                    .find_by_idempotency_key(idempotency_key)
                    .await?
                    .ok_or_else(|| {
                        EngineError::StorageError(sqlx::Error::Database(db_err))
                    })?;
                Err(EngineError::DuplicateIdempotencyKey(Box::new(existing)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Transition PENDING → a terminal status and stamp `completed_at`. The
    /// `WHERE status = 'PENDING'` guard makes this a no-op on a row that
    /// already left PENDING, so callers cannot accidentally re-finalize a
    /// terminal row. Callers are responsible for only ever finalizing a row
    /// they hold within the same DB transaction that created it.
    pub async fn finalize(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        transaction_id: i64,
        status: TransactionStatus,
    ) -> EngineResult<Transaction> {
        let now = Utc::now();

        let txn = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = $1, completed_at = $2
            WHERE id = $3 AND status = 'PENDING'
            RETURNING id, public_id, idempotency_key, movement_type, user_id, asset_type_id,
                      amount, status, metadata, created_at, completed_at
            "#,
        )
        .bind(status)
        .bind(now)
        .bind(transaction_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(txn)
    }
}
