use sqlx::{Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::errors::EngineResult;
use crate::models::{EntryType, LedgerEntry};
use crate::money::Money;

/// Append-only store for ledger entries. Never updates or deletes a row
/// once written.
///
/// Every call here runs against a caller-supplied `DbTransaction`, so this
/// store holds no pool of its own — unlike `WalletStore`/`TransactionStore`,
/// it has no read-only query path that would need one.
#[derive(Clone, Default)]
pub struct LedgerStore;

impl LedgerStore {
    pub fn new() -> Self {
        Self
    }

    /// Append one leg of a double-entry posting, bound to
    /// `transaction_public_id`. Always called twice per committed
    /// transaction — once DEBIT, once CREDIT — within the same DB
    /// transaction as the balance mutation it records.
    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        transaction_public_id: Uuid,
        wallet_id: i64,
        entry_type: EntryType,
        amount: Money,
        balance_before: Money,
        balance_after: Money,
        description: Option<&str>,
    ) -> EngineResult<LedgerEntry> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO ledger_entries
                (transaction_public_id, wallet_id, entry_type, amount, balance_before, balance_after, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, transaction_public_id, wallet_id, entry_type, amount, balance_before, balance_after, description, created_at
            "#,
        )
        .bind(transaction_public_id)
        .bind(wallet_id)
        .bind(entry_type)
        .bind(amount)
        .bind(balance_before)
        .bind(balance_after)
        .bind(description)
        .fetch_one(&mut **tx)
        .await?;

        Ok(entry)
    }
}
