use std::collections::HashMap;

use rust_decimal_macros::dec;
use sqlx::PgPool;

use crate::models::{
    AssetType, SystemKind, MARKETING_PRINCIPAL, REVENUE_PRINCIPAL, TREASURY_PRINCIPAL,
};
use crate::money::Money;

/// The fixed in-code list of currency kinds this deployment supports.
/// Extending the registry means adding a line here and re-running seeding,
/// not calling a runtime admin API.
const SEED_ASSETS: &[(&str, &str)] = &[
    ("COIN", "Coin"),
    ("GEM", "Gem"),
    ("GOLD", "Gold"),
];

/// TREASURY and MARKETING start pre-funded so TOPUP/BONUS have somewhere to
/// draw from; REVENUE starts empty.
const TREASURY_SEED_BALANCE: rust_decimal::Decimal = dec!(1_000_000);
const MARKETING_SEED_BALANCE: rust_decimal::Decimal = dec!(1_000_000);

/// In-memory view of the seeded, administratively-immutable asset registry.
/// Built once at startup after seeding and shared read-only via `Arc` — the
/// engine never mutates it and never re-queries it per request.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    by_code: HashMap<String, AssetType>,
}

impl AssetRegistry {
    pub fn lookup(&self, code: &str) -> Option<&AssetType> {
        self.by_code.get(code)
    }
}

/// Idempotently seed asset types and their three system wallets, then load
/// the resulting registry. Safe to run on every process startup.
pub async fn seed(pool: &PgPool) -> anyhow::Result<AssetRegistry> {
    let mut tx = pool.begin().await?;

    for (code, name) in SEED_ASSETS {
        sqlx::query(
            r#"
            INSERT INTO asset_types (code, name, is_active)
            VALUES ($1, $2, true)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(code)
        .bind(name)
        .execute(&mut *tx)
        .await?;
    }

    let assets = sqlx::query_as::<_, AssetType>(
        "SELECT id, code, name, is_active FROM asset_types WHERE is_active",
    )
    .fetch_all(&mut *tx)
    .await?;

    for asset in &assets {
        seed_system_wallet(
            &mut tx,
            TREASURY_PRINCIPAL,
            asset.id,
            SystemKind::Treasury,
            Money::from_decimal(TREASURY_SEED_BALANCE)?,
        )
        .await?;
        seed_system_wallet(
            &mut tx,
            MARKETING_PRINCIPAL,
            asset.id,
            SystemKind::Marketing,
            Money::from_decimal(MARKETING_SEED_BALANCE)?,
        )
        .await?;
        seed_system_wallet(
            &mut tx,
            REVENUE_PRINCIPAL,
            asset.id,
            SystemKind::Revenue,
            Money::ZERO,
        )
        .await?;
    }

    tx.commit().await?;

    let by_code = assets.into_iter().map(|a| (a.code.clone(), a)).collect();
    Ok(AssetRegistry { by_code })
}

async fn seed_system_wallet(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    principal_id: i64,
    asset_type_id: i32,
    system_kind: SystemKind,
    initial_balance: Money,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO wallets (principal_id, asset_type_id, balance, is_system, system_kind, created_at, updated_at)
        VALUES ($1, $2, $3, true, $4, NOW(), NOW())
        ON CONFLICT (principal_id, asset_type_id) DO NOTHING
        "#,
    )
    .bind(principal_id)
    .bind(asset_type_id)
    .bind(initial_balance)
    .bind(system_kind)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
