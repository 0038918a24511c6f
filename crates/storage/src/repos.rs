use sqlx::{Executor, PgPool, Postgres};

use crate::models::*;

// ─── Contract Registry Queries ──────────────────────────────────────────────

/// Registered contracts whose (lowercase) address is not in `excluded`.
pub async fn find_contracts_not_in(
    pool: &PgPool,
    excluded: &[String],
) -> Result<Vec<ContractRow>, sqlx::Error> {
    sqlx::query_as::<_, ContractRow>(
        r#"
        SELECT address, ledger_kind FROM erc1155_contracts
        WHERE NOT (LOWER(address) = ANY($1))
        ORDER BY address
        "#,
    )
    .bind(excluded)
    .fetch_all(pool)
    .await
}

/// Look up a contract in the banned-collection registry.
pub async fn find_banned(pool: &PgPool, address: &str) -> Result<Option<BannedRow>, sqlx::Error> {
    sqlx::query_as::<_, BannedRow>(
        "SELECT address, reason FROM banned_collections WHERE LOWER(address) = LOWER($1)",
    )
    .bind(address)
    .fetch_optional(pool)
    .await
}

// ─── Token Queries ──────────────────────────────────────────────────────────

/// Get a single token by contract and id.
pub async fn get_token(
    pool: &PgPool,
    contract_address: &str,
    token_id: &str,
) -> Result<Option<TokenRow>, sqlx::Error> {
    sqlx::query_as::<_, TokenRow>(
        r#"
        SELECT contract_address, token_id, token_uri, supply, display_name, image_url,
               owners, created_at, is_appropriate
        FROM tokens
        WHERE contract_address = $1 AND token_id = $2
        "#,
    )
    .bind(contract_address)
    .bind(token_id)
    .fetch_optional(pool)
    .await
}

/// Insert a token or refresh the stored one in place.
///
/// `created_at` is set once and never overwritten by later passes.
pub async fn upsert_token<'e, E>(executor: E, token: &TokenRow) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO tokens (contract_address, token_id, token_uri, supply, display_name,
                            image_url, owners, created_at, is_appropriate)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (contract_address, token_id) DO UPDATE
        SET token_uri = EXCLUDED.token_uri,
            supply = EXCLUDED.supply,
            display_name = EXCLUDED.display_name,
            image_url = EXCLUDED.image_url,
            owners = EXCLUDED.owners,
            created_at = COALESCE(tokens.created_at, EXCLUDED.created_at),
            is_appropriate = EXCLUDED.is_appropriate,
            updated_at = NOW()
        "#,
    )
    .bind(&token.contract_address)
    .bind(&token.token_id)
    .bind(&token.token_uri)
    .bind(&token.supply)
    .bind(&token.display_name)
    .bind(&token.image_url)
    .bind(&token.owners)
    .bind(token.created_at)
    .bind(token.is_appropriate)
    .execute(executor)
    .await?;
    Ok(())
}

// ─── Holding Queries ────────────────────────────────────────────────────────

/// Insert a holding (ignore if this holder is already recorded for the token).
pub async fn insert_holding<'e, E>(
    executor: E,
    contract_address: &str,
    token_id: &str,
    holder_address: &str,
    balance: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO holdings (contract_address, token_id, holder_address, balance)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (contract_address, token_id, holder_address) DO NOTHING
        "#,
    )
    .bind(contract_address)
    .bind(token_id)
    .bind(holder_address)
    .bind(balance)
    .execute(executor)
    .await?;
    Ok(())
}

// ─── Scan Checkpoints ───────────────────────────────────────────────────────

/// Last block fully processed for a contract, if any.
pub async fn get_checkpoint(
    pool: &PgPool,
    contract_address: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT last_block FROM contract_checkpoints WHERE contract_address = $1",
    )
    .bind(contract_address)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}

/// Record the last block fully processed for a contract.
pub async fn set_checkpoint<'e, E>(
    executor: E,
    contract_address: &str,
    last_block: i64,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO contract_checkpoints (contract_address, last_block, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (contract_address) DO UPDATE
        SET last_block = EXCLUDED.last_block, updated_at = NOW()
        "#,
    )
    .bind(contract_address)
    .bind(last_block)
    .execute(executor)
    .await?;
    Ok(())
}
