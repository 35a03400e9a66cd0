use sqlx::PgPool;

use crate::models::{ExecutionOutcome, OutcomeRecord};

/// Persist a terminal outcome. Re-inserting the same outcome is a no-op.
pub async fn insert_outcome(pool: &PgPool, outcome: &ExecutionOutcome) -> anyhow::Result<()> {
    let record = OutcomeRecord::from(outcome);

    sqlx::query(
        r#"
        INSERT INTO frontrun_outcomes
            (id, account, market_id, side, status, attempts, error,
             requested_size_usd, gas_price_hint, order_id, origin_signal_ids,
             created_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(&record.account)
    .bind(&record.market_id)
    .bind(&record.side)
    .bind(&record.status)
    .bind(record.attempts)
    .bind(&record.error)
    .bind(record.requested_size_usd)
    .bind(record.gas_price_hint)
    .bind(&record.order_id)
    .bind(&record.origin_signal_ids)
    .bind(record.created_at)
    .bind(record.finished_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent outcomes, newest first, optionally filtered by status.
pub async fn recent_outcomes(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<OutcomeRecord>> {
    let rows = sqlx::query_as::<_, OutcomeRecord>(
        r#"
        SELECT id, account, market_id, side, status, attempts, error,
               requested_size_usd, gas_price_hint, order_id, origin_signal_ids,
               created_at, finished_at
        FROM frontrun_outcomes
        WHERE ($1::TEXT IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Outcome counts per status.
pub async fn status_counts(pool: &PgPool) -> anyhow::Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT status, COUNT(*)::BIGINT
        FROM frontrun_outcomes
        GROUP BY status
        ORDER BY status
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
